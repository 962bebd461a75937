//! Connection Factory Port
//!
//! Defines how the pool obtains new connections on a free-list miss.

use crate::domain::ports::Connection;
use async_trait::async_trait;
use std::future::Future;

/// Creates connections to an address.
///
/// Supplied at pool construction. The pool does not retry: whatever error the
/// factory returns is surfaced verbatim to the caller of `Pool::get`.
///
/// Any `Fn(String) -> impl Future<Output = Result<C, E>>` is a factory, so a
/// plain async function can be passed directly.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Handle type produced by this factory.
    type Connection: Connection;
    /// Error returned when a connection cannot be established.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establish a new connection to `addr`.
    async fn connect(&self, addr: &str) -> Result<Self::Connection, Self::Error>;
}

#[async_trait]
impl<F, Fut, C, E> ConnectionFactory for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C, E>> + Send + 'static,
    C: Connection,
    E: std::error::Error + Send + Sync + 'static,
{
    type Connection = C;
    type Error = E;

    async fn connect(&self, addr: &str) -> Result<C, E> {
        (self)(addr.to_string()).await
    }
}
