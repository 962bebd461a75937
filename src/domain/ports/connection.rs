//! Connection Port
//!
//! Defines the minimum capability set the pool needs from a connection
//! handle. Transport details stay with the implementation.

use crate::domain::value_objects::ConnectionState;
use async_trait::async_trait;

/// A long-lived connection handle that can be pooled.
///
/// This is an outbound port: the pool only ever asks a handle whether it is
/// usable and tells it to close. Everything else (requests, streams,
/// credentials) is the caller's business.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Current connectivity state.
    ///
    /// Queried when an idle connection is taken out of the free-list; only
    /// [`ConnectionState::Ready`] handles are reused.
    fn state(&self) -> ConnectionState;

    /// Close the underlying transport.
    ///
    /// The pool never propagates the returned error; it is logged and dropped.
    async fn close(&mut self) -> std::io::Result<()>;
}
