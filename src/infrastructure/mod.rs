//! Infrastructure Layer
//!
//! Connection lifecycle management shared by the client wrappers.

pub mod connection_pool;

pub use connection_pool::{Pool, PoolError, PoolStats, PooledConnection, ReleaseOutcome};
