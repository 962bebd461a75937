//! rpc-connpool Library
//!
//! Bounded pool of long-lived RPC connections with lazy expiry. The pool is
//! transport agnostic: callers plug in a [`ConnectionFactory`] and a
//! [`Connection`] handle, or use the bundled TCP factory.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::outbound::{TcpConnectError, TcpConnection, TcpConnectionFactory};
pub use config::{load_config, ConfigError, PoolConfig};
pub use domain::ports::{Connection, ConnectionFactory};
pub use domain::value_objects::ConnectionState;
pub use infrastructure::{Pool, PoolError, PoolStats, PooledConnection, ReleaseOutcome};
