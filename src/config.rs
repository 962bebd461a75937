//! Pool Configuration
//!
//! Construction parameters for a connection pool, loadable from the
//! environment or embedded in a caller's own configuration file.

use serde::Deserialize;
use std::time::Duration;

/// Connection pool configuration.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Address handed to the factory for every new connection
    pub addr: String,
    /// Maximum number of idle connections retained (values below 1 become 1)
    pub capacity: usize,
    /// Maximum time a connection may sit idle (zero disables)
    #[serde(rename = "idle_timeout_ms", with = "duration_ms")]
    pub idle_timeout: Duration,
    /// Maximum total age of a connection (zero disables)
    #[serde(rename = "ttl_ms", with = "duration_ms")]
    pub ttl: Duration,
    /// Dial timeout used by the TCP factory
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            capacity: 1,
            idle_timeout: Duration::ZERO,
            ttl: Duration::ZERO,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    /// Create a configuration for `addr` with default policies.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Build the address from a host and port, bracketing IPv6 hosts.
    pub fn from_host_port(host: &str, port: u16) -> Self {
        let addr = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        Self::new(addr)
    }

    /// Set the idle retention ceiling.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum connection lifetime.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the dial timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Capacity actually used by the pool.
    pub fn effective_capacity(&self) -> usize {
        self.capacity.max(1)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.trim().is_empty() {
            return Err(ConfigError::MissingAddr);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("addr is required")]
    MissingAddr,
}

/// Load the pool configuration from `CONNPOOL_*` environment variables.
pub fn load_config() -> Result<PoolConfig, ConfigError> {
    let addr = std::env::var("CONNPOOL_ADDR").unwrap_or_default();

    // Negative values collapse to the minimum capacity
    let capacity = std::env::var("CONNPOOL_CAPACITY")
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|c| c.max(1) as usize)
        .unwrap_or(1);

    let idle_timeout = env_millis("CONNPOOL_IDLE_TIMEOUT_MS", Duration::ZERO);
    let ttl = env_millis("CONNPOOL_TTL_MS", Duration::ZERO);
    let connect_timeout = env_millis("CONNPOOL_CONNECT_TIMEOUT_MS", Duration::from_secs(5));

    let cfg = PoolConfig {
        addr,
        capacity,
        idle_timeout,
        ttl,
        connect_timeout,
    };
    cfg.validate()?;
    Ok(cfg)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
