//! TCP Connection Factory
//!
//! Default factory: dials a plain TCP stream with a connect timeout.
//! Anything above the byte stream (TLS, framing, auth) belongs to the caller.

use crate::config::PoolConfig;
use crate::domain::ports::{Connection, ConnectionFactory};
use crate::domain::value_objects::ConnectionState;
use async_trait::async_trait;
use futures::FutureExt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// A pooled TCP stream.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    shut_down: bool,
    /// Peer sent FIN
    peer_closed: AtomicBool,
    /// Socket reported an error; `take_error` clears it, so remember it here
    failed: AtomicBool,
}

impl TcpConnection {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer_addr,
            shut_down: false,
            peer_closed: AtomicBool::new(false),
            failed: AtomicBool::new(false),
        })
    }

    /// Remote address of the stream.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

#[async_trait]
impl Connection for TcpConnection {
    fn state(&self) -> ConnectionState {
        if self.shut_down || self.peer_closed.load(Ordering::Relaxed) {
            return ConnectionState::Shutdown;
        }
        if self.failed.load(Ordering::Relaxed) {
            return ConnectionState::TransientFailure;
        }
        if !matches!(self.stream.take_error(), Ok(None)) {
            self.failed.store(true, Ordering::Relaxed);
            return ConnectionState::TransientFailure;
        }

        // Single poll: pending means nothing to read, which is the healthy idle case
        let mut buf = [0u8; 1];
        match self.stream.peek(&mut buf).now_or_never() {
            Some(Ok(0)) => {
                self.peer_closed.store(true, Ordering::Relaxed);
                ConnectionState::Shutdown
            }
            Some(Err(_)) => {
                self.failed.store(true, Ordering::Relaxed);
                ConnectionState::TransientFailure
            }
            Some(Ok(_)) | None => ConnectionState::Ready,
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.stream.shutdown().await
    }
}

/// Dials TCP connections.
#[derive(Debug, Clone)]
pub struct TcpConnectionFactory {
    connect_timeout: Duration,
}

impl TcpConnectionFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.connect_timeout)
    }
}

impl Default for TcpConnectionFactory {
    fn default() -> Self {
        Self::new(PoolConfig::default().connect_timeout)
    }
}

#[async_trait]
impl ConnectionFactory for TcpConnectionFactory {
    type Connection = TcpConnection;
    type Error = TcpConnectError;

    async fn connect(&self, addr: &str) -> Result<TcpConnection, TcpConnectError> {
        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(TcpConnectError::Io {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(TcpConnectError::Timeout {
                    addr: addr.to_string(),
                    timeout: self.connect_timeout,
                })
            }
        };

        TcpConnection::new(stream).map_err(|source| TcpConnectError::Io {
            addr: addr.to_string(),
            source,
        })
    }
}

/// TCP dial errors.
#[derive(Debug, thiserror::Error)]
pub enum TcpConnectError {
    #[error("connection to {addr} failed: {source}")]
    Io {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("connection to {addr} timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },
}
