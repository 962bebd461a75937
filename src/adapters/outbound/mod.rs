mod tcp_factory;

pub use tcp_factory::{TcpConnectError, TcpConnection, TcpConnectionFactory};
