mod connection;
mod connection_factory;

pub use connection::Connection;
pub use connection_factory::ConnectionFactory;
