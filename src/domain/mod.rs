//! Domain Layer
//!
//! Ports the pool depends on and the primitives they exchange.

pub mod ports;
pub mod value_objects;

pub use value_objects::ConnectionState;
