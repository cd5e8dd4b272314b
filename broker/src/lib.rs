//! Message broker plumbing: one supervised AMQP connection per process, the
//! exchange/queue layout every service relies on, and a JSON publisher.

pub mod amqp;
pub mod error;
pub mod manager;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod publisher;
pub mod topology;
pub mod transport;

pub use amqp::AmqpConnector;
pub use error::{BrokerErrorKind, Error};
pub use manager::{ConnectionManager, ConnectionState, DEFAULT_RECONNECT_INTERVAL};
pub use publisher::Publisher;
pub use topology::Topology;
