//! Transport seam between the connection manager and a concrete broker client.
//!
//! The manager only ever talks to these traits. `amqp` provides the lapin
//! implementation used in production and `memory` an in-process one for tests.

use crate::error::Error;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Fires once when the underlying connection goes away. The value is a
/// human readable reason; a dropped sender means the same thing.
pub type ClosedSignal = oneshot::Receiver<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    Topic,
    Fanout,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Topic => "topic",
            ExchangeKind::Fanout => "fanout",
        }
    }
}

/// Per-message metadata stamped by the publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageProperties {
    pub content_type: String,
    pub persistent: bool,
    /// Seconds since the unix epoch.
    pub timestamp: u64,
    pub correlation_id: Option<String>,
}

impl MessageProperties {
    /// Persistent JSON message stamped with the current time.
    pub fn persistent_json(correlation_id: &str) -> Self {
        let timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        Self {
            content_type: "application/json".to_string(),
            persistent: true,
            timestamp,
            correlation_id: (!correlation_id.is_empty()).then(|| correlation_id.to_string()),
        }
    }
}

#[async_trait]
pub trait Channel: Send + Sync {
    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), Error>;

    async fn declare_queue(&self, name: &str) -> Result<(), Error>;

    async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str)
        -> Result<(), Error>;

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), Error>;

    async fn close(&self) -> Result<(), Error>;
}

#[async_trait]
pub trait Connection: Send + Sync {
    async fn close(&self) -> Result<(), Error>;
}

/// Everything a successful dial hands back.
pub struct Link {
    pub connection: Box<dyn Connection>,
    pub channel: Arc<dyn Channel>,
    pub closed: ClosedSignal,
}

impl Link {
    /// True while the closure notification has not fired.
    pub fn is_open(&mut self) -> bool {
        matches!(
            self.closed.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        )
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, url: &str) -> Result<Link, Error>;
}
