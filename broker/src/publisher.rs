use crate::error::Error;
use crate::manager::ConnectionManager;
use crate::transport::MessageProperties;
use events::Routed;
use log::*;
use serde::Serialize;
use std::sync::Arc;

/// Fire-once JSON publisher on top of the shared connection manager.
///
/// Failures are returned to the caller untouched. Nothing is buffered or
/// retried here; a publish attempted while the link is recovering fails
/// immediately with `ChannelUnavailable`.
#[derive(Clone)]
pub struct Publisher {
    manager: Arc<ConnectionManager>,
}

impl Publisher {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub async fn publish<T>(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &T,
        correlation_id: &str,
    ) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)?;
        let channel = self.manager.channel().await?;
        let properties = MessageProperties::persistent_json(correlation_id);

        channel
            .publish(exchange, routing_key, &body, &properties)
            .await?;

        debug!(
            "Published {} bytes to {exchange} with key {routing_key:?} [{correlation_id}]",
            body.len()
        );
        Ok(())
    }

    /// Publishes an event on the exchange and routing key it declares for itself.
    pub async fn publish_event<E>(&self, event: &E, correlation_id: &str) -> Result<(), Error>
    where
        E: Routed + Serialize,
    {
        self.publish(
            event.exchange(),
            &event.routing_key(),
            event,
            correlation_id,
        )
        .await
    }
}
