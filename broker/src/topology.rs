//! Declarative exchange / queue / binding layout.
//!
//! The layout is fixed at construction and re-applied wholesale on every
//! (re)connect. Declaration is idempotent on the broker side, so applying it to
//! a broker that already carries it is a no-op.

use crate::error::Error;
use crate::transport::{Channel, ExchangeKind};
use events::exchange;
use log::*;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub queue: String,
    pub exchange: String,
    /// Ignored when the exchange is a fanout.
    pub routing_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    exchanges: Vec<ExchangeSpec>,
    bindings: Vec<QueueBinding>,
}

impl Topology {
    pub fn new(exchanges: Vec<ExchangeSpec>, bindings: Vec<QueueBinding>) -> Self {
        Self {
            exchanges,
            bindings,
        }
    }

    /// The layout every Ride Hail service and consumer relies on.
    pub fn standard() -> Self {
        let exchanges = vec![
            exchange_spec(exchange::RIDE_TOPIC, ExchangeKind::Topic),
            exchange_spec(exchange::DRIVER_TOPIC, ExchangeKind::Topic),
            exchange_spec(exchange::LOCATION_FANOUT, ExchangeKind::Fanout),
        ];
        let bindings = vec![
            binding("ride_requests", exchange::RIDE_TOPIC, "ride.request.*"),
            binding("ride_status", exchange::RIDE_TOPIC, "ride.status.*"),
            binding("driver_matching", exchange::RIDE_TOPIC, "ride.request.*"),
            binding("driver_responses", exchange::DRIVER_TOPIC, "driver.response.*"),
            binding("driver_status", exchange::DRIVER_TOPIC, "driver.status.*"),
            binding("location_updates_ride", exchange::LOCATION_FANOUT, ""),
        ];
        Self::new(exchanges, bindings)
    }

    pub fn exchanges(&self) -> &[ExchangeSpec] {
        &self.exchanges
    }

    pub fn bindings(&self) -> &[QueueBinding] {
        &self.bindings
    }

    /// Queue names in first-seen order, without duplicates.
    pub fn queues(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.bindings
            .iter()
            .map(|b| b.queue.as_str())
            .filter(|queue| seen.insert(*queue))
            .collect()
    }

    /// Declares exchanges, then queues, then bindings. The first failure
    /// aborts the pass and is returned; retrying is the caller's business.
    pub async fn declare(&self, channel: &dyn Channel) -> Result<(), Error> {
        for exchange in &self.exchanges {
            channel.declare_exchange(&exchange.name, exchange.kind).await?;
        }

        for queue in self.queues() {
            channel.declare_queue(queue).await?;
        }

        for binding in &self.bindings {
            let key = self.effective_key(binding);
            channel
                .bind_queue(&binding.queue, &binding.exchange, key)
                .await?;
        }

        debug!(
            "Declared topology: {} exchanges, {} bindings",
            self.exchanges.len(),
            self.bindings.len()
        );
        Ok(())
    }

    fn effective_key<'a>(&self, binding: &'a QueueBinding) -> &'a str {
        let fanout = self
            .exchanges
            .iter()
            .any(|e| e.name == binding.exchange && e.kind == ExchangeKind::Fanout);
        if fanout {
            ""
        } else {
            &binding.routing_key
        }
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::standard()
    }
}

fn exchange_spec(name: &str, kind: ExchangeKind) -> ExchangeSpec {
    ExchangeSpec {
        name: name.to_string(),
        kind,
    }
}

fn binding(queue: &str, exchange: &str, routing_key: &str) -> QueueBinding {
    QueueBinding {
        queue: queue.to_string(),
        exchange: exchange.to_string(),
        routing_key: routing_key.to_string(),
    }
}
