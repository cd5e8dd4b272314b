//! lapin backed implementation of the transport traits.

use crate::error::{BrokerErrorKind, Error};
use crate::transport::{Channel, Connection, Connector, ExchangeKind, Link, MessageProperties};
use async_trait::async_trait;
use lapin::options::{
    BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, ConnectionProperties};
use log::*;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

const REPLY_SUCCESS: u16 = 200;

/// Dials AMQP 0-9-1 brokers. Heartbeat and vhost travel in the URL.
pub struct AmqpConnector {
    connection_name: String,
}

impl AmqpConnector {
    pub fn new(connection_name: impl Into<String>) -> Self {
        Self {
            connection_name: connection_name.into(),
        }
    }
}

impl Default for AmqpConnector {
    fn default() -> Self {
        Self::new("ride-hail")
    }
}

#[async_trait]
impl Connector for AmqpConnector {
    async fn dial(&self, url: &str) -> Result<Link, Error> {
        let connection = lapin::Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| Error::with_source(BrokerErrorKind::Connection, e))?;

        let (closed_tx, closed_rx) = oneshot::channel();
        let notify = Mutex::new(Some(closed_tx));
        connection.on_error(move |err| {
            if let Ok(mut slot) = notify.lock() {
                if let Some(tx) = slot.take() {
                    let _ = tx.send(err.to_string());
                }
            }
        });

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close(REPLY_SUCCESS, "channel open failed").await;
                return Err(Error::with_source(BrokerErrorKind::Connection, e));
            }
        };

        debug!(
            "Opened AMQP channel {} on connection {}",
            channel.id(),
            self.connection_name
        );

        Ok(Link {
            connection: Box::new(AmqpConnection(connection)),
            channel: Arc::new(AmqpChannel(channel)),
            closed: closed_rx,
        })
    }
}

struct AmqpConnection(lapin::Connection);

#[async_trait]
impl Connection for AmqpConnection {
    async fn close(&self) -> Result<(), Error> {
        if !self.0.status().connected() {
            return Ok(());
        }
        self.0
            .close(REPLY_SUCCESS, "bye")
            .await
            .map_err(|e| Error::with_source(BrokerErrorKind::Connection, e))
    }
}

struct AmqpChannel(lapin::Channel);

#[async_trait]
impl Channel for AmqpChannel {
    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), Error> {
        let kind = match kind {
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        };
        self.0
            .exchange_declare(
                name,
                kind,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::with_source(BrokerErrorKind::Declaration, e))
    }

    async fn declare_queue(&self, name: &str) -> Result<(), Error> {
        self.0
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map(|_| ())
            .map_err(|e| Error::with_source(BrokerErrorKind::Declaration, e))
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        self.0
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::with_source(BrokerErrorKind::Declaration, e))
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), Error> {
        let mut amqp_properties = BasicProperties::default()
            .with_content_type(ShortString::from(properties.content_type.clone()))
            .with_timestamp(properties.timestamp);
        if properties.persistent {
            amqp_properties = amqp_properties.with_delivery_mode(2);
        }
        if let Some(correlation_id) = &properties.correlation_id {
            amqp_properties =
                amqp_properties.with_correlation_id(ShortString::from(correlation_id.clone()));
        }

        self.0
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                amqp_properties,
            )
            .await
            .map(|_confirm| ())
            .map_err(|e| Error::with_source(BrokerErrorKind::Publish, e))
    }

    async fn close(&self) -> Result<(), Error> {
        if !self.0.status().connected() {
            return Ok(());
        }
        self.0
            .close(REPLY_SUCCESS, "bye")
            .await
            .map_err(|e| Error::with_source(BrokerErrorKind::Connection, e))
    }
}
