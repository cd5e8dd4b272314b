//! In-process broker used by tests across the workspace.
//!
//! Behaves like a single AMQP node: declarations are idempotent, redeclaring an
//! exchange with a different kind is rejected, and every publish is recorded.
//! Tests can make the node unreachable, sever live connections, and inject
//! declaration or publish failures.

use crate::error::{BrokerErrorKind, Error};
use crate::transport::{Channel, Connection, Connector, ExchangeKind, Link, MessageProperties};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub properties: MessageProperties,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

struct OpenLink {
    alive: Arc<AtomicBool>,
    closed: Option<oneshot::Sender<String>>,
}

#[derive(Default)]
struct NodeState {
    unreachable: bool,
    fail_declarations: bool,
    fail_publishes: bool,
    dials: usize,
    exchanges: BTreeMap<String, ExchangeKind>,
    queues: BTreeSet<String>,
    bindings: BTreeSet<(String, String, String)>,
    published: Vec<PublishedMessage>,
    links: Vec<OpenLink>,
}

#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<NodeState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MemoryConnector {
            state: Arc::clone(&self.state),
        })
    }

    /// Refuse (or accept again) new dials.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().unreachable = !reachable;
    }

    pub fn fail_declarations(&self, fail: bool) {
        self.lock().fail_declarations = fail;
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.lock().fail_publishes = fail;
    }

    /// Drops every open connection and fires their closure notifications.
    pub fn sever(&self, reason: &str) {
        let mut state = self.lock();
        for mut link in state.links.drain(..) {
            link.alive.store(false, Ordering::SeqCst);
            if let Some(tx) = link.closed.take() {
                let _ = tx.send(reason.to_string());
            }
        }
    }

    pub fn dial_count(&self) -> usize {
        self.lock().dials
    }

    pub fn open_links(&self) -> usize {
        self.lock()
            .links
            .iter()
            .filter(|l| l.alive.load(Ordering::SeqCst))
            .count()
    }

    pub fn exchanges(&self) -> Vec<(String, ExchangeKind)> {
        self.lock()
            .exchanges
            .iter()
            .map(|(name, kind)| (name.clone(), *kind))
            .collect()
    }

    pub fn queues(&self) -> Vec<String> {
        self.lock().queues.iter().cloned().collect()
    }

    /// (queue, exchange, routing key) triples, sorted.
    pub fn bindings(&self) -> Vec<(String, String, String)> {
        self.lock().bindings.iter().cloned().collect()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<NodeState>) -> MutexGuard<'_, NodeState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct MemoryConnector {
    state: Arc<Mutex<NodeState>>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn dial(&self, _url: &str) -> Result<Link, Error> {
        let mut state = lock(&self.state);
        state.dials += 1;
        if state.unreachable {
            return Err(Error::with_source(
                BrokerErrorKind::Connection,
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "broker unreachable"),
            ));
        }

        let alive = Arc::new(AtomicBool::new(true));
        let (tx, rx) = oneshot::channel();
        state.links.push(OpenLink {
            alive: Arc::clone(&alive),
            closed: Some(tx),
        });

        Ok(Link {
            connection: Box::new(MemoryConnection {
                alive: Arc::clone(&alive),
            }),
            channel: Arc::new(MemoryChannel {
                state: Arc::clone(&self.state),
                alive,
            }),
            closed: rx,
        })
    }
}

struct MemoryConnection {
    alive: Arc<AtomicBool>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn close(&self) -> Result<(), Error> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryChannel {
    state: Arc<Mutex<NodeState>>,
    alive: Arc<AtomicBool>,
}

impl MemoryChannel {
    fn open_state(&self) -> Result<MutexGuard<'_, NodeState>, Error> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(Error::new(BrokerErrorKind::Other(
                "channel is closed".to_string(),
            )));
        }
        Ok(lock(&self.state))
    }

    fn declaration_guard(state: &NodeState) -> Result<(), Error> {
        if state.fail_declarations {
            return Err(Error::new(BrokerErrorKind::Declaration));
        }
        Ok(())
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), Error> {
        let mut state = self.open_state()?;
        Self::declaration_guard(&state)?;
        match state.exchanges.get(name) {
            Some(existing) if *existing != kind => Err(Error::new(BrokerErrorKind::Declaration)),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(name.to_string(), kind);
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, name: &str) -> Result<(), Error> {
        let mut state = self.open_state()?;
        Self::declaration_guard(&state)?;
        state.queues.insert(name.to_string());
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), Error> {
        let mut state = self.open_state()?;
        Self::declaration_guard(&state)?;
        if !state.queues.contains(queue) || !state.exchanges.contains_key(exchange) {
            return Err(Error::new(BrokerErrorKind::Declaration));
        }
        state.bindings.insert((
            queue.to_string(),
            exchange.to_string(),
            routing_key.to_string(),
        ));
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: &MessageProperties,
    ) -> Result<(), Error> {
        let mut state = self.open_state()?;
        if state.fail_publishes {
            return Err(Error::new(BrokerErrorKind::Publish));
        }
        state.published.push(PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.to_vec(),
            properties: properties.clone(),
        });
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.alive.store(false, Ordering::SeqCst);
        Ok(())
    }
}
