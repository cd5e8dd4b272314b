//! Owns the single broker connection of the process and keeps it alive.
//!
//! The link is modelled as one state value behind one async lock so that the
//! liveness flag can never disagree with the handles it describes:
//!
//! ```text
//!   Idle --connect--> Connected --closure--> Recovering --tick ok--> Connected
//!     ^                   |                       |
//!     +------close--------+-----------close-------+
//! ```
//!
//! Exactly one supervisor task runs per manager. While `Connected` it waits for
//! the link's closure signal; while `Recovering` it retries on a fixed interval,
//! redialing only when it holds no live pending link and re-declaring the whole
//! topology before handing the new channel to callers.

use crate::error::{BrokerErrorKind, Error};
use crate::topology::Topology;
use crate::transport::{Channel, ClosedSignal, Connection, Connector, Link};
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(4);

/// Externally observable link state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connected,
    Recovering,
}

enum LinkState {
    Idle,
    Connected {
        connection: Box<dyn Connection>,
        channel: Arc<dyn Channel>,
    },
    Recovering,
}

impl LinkState {
    fn observe(&self) -> ConnectionState {
        match self {
            LinkState::Idle => ConnectionState::Idle,
            LinkState::Connected { .. } => ConnectionState::Connected,
            LinkState::Recovering => ConnectionState::Recovering,
        }
    }
}

pub struct ConnectionManager {
    url: String,
    connector: Arc<dyn Connector>,
    topology: Topology,
    reconnect_interval: Duration,
    state: RwLock<LinkState>,
    shutdown: CancellationToken,
    closed: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// `shutdown` is the process-wide token; the manager listens on a child of
    /// it so that `close()` never cancels anything beyond this manager.
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            url: url.into(),
            connector,
            topology: Topology::standard(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            state: RwLock::new(LinkState::Idle),
            shutdown: shutdown.child_token(),
            closed: AtomicBool::new(false),
            supervisor: Mutex::new(None),
        }
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Dials the broker once and starts supervising the link. A dial failure
    /// here is returned to the caller and no supervisor is started.
    pub async fn connect(self: &Arc<Self>) -> Result<(), Error> {
        if self.has_supervisor() {
            debug!("Broker connection already established");
            return Ok(());
        }

        let Link {
            connection,
            channel,
            closed,
        } = self.connector.dial(&self.url).await?;
        self.install(connection, channel).await?;

        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move { manager.supervise(closed).await });
        if let Ok(mut slot) = self.supervisor.lock() {
            *slot = Some(handle);
        }

        info!("Connected to message broker");
        Ok(())
    }

    /// Returns the current channel without waiting for recovery.
    pub async fn channel(&self) -> Result<Arc<dyn Channel>, Error> {
        match &*self.state.read().await {
            LinkState::Connected { channel, .. } => Ok(Arc::clone(channel)),
            _ => Err(Error::channel_unavailable()),
        }
    }

    pub async fn declare_topology(&self) -> Result<(), Error> {
        let channel = self.channel().await?;
        self.topology.declare(channel.as_ref()).await
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.read().await.observe()
    }

    pub async fn is_alive(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Stops the supervisor and releases the link. Safe to call repeatedly.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();

        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, LinkState::Idle)
        };
        if let LinkState::Connected {
            connection,
            channel,
        } = previous
        {
            release(channel, connection).await;
        }

        let handle = self.supervisor.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Broker supervisor ended abnormally: {e}");
            }
        }

        info!("Broker connection closed");
    }

    fn has_supervisor(&self) -> bool {
        self.supervisor
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    async fn install(
        &self,
        connection: Box<dyn Connection>,
        channel: Arc<dyn Channel>,
    ) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if self.shutdown.is_cancelled() {
            drop(state);
            release(channel, connection).await;
            return Err(Error::new(BrokerErrorKind::Other(
                "connection manager is shutting down".to_string(),
            )));
        }
        *state = LinkState::Connected {
            connection,
            channel,
        };
        Ok(())
    }

    async fn supervise(self: Arc<Self>, mut closed: ClosedSignal) {
        loop {
            let reason = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    self.release_on_shutdown().await;
                    return;
                }
                reason = &mut closed => {
                    reason.unwrap_or_else(|_| "connection dropped".to_string())
                }
            };

            warn!("Broker connection lost: {reason}; recovering");
            if !self.mark_recovering().await {
                self.release_on_shutdown().await;
                return;
            }

            match self.recover().await {
                Some(next) => closed = next,
                None => {
                    self.release_on_shutdown().await;
                    return;
                }
            }
        }
    }

    /// Drops the installed link once the process-wide token fires, so the
    /// manager stops handing out a channel before `close()` is called.
    async fn release_on_shutdown(&self) {
        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, LinkState::Idle)
        };
        if let LinkState::Connected {
            connection,
            channel,
        } = previous
        {
            release(channel, connection).await;
            info!("Broker link released on shutdown");
        }
    }

    /// Returns false when shutdown already owns the state.
    async fn mark_recovering(&self) -> bool {
        let previous = {
            let mut state = self.state.write().await;
            if self.shutdown.is_cancelled() {
                return false;
            }
            std::mem::replace(&mut *state, LinkState::Recovering)
        };
        if let LinkState::Connected {
            connection,
            channel,
        } = previous
        {
            release(channel, connection).await;
        }
        true
    }

    /// Runs until a link is installed (returning its closure signal) or until
    /// shutdown (returning `None`).
    async fn recover(&self) -> Option<ClosedSignal> {
        let mut ticker = time::interval_at(
            Instant::now() + self.reconnect_interval,
            self.reconnect_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending: Option<Link> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    if let Some(link) = pending.take() {
                        release(link.channel, link.connection).await;
                    }
                    return None;
                }
                _ = ticker.tick() => {}
            }

            let reusable = match pending.as_mut() {
                Some(link) => link.is_open(),
                None => false,
            };
            if !reusable {
                if let Some(stale) = pending.take() {
                    release(stale.channel, stale.connection).await;
                }
                match self.connector.dial(&self.url).await {
                    Ok(link) => pending = Some(link),
                    Err(e) => {
                        warn!("Broker reconnect failed: {e}");
                        continue;
                    }
                }
            }

            let declared = match pending.as_ref() {
                Some(link) => self.topology.declare(link.channel.as_ref()).await,
                None => continue,
            };
            if let Err(e) = declared {
                warn!("Topology declaration after reconnect failed: {e}");
                continue;
            }

            let Some(Link {
                connection,
                channel,
                closed,
            }) = pending.take()
            else {
                continue;
            };
            return match self.install(connection, channel).await {
                Ok(()) => {
                    info!("Broker connection recovered");
                    Some(closed)
                }
                Err(_) => None,
            };
        }
    }
}

async fn release(channel: Arc<dyn Channel>, connection: Box<dyn Connection>) {
    if let Err(e) = channel.close().await {
        debug!("Closing broker channel failed: {e}");
    }
    if let Err(e) = connection.close().await {
        debug!("Closing broker connection failed: {e}");
    }
}
