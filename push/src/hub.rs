use crate::connection::{ActorId, ConnectionId, PushConnection};
use crate::error::{Error, PushErrorKind};
use crate::message::EventType;
use dashmap::DashMap;
use log::*;
use serde::Serialize;

/// Process-wide registry of authenticated push connections, at most one per
/// actor. Every operation is a single map operation, so `add` replacing an
/// existing entry is atomic with respect to concurrent `send`s.
#[derive(Default)]
pub struct Hub {
    connections: DashMap<ActorId, PushConnection>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `connection`, closing whichever connection it replaces.
    pub fn add(&self, connection: PushConnection) {
        let actor = connection.actor().clone();
        let id = connection.id().clone();
        if let Some(previous) = self.connections.insert(actor.clone(), connection) {
            info!(
                "Replacing push connection {} for {actor} with {}",
                previous.id().as_str(),
                id.as_str()
            );
            previous.close();
        } else {
            debug!("Registered push connection {} for {actor}", id.as_str());
        }
    }

    /// Removes and closes the actor's connection. Returns whether one existed.
    pub fn remove(&self, actor: &ActorId) -> bool {
        match self.connections.remove(actor) {
            Some((_, connection)) => {
                connection.close();
                debug!("Removed push connection for {actor}");
                true
            }
            None => false,
        }
    }

    /// Removes the actor's entry only if it is still the given connection.
    pub fn release(&self, actor: &ActorId, connection_id: &ConnectionId) -> bool {
        let released = self
            .connections
            .remove_if(actor, |_, connection| connection.id() == connection_id)
            .is_some();
        if released {
            debug!(
                "Released push connection {} for {actor}",
                connection_id.as_str()
            );
        }
        released
    }

    pub fn send<M>(&self, actor: &ActorId, message: &M) -> Result<(), Error>
    where
        M: Serialize + EventType,
    {
        let Some(connection) = self.connections.get(actor) else {
            return Err(Error::new(PushErrorKind::ActorNotConnected));
        };

        let frame = serde_json::to_string(message)?;
        if !connection.deliver(frame) {
            warn!(
                "Failed to push {} to {actor}: connection {} has no writer",
                message.event_type(),
                connection.id().as_str()
            );
            return Err(Error::new(PushErrorKind::SendFailed));
        }

        trace!("Pushed {} to {actor}", message.event_type());
        Ok(())
    }

    pub fn is_connected(&self, actor: &ActorId) -> bool {
        self.connections.contains_key(actor)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
