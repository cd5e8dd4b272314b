use std::fmt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorRole {
    Passenger,
    Driver,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Passenger => write!(f, "passenger"),
            ActorRole::Driver => write!(f, "driver"),
        }
    }
}

/// Who is on the other end of a push connection. Passengers and drivers live
/// in separate namespaces, so the same raw id may appear under both roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId {
    pub role: ActorRole,
    pub id: String,
}

impl ActorId {
    pub fn new(role: ActorRole, id: impl Into<String>) -> Self {
        Self {
            role,
            id: id.into(),
        }
    }

    pub fn passenger(id: impl Into<String>) -> Self {
        Self::new(ActorRole::Passenger, id)
    }

    pub fn driver(id: impl Into<String>) -> Self {
        Self::new(ActorRole::Driver, id)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// What the hub hands to a session's writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(String),
    /// The connection was replaced or removed; the session should close.
    Close,
}

/// Registry-side half of an authenticated socket. The session owns the
/// receiving half and is the only thing that ever writes to the socket.
#[derive(Debug)]
pub struct PushConnection {
    id: ConnectionId,
    actor: ActorId,
    sender: UnboundedSender<Outbound>,
}

impl PushConnection {
    pub(crate) fn open(actor: ActorId) -> (Self, UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id: ConnectionId::new(),
            actor,
            sender,
        };
        (connection, receiver)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// False once the session's writer is gone.
    pub(crate) fn deliver(&self, frame: String) -> bool {
        self.sender.send(Outbound::Frame(frame)).is_ok()
    }

    pub(crate) fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }
}
