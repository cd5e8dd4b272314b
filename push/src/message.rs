//! JSON frames exchanged over a push connection.

use serde::{Deserialize, Serialize};

/// Trait for getting the frame type name used in logs.
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// Frames a client may send. Only the authentication frame is meaningful;
/// anything else after authentication is logged and ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth { token: String },
}

/// Protocol-level replies from the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Info { message: String },
    Error { message: String },
}

impl ServerMessage {
    pub fn info(message: impl Into<String>) -> Self {
        ServerMessage::Info {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

impl EventType for ServerMessage {
    fn event_type(&self) -> &'static str {
        match self {
            ServerMessage::Info { .. } => "info",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Application notifications pushed to passengers and drivers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    RideUpdate {
        ride_id: String,
        status: String,
        message: String,
    },
    StatusUpdate {
        status: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ride_id: Option<String>,
    },
}

impl EventType for Notification {
    fn event_type(&self) -> &'static str {
        match self {
            Notification::RideUpdate { .. } => "ride_update",
            Notification::StatusUpdate { .. } => "status_update",
        }
    }
}
