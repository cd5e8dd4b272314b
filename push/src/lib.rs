//! Real-time push to mobile clients over WebSocket.
//!
//! # Architecture
//!
//! - **One connection per actor**: a passenger or driver holds at most one
//!   authenticated socket. A newer socket replaces and closes the older one.
//! - **Authenticate first**: a socket is only registered after its first data
//!   frame carries a bearer token issued to the actor named in the URL.
//! - **Ephemeral frames**: pushes to an actor that is not connected fail with
//!   `ActorNotConnected` and are not queued.
//! - **Single writer**: the session owns the socket; the hub only enqueues
//!   frames on the session's channel.
//!
//! # Modules
//!
//! - `hub`: the connection registry
//! - `session`: handshake, keep-alive and outbound forwarding for one socket
//! - `message`: typed JSON frames
//! - `auth`: the token verification port

pub mod auth;
pub mod connection;
pub mod error;
pub mod hub;
pub mod message;
pub mod session;
#[cfg(any(test, feature = "mock"))]
pub mod testing;

pub use auth::TokenVerifier;
pub use connection::{ActorId, ActorRole, ConnectionId};
pub use error::{Error, PushErrorKind};
pub use hub::Hub;
pub use message::{Notification, ServerMessage};
pub use session::{SessionConfig, SessionEnd, SessionHandler};
