//! Stand-in for an authenticated client, for crates that need to observe what
//! gets pushed without driving a socket.

use crate::connection::{ActorId, Outbound, PushConnection};
use crate::hub::Hub;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct TestClient {
    receiver: UnboundedReceiver<Outbound>,
}

/// Registers a connection for `actor` as if it had just authenticated.
pub fn attach(hub: &Hub, actor: ActorId) -> TestClient {
    let (connection, receiver) = PushConnection::open(actor);
    hub.add(connection);
    TestClient { receiver }
}

impl TestClient {
    /// Drains every frame delivered so far.
    pub fn frames(&mut self) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(outbound) = self.receiver.try_recv() {
            if let Outbound::Frame(text) = outbound {
                if let Ok(value) = serde_json::from_str(&text) {
                    frames.push(value);
                }
            }
        }
        frames
    }

    /// Simulates the writer going away while the hub entry survives.
    pub fn hang_up(self) {
        drop(self.receiver);
    }
}
