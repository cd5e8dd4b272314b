//! Lifecycle of a single upgraded socket, from the authentication handshake
//! through the keep-alive loop to deregistration.
//!
//! The handler is generic over the socket halves so it can be driven by an
//! axum `WebSocket` in production and by plain channels in tests.

use crate::auth::{strip_bearer, TokenVerifier};
use crate::connection::{ActorId, ConnectionId, Outbound, PushConnection};
use crate::hub::Hub;
use crate::message::{ClientMessage, ServerMessage};
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use log::*;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{self, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a fresh socket may stay silent before it must authenticate.
    pub auth_timeout: Duration,
    pub ping_interval: Duration,
    /// Write deadline for every frame, pings included.
    pub ping_timeout: Duration,
    /// A client silent for longer than this at a ping tick is dropped.
    pub pong_wait: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(5),
            pong_wait: Duration::from_secs(60),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    AuthTimeout,
    AuthRejected(String),
    /// The client closed the socket.
    Closed,
    ReadError,
    PingFailed,
    Unresponsive,
    WriteFailed,
    /// A newer connection for the same actor took over.
    Replaced,
}

#[derive(Clone)]
pub struct SessionHandler {
    hub: Arc<Hub>,
    verifier: Arc<dyn TokenVerifier>,
    config: SessionConfig,
}

impl SessionHandler {
    pub fn new(hub: Arc<Hub>, verifier: Arc<dyn TokenVerifier>, config: SessionConfig) -> Self {
        Self {
            hub,
            verifier,
            config,
        }
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Drives one socket until it ends. `expected` is the actor named by the
    /// URL the client connected to; the token must have been issued to it.
    pub async fn run<S, R, E>(&self, expected: ActorId, mut sink: S, mut stream: R) -> SessionEnd
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let actor = match self.authenticate(&expected, &mut stream).await {
            Ok(actor) => actor,
            Err((end, reason)) => {
                info!("Push authentication for {expected} failed: {reason}");
                let frame = ServerMessage::error(reason);
                let _ = self.write_json(&mut sink, &frame).await;
                let _ = sink.close().await;
                return end;
            }
        };

        let (connection, mut outbound) = PushConnection::open(actor.clone());
        let _registration = Registration {
            hub: Arc::clone(&self.hub),
            actor: actor.clone(),
            connection_id: connection.id().clone(),
        };
        self.hub.add(connection);
        info!("Push connection authenticated for {actor}");

        if let Err(e) = self
            .write_json(&mut sink, &ServerMessage::info("authenticated"))
            .await
        {
            warn!("Failed to confirm authentication to {actor}: {e}");
            return SessionEnd::WriteFailed;
        }

        let end = self
            .steady_state(&actor, &mut sink, &mut stream, &mut outbound)
            .await;
        info!("Push connection for {actor} ended: {end:?}");
        end
    }

    async fn authenticate<R, E>(
        &self,
        expected: &ActorId,
        stream: &mut R,
    ) -> Result<ActorId, (SessionEnd, String)>
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let rejected =
            |reason: &str| (SessionEnd::AuthRejected(reason.to_string()), reason.to_string());

        let text = match time::timeout(self.config.auth_timeout, next_data_frame(stream)).await {
            Err(_) => {
                return Err((
                    SessionEnd::AuthTimeout,
                    "authentication timeout".to_string(),
                ))
            }
            Ok(AuthFrame::Closed) => {
                return Err((SessionEnd::Closed, "connection closed".to_string()))
            }
            Ok(AuthFrame::Malformed) => return Err(rejected("invalid auth message format")),
            Ok(AuthFrame::Data(text)) => text,
        };

        let ClientMessage::Auth { token } = serde_json::from_str::<ClientMessage>(&text)
            .map_err(|_| rejected("invalid auth message format"))?;
        let token = strip_bearer(&token).ok_or_else(|| rejected("invalid auth format"))?;

        let actor = self.verifier.verify(token).map_err(|e| {
            debug!("Token rejected for {expected}: {e}");
            rejected("invalid token")
        })?;
        if &actor != expected {
            return Err(rejected("token does not match connection"));
        }
        Ok(actor)
    }

    async fn steady_state<S, R, E>(
        &self,
        actor: &ActorId,
        sink: &mut S,
        stream: &mut R,
        outbound: &mut UnboundedReceiver<Outbound>,
    ) -> SessionEnd
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let interval = self.config.ping_interval;
        let mut ping = time::interval_at(Instant::now() + interval, interval);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                _ = ping.tick() => {
                    if last_seen.elapsed() > self.config.pong_wait {
                        warn!("{actor} unresponsive for {:?}, disconnecting", last_seen.elapsed());
                        return SessionEnd::Unresponsive;
                    }
                    if let Err(e) = self.write(sink, Message::Ping(Vec::new().into())).await {
                        warn!("Ping to {actor} failed: {e}");
                        return SessionEnd::PingFailed;
                    }
                }
                frame = outbound.recv() => match frame {
                    Some(Outbound::Frame(text)) => {
                        if let Err(e) = self.write(sink, Message::Text(text.into())).await {
                            warn!("Write to {actor} failed: {e}");
                            return SessionEnd::WriteFailed;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = self.write(sink, Message::Close(None)).await;
                        return SessionEnd::Replaced;
                    }
                },
                inbound = stream.next() => match inbound {
                    None | Some(Ok(Message::Close(_))) => return SessionEnd::Closed,
                    Some(Err(e)) => {
                        info!("Read from {actor} failed: {e}");
                        return SessionEnd::ReadError;
                    }
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        debug!("Message from {actor}: {}", text.as_str());
                    }
                    Some(Ok(_)) => last_seen = Instant::now(),
                },
            }
        }
    }

    async fn write_json<S, T>(&self, sink: &mut S, message: &T) -> Result<(), String>
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
        T: serde::Serialize,
    {
        let text = serde_json::to_string(message).map_err(|e| e.to_string())?;
        self.write(sink, Message::Text(text.into())).await
    }

    /// Sends one frame under the write deadline.
    async fn write<S>(&self, sink: &mut S, message: Message) -> Result<(), String>
    where
        S: Sink<Message> + Unpin,
        S::Error: Display,
    {
        match time::timeout(self.config.ping_timeout, sink.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("write deadline exceeded".to_string()),
        }
    }
}

/// First data frame a client sends while authenticating.
enum AuthFrame {
    Data(String),
    /// A binary frame that is not UTF-8.
    Malformed,
    Closed,
}

/// Next text (or UTF-8 binary) frame, skipping control frames.
async fn next_data_frame<R, E>(stream: &mut R) -> AuthFrame
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => return AuthFrame::Data(text.as_str().to_string()),
            Ok(Message::Binary(data)) => {
                return match String::from_utf8(data.to_vec()) {
                    Ok(text) => AuthFrame::Data(text),
                    Err(_) => AuthFrame::Malformed,
                }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => return AuthFrame::Closed,
            Err(e) => {
                debug!("Read during authentication failed: {e}");
                return AuthFrame::Closed;
            }
        }
    }
    AuthFrame::Closed
}

/// Releases the hub entry on every exit path of an authenticated session.
struct Registration {
    hub: Arc<Hub>,
    actor: ActorId,
    connection_id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.release(&self.actor, &self.connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, PushErrorKind};
    use crate::message::Notification;
    use futures::channel::mpsc;
    use tokio::task::JoinHandle;

    struct FixedVerifier;

    impl TokenVerifier for FixedVerifier {
        fn verify(&self, token: &str) -> Result<ActorId, Error> {
            match token {
                "passenger-token" => Ok(ActorId::passenger("p1")),
                "driver-token" => Ok(ActorId::driver("d1")),
                _ => Err(Error::new(PushErrorKind::InvalidToken)),
            }
        }
    }

    struct Client {
        to_server: mpsc::UnboundedSender<Result<Message, axum::Error>>,
        from_server: mpsc::UnboundedReceiver<Message>,
        session: JoinHandle<SessionEnd>,
    }

    impl Client {
        fn send_text(&self, text: &str) {
            self.to_server
                .unbounded_send(Ok(Message::Text(text.to_string().into())))
                .unwrap();
        }

        fn authenticate(&self, token: &str) {
            self.send_text(&format!(r#"{{"type":"auth","token":"Bearer {token}"}}"#));
        }

        async fn next_json(&mut self) -> serde_json::Value {
            loop {
                match self.from_server.next().await.expect("socket closed") {
                    Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                    Message::Ping(_) => continue,
                    other => panic!("unexpected frame {other:?}"),
                }
            }
        }
    }

    fn handler(hub: &Arc<Hub>) -> SessionHandler {
        SessionHandler::new(
            Arc::clone(hub),
            Arc::new(FixedVerifier),
            SessionConfig::default(),
        )
    }

    fn connect(handler: &SessionHandler, actor: ActorId) -> Client {
        let (to_server, server_rx) = mpsc::unbounded();
        let (server_tx, from_server) = mpsc::unbounded();
        let handler = handler.clone();
        let session = tokio::spawn(async move { handler.run(actor, server_tx, server_rx).await });
        Client {
            to_server,
            from_server,
            session,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn authenticated_session_registers_and_receives_pushes() {
        let hub = Arc::new(Hub::new());
        let actor = ActorId::passenger("p1");
        let mut client = connect(&handler(&hub), actor.clone());

        client.authenticate("passenger-token");
        let info = client.next_json().await;
        assert_eq!(info["type"], "info");
        assert_eq!(info["message"], "authenticated");
        assert!(hub.is_connected(&actor));

        hub.send(
            &actor,
            &Notification::RideUpdate {
                ride_id: "r1".to_string(),
                status: "REQUESTED".to_string(),
                message: "Looking for a driver".to_string(),
            },
        )
        .unwrap();
        assert_eq!(client.next_json().await["type"], "ride_update");

        drop(client.to_server);
        assert_eq!(client.session.await.unwrap(), SessionEnd::Closed);
        assert!(!hub.is_connected(&actor));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_during_authentication_times_out() {
        let hub = Arc::new(Hub::new());
        let mut client = connect(&handler(&hub), ActorId::passenger("p1"));

        let error = client.next_json().await;
        assert_eq!(error["message"], "authentication timeout");
        assert_eq!(error["type"], "error");

        assert_eq!(client.session.await.unwrap(), SessionEnd::AuthTimeout);
        assert!(hub.is_empty());
        drop(client.to_server);
    }

    #[tokio::test(start_paused = true)]
    async fn non_utf8_binary_auth_frame_is_rejected() {
        let hub = Arc::new(Hub::new());
        let mut client = connect(&handler(&hub), ActorId::passenger("p1"));

        client
            .to_server
            .unbounded_send(Ok(Message::Binary(vec![0xff, 0xfe, 0x00].into())))
            .unwrap();

        assert_eq!(
            client.next_json().await["message"],
            "invalid auth message format"
        );
        assert_eq!(
            client.session.await.unwrap(),
            SessionEnd::AuthRejected("invalid auth message format".to_string())
        );
        assert!(hub.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn utf8_binary_auth_frame_is_accepted() {
        let hub = Arc::new(Hub::new());
        let mut client = connect(&handler(&hub), ActorId::passenger("p1"));

        let auth = r#"{"type":"auth","token":"Bearer passenger-token"}"#;
        client
            .to_server
            .unbounded_send(Ok(Message::Binary(auth.as_bytes().to_vec().into())))
            .unwrap();

        assert_eq!(client.next_json().await["message"], "authenticated");
        assert!(hub.is_connected(&ActorId::passenger("p1")));
    }

    #[tokio::test(start_paused = true)]
    async fn control_frames_before_auth_are_skipped() {
        let hub = Arc::new(Hub::new());
        let mut client = connect(&handler(&hub), ActorId::driver("d1"));

        client
            .to_server
            .unbounded_send(Ok(Message::Ping(Vec::new().into())))
            .unwrap();
        client.authenticate("driver-token");

        assert_eq!(client.next_json().await["message"], "authenticated");
        assert!(hub.is_connected(&ActorId::driver("d1")));
    }

    #[tokio::test(start_paused = true)]
    async fn token_without_bearer_prefix_is_rejected() {
        let hub = Arc::new(Hub::new());
        let mut client = connect(&handler(&hub), ActorId::passenger("p1"));

        client.send_text(r#"{"type":"auth","token":"passenger-token"}"#);

        let error = client.next_json().await;
        assert_eq!(error["type"], "error");
        assert!(matches!(
            client.session.await.unwrap(),
            SessionEnd::AuthRejected(_)
        ));
        assert!(hub.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn token_for_another_actor_is_rejected() {
        let hub = Arc::new(Hub::new());
        let mut client = connect(&handler(&hub), ActorId::driver("d1"));

        client.authenticate("passenger-token");

        assert_eq!(
            client.next_json().await["message"],
            "token does not match connection"
        );
        assert!(matches!(
            client.session.await.unwrap(),
            SessionEnd::AuthRejected(_)
        ));
        assert!(hub.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_token_is_rejected() {
        let hub = Arc::new(Hub::new());
        let mut client = connect(&handler(&hub), ActorId::passenger("p1"));

        client.authenticate("forged");

        assert_eq!(client.next_json().await["message"], "invalid token");
        assert!(hub.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn a_second_session_replaces_the_first() {
        let hub = Arc::new(Hub::new());
        let handler = handler(&hub);
        let actor = ActorId::passenger("p1");

        let mut first = connect(&handler, actor.clone());
        first.authenticate("passenger-token");
        first.next_json().await;

        let mut second = connect(&handler, actor.clone());
        second.authenticate("passenger-token");
        second.next_json().await;

        assert_eq!(first.session.await.unwrap(), SessionEnd::Replaced);
        assert!(hub.is_connected(&actor));
        hub.send(
            &actor,
            &Notification::StatusUpdate {
                status: "AVAILABLE".to_string(),
                message: "online".to_string(),
                ride_id: None,
            },
        )
        .unwrap();
        assert_eq!(second.next_json().await["type"], "status_update");
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_is_dropped_after_pong_wait() {
        let hub = Arc::new(Hub::new());
        let actor = ActorId::passenger("p1");
        let mut client = connect(&handler(&hub), actor.clone());
        client.authenticate("passenger-token");
        client.next_json().await;

        let end = client.session.await.unwrap();

        assert_eq!(end, SessionEnd::Unresponsive);
        assert!(!hub.is_connected(&actor));
        drop(client.to_server);
    }

    #[tokio::test(start_paused = true)]
    async fn pongs_keep_the_session_alive() {
        let hub = Arc::new(Hub::new());
        let actor = ActorId::passenger("p1");
        let mut client = connect(&handler(&hub), actor.clone());
        client.authenticate("passenger-token");
        client.next_json().await;

        for _ in 0..4 {
            time::sleep(Duration::from_secs(30)).await;
            client
                .to_server
                .unbounded_send(Ok(Message::Pong(Vec::new().into())))
                .unwrap();
        }

        assert!(hub.is_connected(&actor));
        assert!(!client.session.is_finished());
    }
}
