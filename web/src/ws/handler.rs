use crate::AppState;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::Response;
use domain::Id;
use futures::StreamExt;
use log::*;
use push::{ActorId, SessionHandler};

/// Push channel for a passenger. The first frame must carry a passenger token
/// for the same id.
pub(crate) async fn passenger_ws(
    ws: WebSocketUpgrade,
    Path(passenger_id): Path<Id>,
    State(app_state): State<AppState>,
) -> Response {
    upgrade(ws, app_state.sessions, ActorId::passenger(passenger_id.to_string()))
}

/// Push channel for a driver. The first frame must carry a driver token for
/// the same id.
pub(crate) async fn driver_ws(
    ws: WebSocketUpgrade,
    Path(driver_id): Path<Id>,
    State(app_state): State<AppState>,
) -> Response {
    upgrade(ws, app_state.sessions, ActorId::driver(driver_id.to_string()))
}

fn upgrade(ws: WebSocketUpgrade, sessions: SessionHandler, actor: ActorId) -> Response {
    debug!("Upgrading push connection for {actor}");

    let failed_actor = actor.clone();
    ws.on_failed_upgrade(move |e| warn!("WebSocket upgrade for {failed_actor} failed: {e}"))
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            sessions.run(actor, sink, stream).await;
        })
}
