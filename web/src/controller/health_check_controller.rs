use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use broker::ConnectionState;
use serde_json::json;

use crate::AppState;

/// GET service liveness and broker link state
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up and the broker link is connected"),
        (status = 503, description = "Service is up but the broker link is down or recovering")
    )
)]
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    let (status, broker) = match app_state.broker.state().await {
        ConnectionState::Connected => (StatusCode::OK, "connected"),
        ConnectionState::Recovering => (StatusCode::SERVICE_UNAVAILABLE, "recovering"),
        ConnectionState::Idle => (StatusCode::SERVICE_UNAVAILABLE, "idle"),
    };
    let health = if status.is_success() {
        "healthy"
    } else {
        "degraded"
    };

    (status, Json(json!({ "status": health, "broker": broker })))
}
