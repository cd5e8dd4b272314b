use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::respond;
use crate::extractors::{bearer::AuthorizedDriver, correlation_id::CorrelationId};
use crate::params::driver::{
    GoOfflineResponse, GoOnlineParams, GoOnlineResponse, LocationParams, LocationResponse,
    StartRideParams, StartRideResponse,
};
use crate::{AppState, Error};
use log::*;

/// POST start a driver session
#[utoipa::path(
    post,
    path = "/drivers/{driver_id}/online",
    params(
        ("driver_id" = Uuid, Path, description = "Driver going online; must match the token")
    ),
    request_body = GoOnlineParams,
    responses(
        (status = 200, description = "Driver is available", body = GoOnlineResponse),
        (status = 202, description = "Driver is available but the status event was not published", body = GoOnlineResponse),
        (status = 400, description = "Invalid coordinates"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token belongs to another driver"),
        (status = 409, description = "Driver already has an open session"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn online(
    AuthorizedDriver(driver_id): AuthorizedDriver,
    correlation_id: CorrelationId,
    State(app_state): State<AppState>,
    Json(params): Json<GoOnlineParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST driver {driver_id} online at {params:?}");

    let outcome = app_state
        .drivers
        .go_online(
            driver_id,
            params.latitude,
            params.longitude,
            correlation_id.as_str(),
        )
        .await?;

    Ok(respond(
        StatusCode::OK,
        outcome.map(|online| GoOnlineResponse::from(&online)),
    ))
}

/// POST end the driver's open session
#[utoipa::path(
    post,
    path = "/drivers/{driver_id}/offline",
    params(
        ("driver_id" = Uuid, Path, description = "Driver going offline; must match the token")
    ),
    responses(
        (status = 200, description = "Session closed", body = GoOfflineResponse),
        (status = 202, description = "Session closed but the status event was not published", body = GoOfflineResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token belongs to another driver"),
        (status = 409, description = "Driver has no open session"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn offline(
    AuthorizedDriver(driver_id): AuthorizedDriver,
    correlation_id: CorrelationId,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST driver {driver_id} offline");

    let outcome = app_state
        .drivers
        .go_offline(driver_id, correlation_id.as_str())
        .await?;

    Ok(respond(
        StatusCode::OK,
        outcome.map(|closed| GoOfflineResponse::from(&closed)),
    ))
}

/// POST record the driver's current position
#[utoipa::path(
    post,
    path = "/drivers/{driver_id}/location",
    params(
        ("driver_id" = Uuid, Path, description = "Reporting driver; must match the token")
    ),
    request_body = LocationParams,
    responses(
        (status = 200, description = "Location stored and broadcast", body = LocationResponse),
        (status = 202, description = "Location stored but not broadcast", body = LocationResponse),
        (status = 400, description = "Invalid coordinates, speed or heading"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token belongs to another driver"),
        (status = 409, description = "Driver is offline"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn location(
    AuthorizedDriver(driver_id): AuthorizedDriver,
    correlation_id: CorrelationId,
    State(app_state): State<AppState>,
    Json(params): Json<LocationParams>,
) -> Result<impl IntoResponse, Error> {
    trace!("POST driver {driver_id} location {params:?}");

    let outcome = app_state
        .drivers
        .update_location(driver_id, params.into(), correlation_id.as_str())
        .await?;

    Ok(respond(
        StatusCode::OK,
        outcome.map(|coordinate| LocationResponse::from(&coordinate)),
    ))
}

/// POST pick up the passenger and start the ride
#[utoipa::path(
    post,
    path = "/drivers/{driver_id}/start",
    params(
        ("driver_id" = Uuid, Path, description = "Driver starting the ride; must match the token")
    ),
    request_body = StartRideParams,
    responses(
        (status = 200, description = "Ride in progress, driver busy", body = StartRideResponse),
        (status = 202, description = "Ride started but a status event was not published", body = StartRideResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token belongs to another driver"),
        (status = 404, description = "Unknown driver or ride"),
        (status = 409, description = "Ride belongs to another driver or cannot start, or the driver is not available"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn start(
    AuthorizedDriver(driver_id): AuthorizedDriver,
    correlation_id: CorrelationId,
    State(app_state): State<AppState>,
    Json(params): Json<StartRideParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST driver {driver_id} start ride {}", params.ride_id);

    let outcome = app_state
        .drivers
        .start_ride(driver_id, params.ride_id, correlation_id.as_str())
        .await?;

    Ok(respond(
        StatusCode::OK,
        outcome.map(|started| StartRideResponse::from(&started)),
    ))
}
