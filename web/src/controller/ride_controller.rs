use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::controller::respond;
use crate::extractors::{bearer::AuthenticatedPassenger, correlation_id::CorrelationId};
use crate::params::ride::{
    CancelRideParams, CreateRideParams, RideCancelledResponse, RideCreatedResponse,
};
use crate::{AppState, Error};
use domain::Id;
use log::*;

/// POST request a new ride for the authenticated passenger
#[utoipa::path(
    post,
    path = "/rides",
    request_body = CreateRideParams,
    responses(
        (status = 201, description = "Ride requested", body = RideCreatedResponse),
        (status = 202, description = "Ride stored but not yet announced to drivers", body = RideCreatedResponse),
        (status = 400, description = "Invalid coordinates, address or ride type"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Token was not issued to a passenger"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create(
    AuthenticatedPassenger(passenger_id): AuthenticatedPassenger,
    correlation_id: CorrelationId,
    State(app_state): State<AppState>,
    Json(params): Json<CreateRideParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST ride request from passenger {passenger_id}: {params:?}");

    let outcome = app_state
        .rides
        .create_ride(params.into_request(passenger_id), correlation_id.as_str())
        .await?;

    Ok(respond(
        StatusCode::CREATED,
        outcome.map(|created| RideCreatedResponse::new(&created.ride, &created.quote)),
    ))
}

/// POST cancel one of the authenticated passenger's rides
#[utoipa::path(
    post,
    path = "/rides/{ride_id}/cancel",
    params(
        ("ride_id" = Uuid, Path, description = "Ride to cancel")
    ),
    request_body(content = CancelRideParams, description = "Optional cancellation reason"),
    responses(
        (status = 200, description = "Ride cancelled", body = RideCancelledResponse),
        (status = 202, description = "Ride cancelled but the status event was not published", body = RideCancelledResponse),
        (status = 400, description = "Reason too long or malformed ride id"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 409, description = "Ride not found, not owned by the passenger, or no longer cancellable"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn cancel(
    AuthenticatedPassenger(passenger_id): AuthenticatedPassenger,
    correlation_id: CorrelationId,
    State(app_state): State<AppState>,
    Path(ride_id): Path<Id>,
    params: Option<Json<CancelRideParams>>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST cancel ride {ride_id} from passenger {passenger_id}");

    let reason = params.and_then(|Json(params)| params.reason);
    let outcome = app_state
        .rides
        .cancel_ride(ride_id, passenger_id, reason, correlation_id.as_str())
        .await?;

    Ok(respond(
        StatusCode::OK,
        outcome.map(|ride| RideCancelledResponse::from(&ride)),
    ))
}
