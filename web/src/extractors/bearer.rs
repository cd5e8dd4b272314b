//! Bearer token extractors for the REST routes.
//!
//! Both extractors verify the `Authorization: Bearer <jwt>` header with the
//! verifier held in `AppState` and then check the token's role. The token
//! subject must be a UUID since it keys rides and driver sessions.
//! `AuthorizedDriver` additionally pins the token to the `{driver_id}` path
//! segment.

use crate::error::error_response;
use crate::extractors::RejectionType;
use crate::AppState;
use axum::{
    extract::{FromRequestParts, Path},
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
};
use domain::Id;
use log::*;
use push::{auth::strip_bearer, ActorRole};

/// The passenger the request's bearer token was issued to.
pub(crate) struct AuthenticatedPassenger(pub Id);

/// The driver the request's bearer token was issued to.
pub(crate) struct AuthenticatedDriver(pub Id);

impl FromRequestParts<AppState> for AuthenticatedPassenger {
    type Rejection = RejectionType;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, ActorRole::Passenger).map(AuthenticatedPassenger)
    }
}

impl FromRequestParts<AppState> for AuthenticatedDriver {
    type Rejection = RejectionType;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, ActorRole::Driver).map(AuthenticatedDriver)
    }
}

/// A driver acting on their own `/drivers/{driver_id}` resource.
pub(crate) struct AuthorizedDriver(pub Id);

impl FromRequestParts<AppState> for AuthorizedDriver {
    type Rejection = RejectionType;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedDriver(token_driver_id) =
            AuthenticatedDriver::from_request_parts(parts, state).await?;
        let Path(driver_id) = Path::<Id>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        if token_driver_id != driver_id {
            warn!("Driver {token_driver_id} attempted to act as driver {driver_id}");
            return Err(error_response(
                StatusCode::FORBIDDEN,
                "forbidden",
                "token does not belong to this driver",
            ));
        }
        Ok(AuthorizedDriver(driver_id))
    }
}

fn authenticate(parts: &Parts, state: &AppState, role: ActorRole) -> Result<Id, RejectionType> {
    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(strip_bearer)
        .ok_or_else(|| unauthorized("missing bearer token"))?;

    let actor = state
        .verifier
        .verify(token)
        .map_err(|_| unauthorized("invalid token"))?;

    if actor.role != role {
        debug!("Rejected {actor} on a {role} route");
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "forbidden",
            &format!("token was not issued to a {role}"),
        ));
    }

    Id::parse_str(&actor.id).map_err(|_| {
        debug!("Token subject {} is not a UUID", actor.id);
        unauthorized("invalid token")
    })
}

fn unauthorized(message: &str) -> RejectionType {
    error_response(StatusCode::UNAUTHORIZED, "unauthorized", message)
}
