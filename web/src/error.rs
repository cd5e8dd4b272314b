use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use log::*;
use serde::Serialize;

use domain::error::{
    DomainErrorKind, EntityErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

/// JSON body of every non-2xx response produced by this crate.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    error: String,
    code: &'static str,
    timestamp: String,
}

pub(crate) fn error_response(status: StatusCode, code: &'static str, message: &str) -> Response {
    let body = ErrorBody {
        error: message.to_string(),
        code,
        timestamp: Utc::now().to_rfc3339(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.0.error_kind {
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Validation(validation_error_kind) => error_response(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    &validation_error_kind.to_string(),
                ),
                InternalErrorKind::Entity(entity_error_kind) => match entity_error_kind {
                    EntityErrorKind::NotFound => {
                        error_response(StatusCode::NOT_FOUND, "not_found", "resource not found")
                    }
                    EntityErrorKind::NotFoundOrInvalidState => error_response(
                        StatusCode::CONFLICT,
                        "invalid_state",
                        "resource not found or not in a state that allows this change",
                    ),
                    EntityErrorKind::Conflict => error_response(
                        StatusCode::CONFLICT,
                        "conflict",
                        "resource already in the requested state",
                    ),
                    EntityErrorKind::DbTransaction | EntityErrorKind::Other(_) => {
                        error!("Persistence failure: {:?}", self.0.source);
                        internal_error()
                    }
                },
                InternalErrorKind::Config | InternalErrorKind::Other(_) => {
                    error!("Internal failure: {:?}", self.0.source);
                    internal_error()
                }
            },
            DomainErrorKind::External(external_error_kind) => match external_error_kind {
                ExternalErrorKind::BrokerUnavailable => error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "message broker unavailable",
                ),
                ExternalErrorKind::Broker
                | ExternalErrorKind::Push
                | ExternalErrorKind::Other(_) => {
                    error!("External failure: {:?}", self.0.source);
                    internal_error()
                }
            },
        }
    }
}

fn internal_error() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal server error",
    )
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
