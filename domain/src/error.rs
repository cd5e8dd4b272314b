//! Error types for the `domain` layer.
use broker::{BrokerErrorKind, Error as BrokerError};
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use push::{Error as PushError, PushErrorKind};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. The intent is to translate errors between layers while maintaining
/// layer boundaries. Ex. `domain` is dependent on `entity_api`, `broker` and `push`, and
/// `web` is dependent on `domain`, but `web` should not be dependent, directly, on
/// `entity_api`. Ultimately the various `error_kind`s are used by `web` to return
/// appropriate HTTP status codes and messages to the client.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Validation(ValidationErrorKind),
    Entity(EntityErrorKind),
    Config,
    Other(String),
}

/// Input rejected before anything was persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationErrorKind {
    InvalidCoordinates(String),
    MissingId(&'static str),
    MissingAddress(&'static str),
    UnsupportedRideType(String),
    ReasonTooLong,
    InvalidMotion(String),
}

/// Enum representing the various kinds of entity errors that can bubble up from the "Entity" layer (`entity_api` and `entity`).
/// These errors are translated from the `entity_api` layer to the `domain` layer and reduced to a subset of error kinds
/// that are relevant to the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    /// A conditional write matched nothing: the row is missing or its state forbids the change.
    NotFoundOrInvalidState,
    Conflict,
    DbTransaction,
    Other(String),
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// The message broker link is down or recovering.
    BrokerUnavailable,
    Broker,
    Push,
    Other(String),
}

impl Error {
    pub fn validation(kind: ValidationErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Validation(kind)),
        }
    }

    pub fn config(message: &str) -> Self {
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.error_kind
            == DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::Conflict))
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationErrorKind::InvalidCoordinates(detail) => {
                write!(f, "invalid coordinates: {detail}")
            }
            ValidationErrorKind::MissingId(field) => write!(f, "{field} is required"),
            ValidationErrorKind::MissingAddress(field) => write!(f, "{field} is required"),
            ValidationErrorKind::UnsupportedRideType(ride_type) => {
                write!(f, "unsupported ride type: {ride_type}")
            }
            ValidationErrorKind::ReasonTooLong => {
                write!(f, "cancellation reason is too long")
            }
            ValidationErrorKind::InvalidMotion(detail) => write!(f, "{detail}"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::RecordNotUpdated => EntityErrorKind::NotFoundOrInvalidState,
            EntityApiErrorKind::RecordConflict => EntityErrorKind::Conflict,
            EntityApiErrorKind::SystemError => EntityErrorKind::DbTransaction,
            EntityApiErrorKind::Other => EntityErrorKind::Other("EntityErrorKind".to_string()),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

impl From<BrokerError> for Error {
    fn from(err: BrokerError) -> Self {
        let external_error_kind = match err.error_kind {
            BrokerErrorKind::ChannelUnavailable | BrokerErrorKind::Connection => {
                ExternalErrorKind::BrokerUnavailable
            }
            _ => ExternalErrorKind::Broker,
        };
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::External(external_error_kind),
        }
    }
}

impl From<PushError> for Error {
    fn from(err: PushError) -> Self {
        let error_kind = match err.error_kind {
            PushErrorKind::Serialization => {
                DomainErrorKind::Internal(InternalErrorKind::Other("push serialization".to_string()))
            }
            _ => DomainErrorKind::External(ExternalErrorKind::Push),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "JWT encoding related error".to_string(),
            )),
        }
    }
}
