//! Error types for the `push` crate.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: PushErrorKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushErrorKind {
    /// No live connection is registered for the actor.
    ActorNotConnected,
    /// The connection is registered but its writer has gone away.
    SendFailed,
    /// The bearer token could not be verified.
    InvalidToken,
    Serialization,
    Other(String),
}

impl Error {
    pub fn new(error_kind: PushErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    pub fn with_source<E>(error_kind: PushErrorKind, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            source: Some(Box::new(source)),
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Push Error: {:?}: {source}", self.error_kind),
            None => write!(f, "Push Error: {:?}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(PushErrorKind::Serialization, err)
    }
}
