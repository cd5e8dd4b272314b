//! Error types for the `broker` crate.
//!
//! Follows the same pattern as domain::error with a root Error struct and an error kind enum.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the broker crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: BrokerErrorKind,
}

/// Categories of broker failures visible to callers.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerErrorKind {
    /// Dialing the broker or opening a channel failed.
    Connection,
    /// The link is recovering or closed; no channel can be handed out.
    ChannelUnavailable,
    /// An exchange, queue or binding declaration was rejected.
    Declaration,
    /// The payload could not be encoded as JSON.
    Serialization,
    /// The broker refused or failed the publish call.
    Publish,
    Other(String),
}

impl Error {
    pub fn new(error_kind: BrokerErrorKind) -> Self {
        Error {
            source: None,
            error_kind,
        }
    }

    pub fn with_source<E>(error_kind: BrokerErrorKind, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error {
            source: Some(Box::new(source)),
            error_kind,
        }
    }

    pub fn channel_unavailable() -> Self {
        Self::new(BrokerErrorKind::ChannelUnavailable)
    }

    pub fn is_channel_unavailable(&self) -> bool {
        self.error_kind == BrokerErrorKind::ChannelUnavailable
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Broker Error: {:?}: {source}", self.error_kind),
            None => write!(f, "Broker Error: {:?}", self.error_kind),
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
        Error::with_source(BrokerErrorKind::Serialization, err)
    }
}
