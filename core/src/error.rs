//! Error types for the request pipeline.
//!
//! # Design
//! `ApiError` is the closed set of failures a call can end with. Transport
//! failures keep their own taxonomy in `TransportError` so the pipeline can
//! flatten wrapper errors without losing the offline case.

use thiserror::Error;

/// Failures surfaced by a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The host and path could not form a valid URL.
    #[error("Invalid URL")]
    InvalidUrl,

    /// The server answered with a status outside the accepted range.
    #[error("Unexpected HTTP code: {0}")]
    UnexpectedStatus(u16),

    /// The transport returned something without a recognizable status.
    #[error("Unexpected response from the server")]
    UnexpectedResponse,

    /// The response body could not be decoded into the expected type.
    #[error("Decoding failed: {0}")]
    DeserializationError(String),

    /// The endpoint could not produce its request body.
    #[error("Encoding failed: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ApiError {
    pub fn is_offline(&self) -> bool {
        matches!(self, ApiError::Transport(TransportError::Offline))
    }
}

/// Failures raised while executing a request on a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("The Internet connection appears to be offline")]
    Offline,

    #[error("The request timed out")]
    TimedOut,

    /// Any other failure, optionally wrapping the lower-level cause.
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        underlying: Option<Box<TransportError>>,
    },
}

impl TransportError {
    pub fn failed(message: impl Into<String>) -> Self {
        TransportError::Failed {
            message: message.into(),
            underlying: None,
        }
    }

    pub fn wrapping(message: impl Into<String>, underlying: TransportError) -> Self {
        TransportError::Failed {
            message: message.into(),
            underlying: Some(Box::new(underlying)),
        }
    }

    pub fn underlying(&self) -> Option<&TransportError> {
        match self {
            TransportError::Failed { underlying, .. } => underlying.as_deref(),
            _ => None,
        }
    }

    /// Replace a wrapper with its underlying cause, one layer deep.
    ///
    /// `Offline` is terminal and always comes back unchanged.
    pub fn into_underlying(self) -> TransportError {
        match self {
            TransportError::Failed {
                underlying: Some(underlying),
                ..
            } => *underlying,
            other => other,
        }
    }
}
