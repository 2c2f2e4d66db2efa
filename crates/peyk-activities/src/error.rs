//! Error types for the activity engine.

use peyk_odata::OdataError;
use thiserror::Error;

/// Errors surfaced by activity, note and search operations.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// The remote call itself failed; upstream status and body are
    /// preserved inside.
    #[error(transparent)]
    Transport(#[from] OdataError),

    /// The caller's input was rejected before any network traffic.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested record does not exist or has no content to serve.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored attachment body was not valid base64.
    #[error("attachment body is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl ActivityError {
    /// Creates an [`ActivityError::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates an [`ActivityError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Upstream HTTP status, when this wraps a remote failure.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(inner) => inner.status(),
            _ => None,
        }
    }
}

/// Convenience alias used across the crate.
pub type ActivityResult<T> = Result<T, ActivityError>;
