//! Error types for the OData transport layer.
//!
//! Remote failures keep the upstream status and raw body so callers can
//! surface them verbatim.

use thiserror::Error;

/// Result type alias using [`OdataError`].
pub type OdataResult<T> = Result<T, OdataError>;

/// Errors that can occur when talking to the remote CRM endpoint.
#[derive(Debug, Error)]
pub enum OdataError {
    /// The remote rejected the NTLM handshake (401 on the final leg).
    #[error("authentication failed (401)")]
    AuthenticationFailed { body: String },

    /// The remote rejected the request itself (4xx other than 401).
    #[error("remote validation failure ({status}): {body}")]
    RemoteValidation { status: u16, body: String },

    /// The remote failed (5xx) or returned a body that cannot be parsed.
    #[error("remote server failure ({status}): {body}")]
    RemoteServer { status: u16, body: String },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// NTLM message generation failed.
    #[error("NTLM error: {0}")]
    Ntlm(String),

    /// Credential context is malformed (e.g. missing domain qualifier).
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// Credential encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Credential decryption failed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A required record is missing.
    #[error("not found: {0}")]
    NotFound(String),
}

impl OdataError {
    /// Maps a non-success HTTP status to the matching error variant.
    ///
    /// 401 is an authentication failure, other 4xx are validation
    /// failures, everything else is a server failure. The raw body is
    /// preserved in all cases.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            OdataError::AuthenticationFailed { body }
        } else if status.is_client_error() {
            OdataError::RemoteValidation {
                status: status.as_u16(),
                body,
            }
        } else {
            OdataError::RemoteServer {
                status: status.as_u16(),
                body,
            }
        }
    }

    /// Upstream HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            OdataError::AuthenticationFailed { .. } => Some(401),
            OdataError::RemoteValidation { status, .. }
            | OdataError::RemoteServer { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw upstream response body carried by this error, if any.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            OdataError::AuthenticationFailed { body }
            | OdataError::RemoteValidation { body, .. }
            | OdataError::RemoteServer { body, .. } => Some(body),
            _ => None,
        }
    }
}
