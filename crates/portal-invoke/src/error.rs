//! Error types for remote invocation.

use std::time::Duration;

use portal_types::PortalError;

/// Error type for remote invocation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend answered with a failure status.
    #[error("{message}")]
    Failed { message: String },

    /// The invocation did not complete in time.
    #[error("Remote invocation timed out after {0:?}")]
    Timeout(Duration),

    /// The connection failed before a reply arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The reply could not be decoded.
    #[error("Failed to decode invocation reply: {0}")]
    Decode(String),

    /// The pool has been shut down.
    #[error("Connection pool is closed")]
    Closed,
}

impl Error {
    /// Create a failure carrying the backend's message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Result type for remote invocation.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<Error> for PortalError {
    fn from(e: Error) -> Self {
        match e {
            Error::Failed { message } => PortalError::RemoteFailure(message),
            other => PortalError::RemoteUnavailable(other.to_string()),
        }
    }
}
