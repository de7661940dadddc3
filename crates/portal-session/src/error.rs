//! Error types for session cache operations.

use std::time::Duration;

use portal_types::PortalError;

/// Error type for session cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Surface or identity was empty.
    #[error("Invalid session key: {0}")]
    InvalidKey(String),

    /// A fresh transport could not be opened.
    #[error("Failed to open transport: {0}")]
    Connect(String),

    /// The login handshake did not finish in time.
    #[error("Login timed out after {0:?}")]
    Timeout(Duration),

    /// Closing a session handle failed.
    #[error("Failed to close session: {0}")]
    Close(String),
}

/// Result type for session cache operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for PortalError {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidKey(msg) => PortalError::InvalidParameter(msg),
            Error::Connect(msg) => PortalError::Request(msg),
            Error::Timeout(after) => PortalError::Timeout(after),
            Error::Close(msg) => PortalError::Unrecognized(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::ErrorKind;

    #[test]
    fn test_timeout_classifies_as_website_unavailable() {
        let portal: PortalError = Error::Timeout(Duration::from_secs(20)).into();
        let classified = portal.classify().unwrap();
        assert_eq!(classified.kind(), ErrorKind::WebsiteUnavailable);
    }

    #[test]
    fn test_invalid_key_classifies_as_invalid_parameter() {
        let portal: PortalError = Error::InvalidKey("identity is empty".into()).into();
        let classified = portal.classify().unwrap();
        assert_eq!(classified.kind(), ErrorKind::InvalidParameter);
        assert_eq!(classified.user_message(), "identity is empty");
    }
}
