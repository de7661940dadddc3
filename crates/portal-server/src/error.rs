//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use portal_types::{ClassifiedError, ErrorKind, PortalError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A backend failure resolved to the client-visible taxonomy.
    #[error("{0}")]
    Portal(ClassifiedError),

    /// Failure outside the taxonomy, forwarded with its original message.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ClassifiedError> for ServerError {
    fn from(e: ClassifiedError) -> Self {
        ServerError::Portal(e)
    }
}

impl From<PortalError> for ServerError {
    fn from(e: PortalError) -> Self {
        match e.classify() {
            Some(classified) => ServerError::Portal(classified),
            None => ServerError::Internal(e.to_string()),
        }
    }
}

impl From<portal_session::Error> for ServerError {
    fn from(e: portal_session::Error) -> Self {
        PortalError::from(e).into()
    }
}

impl From<portal_invoke::Error> for ServerError {
    fn from(e: portal_invoke::Error) -> Self {
        PortalError::from(e).into()
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP status for a failure kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
        ErrorKind::CaptchaRequired
        | ErrorKind::InvalidCaptcha
        | ErrorKind::InvalidCredentials
        | ErrorKind::NotLoggedIn
        | ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::ConcurrentSessionConflict => StatusCode::CONFLICT,
        ErrorKind::WebsiteUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::TicketError
        | ErrorKind::ParseError
        | ErrorKind::UnknownAuthError
        | ErrorKind::RemoteInvocationError => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ServerError::Portal(classified) => (
                status_for(classified.effective_kind()),
                classified.code(),
                classified.user_message().to_string(),
            ),
            ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        if status.is_server_error() {
            let detail = self.to_string();
            tracing::error!(status = %status, code, error = %detail, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
