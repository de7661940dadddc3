//! Failure taxonomy for portal and remote-invocation calls.
//!
//! Backend failures arrive as [`PortalError`], a closed enum mirroring what
//! the portal client and the invocation backend can report. [`PortalError::classify`]
//! maps each one to exactly one outcome: a [`ClassifiedError`] carrying one
//! of the [`ErrorKind`]s, or `None` for failures outside the recognized set,
//! which the RPC boundary forwards unchanged to its generic failure path.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for portal operations.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Message used when a caller-supplied room identifier is rejected.
pub const INVALID_ROOM_MESSAGE: &str = "无效的教室名";

/// Message used when a request carries no login information.
pub const MISSING_LOGIN_INFO_MESSAGE: &str = "缺失登录信息";

// ─────────────────────────────────────────────────────────────────────────────
// Error kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Closed set of client-visible failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Backend temporarily down.
    WebsiteUnavailable,
    /// Account lacks entitlement for this surface.
    Forbidden,
    /// Backend demands interactive verification.
    CaptchaRequired,
    /// Captcha token rejected.
    InvalidCaptcha,
    /// Username or password rejected.
    InvalidCredentials,
    /// Internal auth-ticket exchange failed.
    TicketError,
    /// Backend response shape unexpected.
    ParseError,
    /// Unclassified auth failure.
    UnknownAuthError,
    /// Operation attempted without a valid session.
    NotLoggedIn,
    /// Backend enforces a single active session and detected another.
    ConcurrentSessionConflict,
    /// Session token expired or invalid.
    Unauthorized,
    /// Caller-supplied argument rejected.
    InvalidParameter,
    /// Structured failure surfaced from a remote invocation.
    RemoteInvocationError,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 13] = [
        ErrorKind::WebsiteUnavailable,
        ErrorKind::Forbidden,
        ErrorKind::CaptchaRequired,
        ErrorKind::InvalidCaptcha,
        ErrorKind::InvalidCredentials,
        ErrorKind::TicketError,
        ErrorKind::ParseError,
        ErrorKind::UnknownAuthError,
        ErrorKind::NotLoggedIn,
        ErrorKind::ConcurrentSessionConflict,
        ErrorKind::Unauthorized,
        ErrorKind::InvalidParameter,
        ErrorKind::RemoteInvocationError,
    ];

    /// Machine-readable code delivered over the RPC boundary.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::WebsiteUnavailable => "WEBSITE_UNAVAILABLE",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::CaptchaRequired => "CAPTCHA_REQUIRED",
            ErrorKind::InvalidCaptcha => "INVALID_CAPTCHA",
            ErrorKind::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorKind::TicketError => "TICKET_ERROR",
            ErrorKind::ParseError => "PARSE_ERROR",
            ErrorKind::UnknownAuthError => "UNKNOWN_AUTH_ERROR",
            ErrorKind::NotLoggedIn => "NOT_LOGGED_IN",
            ErrorKind::ConcurrentSessionConflict => "CONCURRENT_SESSION_CONFLICT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::InvalidParameter => "INVALID_PARAMETER",
            ErrorKind::RemoteInvocationError => "REMOTE_INVOCATION_ERROR",
        }
    }

    /// Stable user-facing message for this kind.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::WebsiteUnavailable => "学校网站异常，请稍后重试",
            ErrorKind::Forbidden => "无权访问学校该服务",
            ErrorKind::CaptchaRequired => "需要验证码，请前往教务网登陆后重试",
            ErrorKind::InvalidCaptcha => "无效的验证码",
            ErrorKind::InvalidCredentials => "用户名或密码错误",
            ErrorKind::TicketError => "无法获取ticket",
            ErrorKind::ParseError => "无法解析数据",
            ErrorKind::UnknownAuthError => "登陆/认证过程中发生未知错误",
            ErrorKind::NotLoggedIn => "用户未登陆",
            ErrorKind::ConcurrentSessionConflict => "启用了单点登陆，请关闭后重试",
            ErrorKind::Unauthorized => "未获取认证或认证过期",
            ErrorKind::InvalidParameter => "无效的参数",
            ErrorKind::RemoteInvocationError => "远程调用失败，请稍后重试",
        }
    }

    /// Whether the caller may retry the same request.
    ///
    /// `InvalidCaptcha` is retryable only after the captcha is solved again,
    /// `NotLoggedIn` and `Unauthorized` after a fresh login. For
    /// `RemoteInvocationError` the answer depends on the embedded failure,
    /// see [`ClassifiedError::is_retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::WebsiteUnavailable
                | ErrorKind::InvalidCaptcha
                | ErrorKind::TicketError
                | ErrorKind::NotLoggedIn
                | ErrorKind::Unauthorized
        )
    }

    /// Whether the user has to act outside this system before retrying.
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            ErrorKind::CaptchaRequired
                | ErrorKind::InvalidCredentials
                | ErrorKind::ConcurrentSessionConflict
        )
    }

    /// Whether a specific message of this kind may be shown to users as is.
    ///
    /// Other kinds show [`ErrorKind::default_message`] and keep the detail
    /// for logs.
    pub fn is_verbatim(&self) -> bool {
        matches!(
            self,
            ErrorKind::CaptchaRequired
                | ErrorKind::InvalidCredentials
                | ErrorKind::InvalidParameter
                | ErrorKind::RemoteInvocationError
        )
    }

    /// Reverse lookup of a stable message, used to recognize failures that a
    /// remote invocation reports by message only.
    pub fn from_message(message: &str) -> Option<ErrorKind> {
        if message == INVALID_ROOM_MESSAGE || message == MISSING_LOGIN_INFO_MESSAGE {
            return Some(ErrorKind::InvalidParameter);
        }
        Self::ALL
            .into_iter()
            .filter(|kind| *kind != ErrorKind::RemoteInvocationError)
            .find(|kind| kind.default_message() == message)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classified error
// ─────────────────────────────────────────────────────────────────────────────

/// A failure resolved to exactly one [`ErrorKind`], ready for the RPC boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
}

impl ClassifiedError {
    /// Create a classified error with an explicit message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a classified error carrying the kind's stable message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Structured remote failure; the embedded message is kept verbatim.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteInvocationError, message)
    }

    /// The kind this failure was classified as.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The full message, including any backend detail.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The kind callers should act on.
    ///
    /// A remote failure whose message is the stable message of another kind
    /// (for example `"用户名或密码错误"`) is equivalent to that kind. The
    /// classification itself stays [`ErrorKind::RemoteInvocationError`].
    pub fn effective_kind(&self) -> ErrorKind {
        match self.kind {
            ErrorKind::RemoteInvocationError => {
                ErrorKind::from_message(&self.message).unwrap_or(self.kind)
            }
            kind => kind,
        }
    }

    /// Machine-readable code for the RPC boundary.
    pub fn code(&self) -> &'static str {
        self.effective_kind().code()
    }

    /// Whether the user has to act outside this system before retrying.
    pub fn requires_user_action(&self) -> bool {
        self.effective_kind().requires_user_action()
    }

    /// Whether [`ClassifiedError::message`] is safe to show as is.
    pub fn is_verbatim(&self) -> bool {
        self.kind.is_verbatim()
    }

    /// Whether the caller may retry.
    pub fn is_retryable(&self) -> bool {
        self.effective_kind().is_retryable()
    }

    /// The message to show to users.
    pub fn user_message(&self) -> &str {
        if self.is_verbatim() {
            &self.message
        } else {
            self.kind.default_message()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend failures
// ─────────────────────────────────────────────────────────────────────────────

/// Failures raised by the portal client, the session layer or the remote
/// invocation path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortalError {
    /// The portal answered with an error page or status.
    #[error("portal website error: {0}")]
    Website(String),

    /// The request never got an answer (connect, TLS, reset).
    #[error("request to portal failed: {0}")]
    Request(String),

    /// A portal call exceeded its time bound.
    #[error("portal call timed out after {0:?}")]
    Timeout(Duration),

    /// The account may not use this surface.
    #[error("service not allowed for this account")]
    NotAllowedService,

    /// The auth server wants a captcha.
    #[error("captcha required")]
    NeedCaptcha,

    /// The captcha answer was rejected.
    #[error("invalid captcha")]
    InvalidCaptcha,

    /// Username or password rejected.
    #[error("incorrect login credentials")]
    IncorrectLoginCredentials,

    /// Ticket exchange with the auth server failed.
    #[error("failed to obtain ticket: {0}")]
    TicketGet(String),

    /// Portal response did not have the expected shape.
    #[error("failed to parse portal response: {0}")]
    Parse(String),

    /// Auth server failed in an unrecognized way.
    #[error("unknown auth server error: {0}")]
    UnknownAuthserver(String),

    /// Call issued without a logged-in session.
    #[error("not logged in")]
    NotLogined,

    /// Single sign-on detected another active session.
    #[error("another session is active for this account")]
    MultiSessionConflict,

    /// Session authorization missing or expired.
    #[error("authorization missing or expired")]
    Unauthorized,

    /// Room identifier rejected by the portal.
    #[error("invalid room: {0}")]
    InvalidRoom(String),

    /// Caller-supplied argument rejected before reaching the portal.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The invocation backend returned a failure status with this message.
    #[error("{0}")]
    RemoteFailure(String),

    /// The invocation backend could not be reached or timed out.
    #[error("remote invocation unavailable: {0}")]
    RemoteUnavailable(String),

    /// Anything the taxonomy does not recognize.
    #[error("{0}")]
    Unrecognized(String),
}

impl PortalError {
    /// Classify this failure.
    ///
    /// Total and deterministic: every variant yields the same outcome on
    /// every call. `None` is returned only for [`PortalError::Unrecognized`];
    /// those are forwarded unchanged to the transport's generic failure path.
    pub fn classify(&self) -> Option<ClassifiedError> {
        let classified = match self {
            // Structured remote failures keep their message untouched.
            PortalError::RemoteFailure(message) => ClassifiedError::remote(message.clone()),
            PortalError::RemoteUnavailable(detail) => ClassifiedError::new(
                ErrorKind::RemoteInvocationError,
                format!(
                    "{}: {detail}",
                    ErrorKind::RemoteInvocationError.default_message()
                ),
            ),
            PortalError::Website(detail) | PortalError::Request(detail) => {
                with_detail(ErrorKind::WebsiteUnavailable, detail)
            }
            PortalError::Timeout(after) => {
                with_detail(ErrorKind::WebsiteUnavailable, &format!("timed out after {after:?}"))
            }
            PortalError::NotAllowedService => ClassifiedError::from_kind(ErrorKind::Forbidden),
            PortalError::NeedCaptcha => ClassifiedError::from_kind(ErrorKind::CaptchaRequired),
            PortalError::InvalidCaptcha => ClassifiedError::from_kind(ErrorKind::InvalidCaptcha),
            PortalError::IncorrectLoginCredentials => {
                ClassifiedError::from_kind(ErrorKind::InvalidCredentials)
            }
            PortalError::TicketGet(detail) => with_detail(ErrorKind::TicketError, detail),
            PortalError::Parse(detail) => with_detail(ErrorKind::ParseError, detail),
            PortalError::UnknownAuthserver(detail) => {
                with_detail(ErrorKind::UnknownAuthError, detail)
            }
            PortalError::NotLogined => ClassifiedError::from_kind(ErrorKind::NotLoggedIn),
            PortalError::MultiSessionConflict => {
                ClassifiedError::from_kind(ErrorKind::ConcurrentSessionConflict)
            }
            PortalError::Unauthorized => ClassifiedError::from_kind(ErrorKind::Unauthorized),
            PortalError::InvalidRoom(_) => {
                ClassifiedError::new(ErrorKind::InvalidParameter, INVALID_ROOM_MESSAGE)
            }
            PortalError::InvalidParameter(message) => {
                ClassifiedError::new(ErrorKind::InvalidParameter, message.clone())
            }
            PortalError::Unrecognized(_) => return None,
        };
        Some(classified)
    }
}

fn with_detail(kind: ErrorKind, detail: &str) -> ClassifiedError {
    if detail.is_empty() {
        ClassifiedError::from_kind(kind)
    } else {
        ClassifiedError::new(kind, format!("{}: {detail}", kind.default_message()))
    }
}
