//! The structured reply of a remote invocation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Status field of a reply. Backends report either a flag or a numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InvocationStatus {
    Flag(bool),
    Code(i64),
}

impl InvocationStatus {
    /// `true` and `1` mean success; everything else is a failure.
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationStatus::Flag(true) | InvocationStatus::Code(1))
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationStatus::Flag(flag) => write!(f, "{flag}"),
            InvocationStatus::Code(code) => write!(f, "{code}"),
        }
    }
}

/// `{status, result}` on success, `{status, error}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub status: InvocationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl InvocationOutcome {
    pub fn success(result: Value) -> Self {
        Self {
            status: InvocationStatus::Code(1),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: InvocationStatus::Code(0),
            result: None,
            error: Some(Value::String(message.into())),
        }
    }

    /// Decode a reply body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Resolve into the result value, or the embedded failure message.
    ///
    /// Only `status` decides the outcome. A successful reply without a
    /// `result` yields `null`.
    pub fn into_result(self) -> Result<Value> {
        if self.status.is_success() {
            return Ok(self.result.unwrap_or(Value::Null));
        }
        let message = match self.error {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => format!("remote invocation failed with status {}", self.status),
        };
        Err(Error::failed(message))
    }
}
