use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::envelope::{
    RpcError, CODE_INVALID_PARAMS, CODE_METHOD_NOT_FOUND, CODE_NO_RESPONSE,
    CODE_SERVICE_UNAVAILABLE,
};

// Type alias for Result with our RouterError
pub type Result<T> = std::result::Result<T, RouterError>;

const MAX_MESSAGE_LEN: usize = 200;

/// Error types for routing and dispatch
///
/// Every public router operation either succeeds or yields one of these.
/// Discovery faults never reach this type: providers swallow them.
///
/// | Variant            | Category           | Retryable | HTTP |
/// |--------------------|--------------------|-----------|------|
/// | NotFound           | NotFound           | no        | 404  |
/// | Validation         | ValidationError    | no        | 400  |
/// | Transport          | TransportError     | yes       | 502  |
/// | Timeout            | TimeoutError       | yes       | 504  |
/// | NoResponse         | NoResponse         | yes       | 504  |
/// | ServiceUnavailable | ServiceUnavailable | yes       | 503  |
/// | Remote             | RemoteError        | no        | 502  |
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouterError {
    /// Unknown server or tool
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed arguments or request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network or connection failure, or an unreadable reply
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// An event stream ended or expired without a terminal event
    #[error("No response: {0}")]
    NoResponse(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The backend answered with a JSON-RPC error the router does not map
    #[error("Backend error [{code}]: {message}")]
    Remote { code: i64, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    NotFound,
    ValidationError,
    TransportError,
    TimeoutError,
    NoResponse,
    ServiceUnavailable,
    RemoteError,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportError | Self::TimeoutError | Self::NoResponse | Self::ServiceUnavailable
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::ValidationError => "ValidationError",
            Self::TransportError => "TransportError",
            Self::TimeoutError => "TimeoutError",
            Self::NoResponse => "NoResponse",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::RemoteError => "RemoteError",
        }
    }
}

impl RouterError {
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        RouterError::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RouterError::NotFound(_) => ErrorCategory::NotFound,
            RouterError::Validation(_) => ErrorCategory::ValidationError,
            RouterError::Transport(_) => ErrorCategory::TransportError,
            RouterError::Timeout { .. } => ErrorCategory::TimeoutError,
            RouterError::NoResponse(_) => ErrorCategory::NoResponse,
            RouterError::ServiceUnavailable(_) => ErrorCategory::ServiceUnavailable,
            RouterError::Remote { .. } => ErrorCategory::RemoteError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Variant name, reported to clients as `errorType`
    pub fn kind(&self) -> &'static str {
        match self {
            RouterError::NotFound(_) => "NotFound",
            RouterError::Validation(_) => "Validation",
            RouterError::Transport(_) => "Transport",
            RouterError::Timeout { .. } => "Timeout",
            RouterError::NoResponse(_) => "NoResponse",
            RouterError::ServiceUnavailable(_) => "ServiceUnavailable",
            RouterError::Remote { .. } => "Remote",
        }
    }

    /// Client-facing hint for when a retry is worth attempting
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RouterError::Timeout { .. } => Some(Duration::from_secs(60)),
            RouterError::Transport(_) => Some(Duration::from_secs(30)),
            RouterError::NoResponse(_) | RouterError::ServiceUnavailable(_) => {
                Some(Duration::from_secs(15))
            }
            _ => None,
        }
    }

    /// Classifies a reqwest failure for the named operation
    pub fn from_reqwest(err: reqwest::Error, operation: &str, timeout: Duration) -> Self {
        if err.is_timeout() {
            return RouterError::timeout(operation, timeout);
        }

        if let Some(status) = err.status() {
            return RouterError::from_status(status, operation);
        }

        if err.is_connect() {
            return RouterError::Transport(format!("{}: connection failed: {}", operation, err));
        }

        if err.is_decode() {
            return RouterError::Transport(format!("{}: malformed reply: {}", operation, err));
        }

        RouterError::Transport(format!("{}: {}", operation, err))
    }

    /// Maps a non-2xx backend status
    pub fn from_status(status: reqwest::StatusCode, operation: &str) -> Self {
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            RouterError::ServiceUnavailable(format!("{} returned {}", operation, status))
        } else {
            RouterError::Transport(format!("{} returned {}", operation, status))
        }
    }

    /// Maps a JSON-RPC error carried in a reply envelope
    pub fn from_rpc(error: &RpcError) -> Self {
        match error.code {
            CODE_METHOD_NOT_FOUND => RouterError::NotFound(error.message.clone()),
            CODE_INVALID_PARAMS => RouterError::Validation(error.message.clone()),
            CODE_NO_RESPONSE => RouterError::NoResponse(error.message.clone()),
            CODE_SERVICE_UNAVAILABLE => RouterError::ServiceUnavailable(error.message.clone()),
            code => RouterError::Remote {
                code,
                message: error.message.clone(),
            },
        }
    }

    pub fn to_structured(&self, tool_name: Option<&str>) -> StructuredError {
        let category = self.category();
        StructuredError {
            error_id: new_error_id(),
            category,
            error_type: self.kind().to_string(),
            retryable: category.is_retryable(),
            message: sanitize_message(&self.to_string()),
            retry_after_ms: self.retry_after().map(|d| d.as_millis() as u64),
            tool_name: tool_name.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RouterError::NotFound(_) => StatusCode::NOT_FOUND,
            RouterError::Validation(_) => StatusCode::BAD_REQUEST,
            RouterError::Transport(_) | RouterError::Remote { .. } => StatusCode::BAD_GATEWAY,
            RouterError::Timeout { .. } | RouterError::NoResponse(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            RouterError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Client-facing error value
///
/// Carries no internal detail beyond the first line of the error message,
/// truncated to 200 characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredError {
    pub error_id: String,
    pub category: ErrorCategory,
    pub error_type: String,
    pub retryable: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

fn new_error_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub fn sanitize_message(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return "Unknown error".to_string();
    }

    if first_line.chars().count() > MAX_MESSAGE_LEN {
        let truncated: String = first_line.chars().take(MAX_MESSAGE_LEN).collect();
        format!("{}...", truncated)
    } else {
        first_line.to_string()
    }
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.to_structured(None))).into_response()
    }
}

/// Configuration errors raised while reading the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_categories() {
        assert!(!RouterError::NotFound("x".into()).is_retryable());
        assert!(!RouterError::Validation("x".into()).is_retryable());
        assert!(RouterError::Transport("x".into()).is_retryable());
        assert!(RouterError::timeout("call", Duration::from_secs(1)).is_retryable());
        assert!(RouterError::NoResponse("x".into()).is_retryable());
        assert!(RouterError::ServiceUnavailable("x".into()).is_retryable());
        assert!(!RouterError::Remote {
            code: -1,
            message: "boom".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_sanitize_truncates_and_drops_detail() {
        let long = "x".repeat(250);
        let sanitized = sanitize_message(&long);
        assert_eq!(sanitized.len(), MAX_MESSAGE_LEN + 3);
        assert!(sanitized.ends_with("..."));

        let multi = "connection refused\n  at frame 1\n  at frame 2";
        assert_eq!(sanitize_message(multi), "connection refused");
        assert_eq!(sanitize_message(""), "Unknown error");
    }

    #[test]
    fn test_rpc_codes_map_to_taxonomy() {
        let err = RpcError {
            code: CODE_METHOD_NOT_FOUND,
            message: "no such tool".into(),
            data: None,
        };
        assert_eq!(
            RouterError::from_rpc(&err).category(),
            ErrorCategory::NotFound
        );

        let err = RpcError {
            code: CODE_NO_RESPONSE,
            message: "stream closed".into(),
            data: None,
        };
        assert_eq!(
            RouterError::from_rpc(&err).category(),
            ErrorCategory::NoResponse
        );

        let err = RpcError {
            code: 42,
            message: "custom".into(),
            data: None,
        };
        assert_eq!(
            RouterError::from_rpc(&err),
            RouterError::Remote {
                code: 42,
                message: "custom".into()
            }
        );
    }

    #[test]
    fn test_structured_error_fields() {
        let structured =
            RouterError::ServiceUnavailable("backend down".into()).to_structured(Some("t1"));

        assert_eq!(structured.error_id.len(), 8);
        assert_eq!(structured.category, ErrorCategory::ServiceUnavailable);
        assert_eq!(structured.error_type, "ServiceUnavailable");
        assert!(structured.retryable);
        assert_eq!(structured.retry_after_ms, Some(15_000));
        assert_eq!(structured.tool_name.as_deref(), Some("t1"));
    }
}
