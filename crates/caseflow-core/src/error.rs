//! Error types for caseflow core
//!
//! Errors are recovered as close to their source as possible:
//! - REST failures surface as [`ApiError`] to the immediate caller
//! - Orchestrator operations fold every failure into a `SyncResult`
//! - Notification failures are logged and swallowed

use caseflow_model::ModelError;
use caseflow_realtime::TransportError;

/// Default message when the server gave none
pub const DEFAULT_SYNC_ERROR: &str = "Synchronization failed. Please try again.";

/// Main caseflow error type
#[derive(Debug, thiserror::Error)]
pub enum CaseflowError {
    /// Invalid caller input
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ModelError),

    /// REST call failed
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Realtime transport failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Permission lookup failed
    #[error("permission error: {0}")]
    Rbac(#[from] RbacError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No case is loaded in the context store
    #[error("no case is currently loaded")]
    NoCurrentCase,

    /// The current user may not perform the action
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The user declined a confirmation prompt
    #[error("cancelled by user")]
    Cancelled,
}

impl CaseflowError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            Self::Transport(e) => e.is_retryable(),
            Self::Rbac(RbacError::Unavailable(_)) => true,
            _ => false,
        }
    }

    /// Message suitable for a toast
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// REST errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Non-success status, with the server's message when it sent one
    #[error("http {status}: {}", message.as_deref().unwrap_or("request failed"))]
    Status {
        /// HTTP status code
        status: u16,
        /// Server-provided message
        message: Option<String>,
    },

    /// Request never completed
    #[error("request failed: {0}")]
    Transport(String),

    /// Response did not match the expected shape
    #[error("unexpected response: {0}")]
    Decode(#[from] ModelError),

    /// No bearer token available
    #[error("not authenticated")]
    Unauthenticated,
}

impl ApiError {
    /// Server-provided message, else the default sync failure text
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } if !message.is_empty() => message.clone(),
            _ => DEFAULT_SYNC_ERROR.to_string(),
        }
    }

    /// Transient failures worth retrying by the caller
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// 404
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
                message: None,
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

/// Notification delivery errors (always swallowed by callers)
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Delivery failed
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

impl From<ApiError> for NotifyError {
    fn from(err: ApiError) -> Self {
        Self::Delivery(err.to_string())
    }
}

/// Permission service errors
#[derive(Debug, thiserror::Error)]
pub enum RbacError {
    /// Service unreachable
    #[error("permission service unavailable: {0}")]
    Unavailable(String),
}

impl From<ApiError> for RbacError {
    fn from(err: ApiError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("could not read {path}: {source}")]
    Read {
        /// Path
        path: String,
        /// IO error
        #[source]
        source: std::io::Error,
    },

    /// TOML was invalid
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_wins_for_user_text() {
        let err = ApiError::Status {
            status: 409,
            message: Some("User already assigned".into()),
        };
        assert_eq!(err.user_message(), "User already assigned");
        assert!(!err.is_retryable());
    }

    #[test]
    fn default_message_without_server_text() {
        let err = ApiError::Status {
            status: 500,
            message: None,
        };
        assert_eq!(err.user_message(), DEFAULT_SYNC_ERROR);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "http 500: request failed");
    }

    #[test]
    fn caseflow_error_retryable_classification() {
        assert!(CaseflowError::Api(ApiError::Transport("reset".into())).is_retryable());
        assert!(!CaseflowError::NoCurrentCase.is_retryable());
        assert!(!CaseflowError::Cancelled.is_retryable());
    }

    #[test]
    fn not_found() {
        let err = ApiError::Status {
            status: 404,
            message: None,
        };
        assert!(err.is_not_found());
    }
}
