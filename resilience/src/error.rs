//! Error types for remote calls and retry orchestration.

use thiserror::Error;

use crate::types::ValidationIssue;

/// Transport-level failure, as opposed to an application error marker
/// inside a delivered response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("transport misconfigured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_decode() {
            TransportError::InvalidResponse(err.to_string())
        } else if err.is_builder() {
            TransportError::Config(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Error reported to a [`crate::RetryOrchestrator`]'s `on_error` callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("max retries exceeded")]
    MaxRetriesExceeded {
        attempts: u32,
        errors: Vec<ValidationIssue>,
    },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("session error: {0}")]
    Fatal(String),

    #[error("{0}")]
    Failed(String),
}
