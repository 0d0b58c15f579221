//! Failure classification for retry decisions.
//!
//! Every failure lands in exactly one [`ErrorClass`]. Only `Transient`
//! failures are retried automatically by the invoker; `Validation` failures
//! are escalated to the retry orchestrator.

use serde_json::Value;

use crate::error::TransportError;
use crate::types::RawResponse;
use crate::types::ValidationIssue;

/// Top-level failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Network, timeout or abort-class failure. Retried with backoff.
    Transient,
    /// Missing or expired session. Never retried.
    Fatal,
    /// Operation-specific recoverable rejection. Escalated to the user.
    Validation,
    /// Anything else. Surfaced once.
    Other,
}

/// Trait for failure classification
pub trait Classify {
    fn classify(&self) -> ErrorClass;

    fn is_transient(&self) -> bool {
        self.classify() == ErrorClass::Transient
    }
}

impl Classify for TransportError {
    fn classify(&self) -> ErrorClass {
        match self {
            TransportError::Network(_) | TransportError::Timeout | TransportError::Cancelled => {
                ErrorClass::Transient
            }
            TransportError::Status { status, message } => {
                classify_status(*status).unwrap_or_else(|| classify_message(message))
            }
            TransportError::InvalidResponse(_) | TransportError::Config(_) => ErrorClass::Other,
        }
    }
}

/// Application-level error marker found inside a delivered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationError {
    pub status: u16,
    pub message: String,
    pub issues: Vec<ValidationIssue>,
}

impl Classify for ApplicationError {
    /// An auth status is fatal even when the body also lists issues.
    fn classify(&self) -> ErrorClass {
        let by_status = classify_status(self.status);
        if by_status == Some(ErrorClass::Fatal) {
            return ErrorClass::Fatal;
        }
        if !self.issues.is_empty() {
            return ErrorClass::Validation;
        }
        by_status.unwrap_or_else(|| classify_message(&self.message))
    }
}

/// Extract the application error marker from a response, if any.
///
/// A response is a failure when its body has a non-null `"error"` field,
/// has `"success": false`, or arrived with a non-2xx status.
pub fn application_error(response: &RawResponse) -> Option<ApplicationError> {
    let body = response.body.as_object();
    let marker = body.and_then(|obj| obj.get("error")).filter(|v| !v.is_null());
    let explicit_failure = body
        .and_then(|obj| obj.get("success"))
        .and_then(Value::as_bool)
        == Some(false);

    if marker.is_none() && !explicit_failure && response.is_success_status() {
        return None;
    }

    let message = marker
        .and_then(marker_message)
        .or_else(|| {
            body.and_then(|obj| obj.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if response.is_success_status() {
                "operation failed".to_string()
            } else {
                format!("operation failed with HTTP {}", response.status)
            }
        });

    let issues = body
        .and_then(|obj| obj.get("errors"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_issue).collect())
        .unwrap_or_default();

    Some(ApplicationError {
        status: response.status,
        message,
        issues,
    })
}

fn marker_message(marker: &Value) -> Option<String> {
    match marker {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::Bool(true) => None,
        other => Some(other.to_string()),
    }
}

fn parse_issue(item: &Value) -> Option<ValidationIssue> {
    match item {
        Value::String(message) => Some(ValidationIssue::new(message.clone())),
        Value::Object(_) => serde_json::from_value(item.clone()).ok(),
        _ => None,
    }
}

// Helper: Classify by HTTP status, None when the status carries no signal
fn classify_status(status: u16) -> Option<ErrorClass> {
    match status {
        401 | 403 => Some(ErrorClass::Fatal),
        408 | 429 => Some(ErrorClass::Transient),
        500..=599 => Some(ErrorClass::Transient),
        _ => None,
    }
}

// Helper: Classify free-form error text
pub(crate) fn classify_message(msg: &str) -> ErrorClass {
    let msg_lower = msg.to_lowercase();

    // Session and authentication failures
    if msg_lower.contains("no active session")
        || msg_lower.contains("session expired")
        || msg_lower.contains("not authenticated")
        || msg_lower.contains("unauthorized")
        || msg_lower.contains("jwt")
        || msg_lower.contains("invalid token")
    {
        return ErrorClass::Fatal;
    }

    // Network and timeout failures
    if msg_lower.contains("timeout")
        || msg_lower.contains("timed out")
        || msg_lower.contains("network")
        || msg_lower.contains("failed to fetch")
        || msg_lower.contains("connection")
        || msg_lower.contains("aborted")
        || msg_lower.contains("unavailable")
    {
        return ErrorClass::Transient;
    }

    ErrorClass::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn plain_success_has_no_marker() {
        let response = RawResponse::ok(json!({ "data": [1, 2, 3] }));
        assert_eq!(application_error(&response), None);
    }

    #[test]
    fn null_error_field_is_not_a_marker() {
        let response = RawResponse::ok(json!({ "data": 1, "error": null }));
        assert_eq!(application_error(&response), None);
    }

    #[test]
    fn error_string_marker_is_detected() {
        let response = RawResponse::ok(json!({ "error": "Request timed out" }));
        let err = application_error(&response).unwrap();
        assert_eq!(err.message, "Request timed out");
        assert_eq!(err.classify(), ErrorClass::Transient);
    }

    #[test]
    fn error_object_marker_uses_nested_message() {
        let response = RawResponse::ok(json!({ "error": { "message": "JWT expired" } }));
        let err = application_error(&response).unwrap();
        assert_eq!(err.message, "JWT expired");
        assert_eq!(err.classify(), ErrorClass::Fatal);
    }

    #[test]
    fn success_false_with_errors_is_validation() {
        let response = RawResponse::ok(json!({
            "success": false,
            "errors": [
                { "message": "missing field X" },
                "owner is required",
                42
            ]
        }));
        let err = application_error(&response).unwrap();
        assert_eq!(
            err.issues,
            vec![
                ValidationIssue::new("missing field X"),
                ValidationIssue::new("owner is required"),
            ]
        );
        assert_eq!(err.classify(), ErrorClass::Validation);
    }

    #[test]
    fn non_success_status_without_marker_is_failure() {
        let response = RawResponse::with_status(503, json!({ "detail": "maintenance" }));
        let err = application_error(&response).unwrap();
        assert_eq!(err.message, "operation failed with HTTP 503");
        assert_eq!(err.classify(), ErrorClass::Transient);
    }

    #[test]
    fn status_takes_precedence_over_message() {
        let response = RawResponse::with_status(403, json!({ "error": "forbidden" }));
        assert_eq!(
            application_error(&response).unwrap().classify(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn auth_status_beats_attached_issues() {
        for status in [401, 403] {
            let response = RawResponse::with_status(
                status,
                json!({
                    "error": "JWT expired",
                    "errors": [{ "message": "session expired" }]
                }),
            );
            let err = application_error(&response).unwrap();
            assert_eq!(err.issues.len(), 1);
            assert_eq!(err.classify(), ErrorClass::Fatal);
        }

        let response = RawResponse::with_status(
            422,
            json!({ "error": "invalid", "errors": ["name too long"] }),
        );
        assert_eq!(
            application_error(&response).unwrap().classify(),
            ErrorClass::Validation
        );
    }

    #[test]
    fn unrecognised_marker_is_other() {
        let response = RawResponse::ok(json!({ "error": "duplicate key value" }));
        assert_eq!(
            application_error(&response).unwrap().classify(),
            ErrorClass::Other
        );
    }

    #[test]
    fn transport_errors_classify_by_kind() {
        assert!(TransportError::Network("dns".into()).is_transient());
        assert!(TransportError::Timeout.is_transient());
        assert_eq!(
            TransportError::Status {
                status: 401,
                message: "no".into()
            }
            .classify(),
            ErrorClass::Fatal
        );
        assert_eq!(
            TransportError::Status {
                status: 502,
                message: "bad gateway".into()
            }
            .classify(),
            ErrorClass::Transient
        );
        assert_eq!(
            TransportError::Status {
                status: 404,
                message: "function not found".into()
            }
            .classify(),
            ErrorClass::Other
        );
        assert_eq!(
            TransportError::InvalidResponse("garbage".into()).classify(),
            ErrorClass::Other
        );
    }

    #[test]
    fn message_heuristics() {
        assert_eq!(classify_message("No active session"), ErrorClass::Fatal);
        assert_eq!(classify_message("Failed to fetch"), ErrorClass::Transient);
        assert_eq!(
            classify_message("Connection reset by peer"),
            ErrorClass::Transient
        );
        assert_eq!(classify_message("constraint violated"), ErrorClass::Other);
    }
}
