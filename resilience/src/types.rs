//! Request, response and outcome types shared by the invoker and the
//! retry orchestrator.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::classifier::ErrorClass;

/// Bearer credential handed out by a [`crate::SessionProvider`].
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// One transport-level call: operation name, JSON params and headers.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub operation: String,
    pub params: Value,
    pub headers: BTreeMap<String, String>,
}

impl CallRequest {
    pub fn new(operation: impl Into<String>, params: Value) -> Self {
        Self {
            operation: operation.into(),
            params,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_credential(self, credential: &Credential) -> Self {
        self.with_header("Authorization", credential.bearer())
    }
}

/// A response that made it through the transport.
///
/// It may still carry an application-level error marker; see
/// [`crate::classifier::application_error`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

impl RawResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn with_status(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single validation problem reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}: {}", self.message),
            (Some(file), None) => write!(f, "{file}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Final outcome of one logical remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult<T = Value> {
    Success(T),
    /// Network, timeout or deadline failure that survived automatic retries.
    TransientFailure(String),
    /// Recoverable rejection of the operation's content.
    ValidationFailure(Vec<ValidationIssue>),
    /// Session or authentication failure. Never retried.
    FatalFailure(String),
    /// Anything unclassified. Surfaced once, never retried.
    Failure(String),
    /// The caller cancelled the call. Safe to discard.
    Aborted,
}

impl<T> InvocationResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, InvocationResult::Aborted)
    }

    /// Failure class, or `None` for success and caller aborts.
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            InvocationResult::Success(_) | InvocationResult::Aborted => None,
            InvocationResult::TransientFailure(_) => Some(ErrorClass::Transient),
            InvocationResult::ValidationFailure(_) => Some(ErrorClass::Validation),
            InvocationResult::FatalFailure(_) => Some(ErrorClass::Fatal),
            InvocationResult::Failure(_) => Some(ErrorClass::Other),
        }
    }

    /// Human-readable description of a failure.
    pub fn error_message(&self) -> Option<String> {
        match self {
            InvocationResult::Success(_) => None,
            InvocationResult::TransientFailure(reason)
            | InvocationResult::FatalFailure(reason)
            | InvocationResult::Failure(reason) => Some(reason.clone()),
            InvocationResult::ValidationFailure(issues) => Some(
                issues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            InvocationResult::Aborted => Some("operation aborted".to_string()),
        }
    }

    pub fn map<U, F>(self, f: F) -> InvocationResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            InvocationResult::Success(value) => InvocationResult::Success(f(value)),
            InvocationResult::TransientFailure(reason) => InvocationResult::TransientFailure(reason),
            InvocationResult::ValidationFailure(issues) => {
                InvocationResult::ValidationFailure(issues)
            }
            InvocationResult::FatalFailure(reason) => InvocationResult::FatalFailure(reason),
            InvocationResult::Failure(reason) => InvocationResult::Failure(reason),
            InvocationResult::Aborted => InvocationResult::Aborted,
        }
    }

    pub fn success(self) -> Option<T> {
        match self {
            InvocationResult::Success(value) => Some(value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("secret-token");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("secret-token"));
        assert_eq!(credential.bearer(), "Bearer secret-token");
    }

    #[test]
    fn validation_issue_accepts_partial_payloads() {
        let issues: Vec<ValidationIssue> = serde_json::from_value(json!([
            { "message": "missing field X" },
            { "message": "bad date", "file": "controls.csv", "line": 12 }
        ]))
        .unwrap();

        assert_eq!(issues[0], ValidationIssue::new("missing field X"));
        assert_eq!(issues[1], ValidationIssue::new("bad date").at("controls.csv", 12));
        assert_eq!(issues[1].to_string(), "controls.csv:12: bad date");
    }

    #[test]
    fn error_message_joins_validation_issues() {
        let result: InvocationResult = InvocationResult::ValidationFailure(vec![
            ValidationIssue::new("a"),
            ValidationIssue::new("b"),
        ]);
        assert_eq!(result.error_message().as_deref(), Some("a; b"));
        assert_eq!(result.error_class(), Some(ErrorClass::Validation));
    }

    #[test]
    fn map_only_touches_success() {
        let ok: InvocationResult<u32> = InvocationResult::Success(2);
        assert_eq!(ok.map(|v| v * 10), InvocationResult::Success(20));

        let fatal: InvocationResult<u32> = InvocationResult::FatalFailure("expired".into());
        assert_eq!(
            fatal.map(|v| v * 10),
            InvocationResult::FatalFailure("expired".into())
        );
    }
}
