//! User-facing messages for call outcomes.

use crate::error::OrchestratorError;
use crate::types::InvocationResult;
use crate::types::ValidationIssue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    /// Nothing to offer besides dismissing.
    Dismiss,
    /// Re-run the operation as-is.
    TryAgain,
    /// Retry, optionally bypassing validation.
    RetryOrBypass,
    /// The session is gone; the user must sign in again.
    SignIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserNotice {
    pub message: String,
    pub action: NoticeAction,
    pub issues: Vec<ValidationIssue>,
}

impl UserNotice {
    fn new(message: impl Into<String>, action: NoticeAction) -> Self {
        Self {
            message: message.into(),
            action,
            issues: Vec::new(),
        }
    }

    /// Notice for an invoker result. `None` for success and for aborted
    /// calls, whose results the caller discards.
    pub fn for_result<T>(result: &InvocationResult<T>) -> Option<Self> {
        match result {
            InvocationResult::Success(_) | InvocationResult::Aborted => None,
            InvocationResult::FatalFailure(_) => Some(Self::new(
                "Your session has expired. Please sign in again.",
                NoticeAction::SignIn,
            )),
            InvocationResult::TransientFailure(reason) => Some(Self::new(
                format!("The server could not be reached ({reason}). Please try again."),
                NoticeAction::TryAgain,
            )),
            InvocationResult::ValidationFailure(issues) => Some(Self {
                message: "The record did not pass validation.".to_string(),
                action: NoticeAction::RetryOrBypass,
                issues: issues.clone(),
            }),
            InvocationResult::Failure(reason) => Some(Self::new(
                format!("The operation failed: {reason}"),
                NoticeAction::Dismiss,
            )),
        }
    }

    /// Notice for an error delivered to the orchestrator's `on_error`.
    pub fn for_orchestrator_error(err: &OrchestratorError) -> Self {
        match err {
            OrchestratorError::MaxRetriesExceeded { attempts, errors } => Self {
                message: format!("Validation still failing after {attempts} attempts."),
                action: NoticeAction::Dismiss,
                issues: errors.clone(),
            },
            OrchestratorError::Transient(reason) => Self::for_result::<()>(
                &InvocationResult::TransientFailure(reason.clone()),
            )
            .unwrap_or_else(|| Self::new(err.to_string(), NoticeAction::TryAgain)),
            OrchestratorError::Fatal(_) => Self::new(
                "Your session has expired. Please sign in again.",
                NoticeAction::SignIn,
            ),
            OrchestratorError::Failed(reason) => Self::new(
                format!("The operation failed: {reason}"),
                NoticeAction::Dismiss,
            ),
        }
    }
}
