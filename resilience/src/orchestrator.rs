//! User-driven retry workflow for saves that fail validation.
//!
//! [`RetryState`] is a plain value with pure transitions ([`RetryState::next`]),
//! so the workflow can be tested without any UI. [`RetryOrchestrator`] owns one
//! state, drives a [`SaveOperation`] and fires the configured callbacks.
//!
//! The orchestrator never retries on its own: every retry is an explicit
//! `save`/`retry` call, and its attempt counter is independent of the
//! invoker's internal transient retries.

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::OrchestratorError;
use crate::invoker::Invoker;
use crate::types::InvocationResult;
use crate::types::ValidationIssue;

pub type RetryCallback = Arc<dyn Fn(u32) + Send + Sync>;
pub type SuccessCallback = Arc<dyn Fn() + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&OrchestratorError) + Send + Sync>;

/// Retry orchestrator configuration. Immutable once the orchestrator is built.
#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Base delay shared with the invoker's transient backoff. The
    /// orchestrator itself never sleeps.
    pub initial_delay: Duration,
    on_retry: Option<RetryCallback>,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            on_retry: None,
            on_success: None,
            on_error: None,
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("on_retry", &self.on_retry.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&OrchestratorError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// Nothing failed yet (attempt 1).
    Idle,
    /// A save is in flight.
    AwaitingResult,
    /// Validation failed; the retry affordance may be shown.
    Retryable,
    /// Validation failed past the ceiling. Terminal until reset.
    Exhausted,
    /// A non-validation failure. Terminal until reset.
    Failed,
}

/// Inputs to the retry state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryEvent {
    Started,
    Succeeded,
    ValidationFailed(Vec<ValidationIssue>),
    Failed(OrchestratorError),
    Aborted,
    DialogClosed,
    Reset,
}

/// What the driver must do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    NotifySuccess,
    NotifyError(OrchestratorError),
    /// The save was refused because the state is terminal.
    Refused,
}

/// Retry workflow state.
///
/// Invariant: `1 <= attempt <= max_retries + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState {
    attempt: u32,
    max_retries: u32,
    last_errors: Vec<ValidationIssue>,
    dialog_open: bool,
    phase: RetryPhase,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempt: 1,
            max_retries,
            last_errors: Vec::new(),
            dialog_open: false,
            phase: RetryPhase::Idle,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn last_errors(&self) -> &[ValidationIssue] {
        &self.last_errors
    }

    pub fn dialog_open(&self) -> bool {
        self.dialog_open
    }

    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    pub fn can_retry(&self) -> bool {
        self.attempt <= self.max_retries
    }

    pub fn remaining_retries(&self) -> u32 {
        self.max_retries
            .saturating_add(1)
            .saturating_sub(self.attempt)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, RetryPhase::Exhausted | RetryPhase::Failed)
    }

    /// Pure transition: the state after `event` and the effect to perform.
    pub fn next(&self, event: RetryEvent) -> (RetryState, Effect) {
        let mut next = self.clone();
        let effect = match event {
            RetryEvent::Started => {
                if self.is_terminal() {
                    return (next, Effect::Refused);
                }
                next.phase = RetryPhase::AwaitingResult;
                Effect::None
            }
            RetryEvent::Succeeded => {
                next = RetryState::new(self.max_retries);
                Effect::NotifySuccess
            }
            RetryEvent::ValidationFailed(errors) => {
                next.last_errors = errors;
                if self.attempt <= self.max_retries {
                    next.attempt = self.attempt.saturating_add(1);
                    next.dialog_open = true;
                    next.phase = RetryPhase::Retryable;
                    Effect::None
                } else {
                    next.dialog_open = false;
                    next.phase = RetryPhase::Exhausted;
                    Effect::NotifyError(OrchestratorError::MaxRetriesExceeded {
                        attempts: self.attempt,
                        errors: next.last_errors.clone(),
                    })
                }
            }
            RetryEvent::Failed(err) => {
                next.dialog_open = false;
                next.phase = RetryPhase::Failed;
                Effect::NotifyError(err)
            }
            RetryEvent::Aborted => {
                // Discard the in-flight save: back to where it started.
                next.phase = if self.attempt > 1 {
                    RetryPhase::Retryable
                } else {
                    RetryPhase::Idle
                };
                Effect::None
            }
            RetryEvent::DialogClosed => {
                next.dialog_open = false;
                Effect::None
            }
            RetryEvent::Reset => {
                next = RetryState::new(self.max_retries);
                Effect::None
            }
        };
        (next, effect)
    }
}

/// A caller-supplied save attempt.
#[async_trait]
pub trait SaveOperation: Send {
    async fn attempt(&mut self, bypass_validation: bool) -> InvocationResult;
}

#[async_trait]
impl<F, Fut> SaveOperation for F
where
    F: FnMut(bool) -> Fut + Send,
    Fut: Future<Output = InvocationResult> + Send,
{
    async fn attempt(&mut self, bypass_validation: bool) -> InvocationResult {
        (self)(bypass_validation).await
    }
}

/// Save operation backed by an [`Invoker`] call.
///
/// Sends `params` with a `bypass_validation` flag merged in.
#[derive(Debug, Clone)]
pub struct InvokedSave {
    invoker: Invoker,
    operation: String,
    params: Value,
    cancel: Option<CancellationToken>,
}

impl InvokedSave {
    pub fn new(invoker: Invoker, operation: impl Into<String>, params: Value) -> Self {
        Self {
            invoker,
            operation: operation.into(),
            params,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn params_for(&self, bypass_validation: bool) -> Value {
        match &self.params {
            Value::Object(map) => {
                let mut map = map.clone();
                map.insert("bypass_validation".to_string(), json!(bypass_validation));
                Value::Object(map)
            }
            Value::Null => json!({ "bypass_validation": bypass_validation }),
            other => json!({ "data": other, "bypass_validation": bypass_validation }),
        }
    }
}

#[async_trait]
impl SaveOperation for InvokedSave {
    async fn attempt(&mut self, bypass_validation: bool) -> InvocationResult {
        let params = self.params_for(bypass_validation);
        self.invoker
            .execute(&self.operation, params, self.cancel.as_ref())
            .await
    }
}

/// Drives a bounded, user-visible retry workflow around a save operation.
///
/// One instance per record or edit context.
pub struct RetryOrchestrator<S> {
    operation: S,
    config: RetryConfig,
    state: RetryState,
}

impl<S> fmt::Debug for RetryOrchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S: SaveOperation> RetryOrchestrator<S> {
    pub fn new(operation: S, config: RetryConfig) -> Self {
        let state = RetryState::new(config.max_retries);
        Self {
            operation,
            config,
            state,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn attempt(&self) -> u32 {
        self.state.attempt()
    }

    pub fn last_errors(&self) -> &[ValidationIssue] {
        self.state.last_errors()
    }

    pub fn dialog_open(&self) -> bool {
        self.state.dialog_open()
    }

    pub fn can_retry(&self) -> bool {
        self.state.can_retry()
    }

    pub fn remaining_retries(&self) -> u32 {
        self.state.remaining_retries()
    }

    /// Attempt the save. Returns true on success.
    pub async fn save(&mut self, bypass_validation: bool) -> bool {
        if self.apply(RetryEvent::Started) == Effect::Refused {
            warn!(
                attempt = self.state.attempt(),
                phase = ?self.state.phase(),
                "save refused until reset"
            );
            return false;
        }

        debug!(
            attempt = self.state.attempt(),
            bypass_validation, "attempting save"
        );
        let event = match self.operation.attempt(bypass_validation).await {
            InvocationResult::Success(_) => RetryEvent::Succeeded,
            InvocationResult::ValidationFailure(errors) => RetryEvent::ValidationFailed(errors),
            InvocationResult::Aborted => RetryEvent::Aborted,
            InvocationResult::TransientFailure(reason) => {
                RetryEvent::Failed(OrchestratorError::Transient(reason))
            }
            InvocationResult::FatalFailure(reason) => {
                RetryEvent::Failed(OrchestratorError::Fatal(reason))
            }
            InvocationResult::Failure(reason) => {
                RetryEvent::Failed(OrchestratorError::Failed(reason))
            }
        };

        match self.apply(event) {
            Effect::NotifySuccess => {
                info!("save succeeded");
                if let Some(cb) = &self.config.on_success {
                    cb();
                }
                true
            }
            Effect::NotifyError(err) => {
                warn!(error = %err, attempt = self.state.attempt(), "save failed");
                if let Some(cb) = &self.config.on_error {
                    cb(&err);
                }
                false
            }
            Effect::None | Effect::Refused => {
                if self.state.dialog_open() {
                    info!(
                        attempt = self.state.attempt(),
                        issues = self.state.last_errors().len(),
                        "validation failed, offering retry"
                    );
                }
                false
            }
        }
    }

    /// Re-enter the save when the user acts on the retry affordance.
    ///
    /// `on_retry` only fires when the save will actually run.
    pub async fn retry(&mut self, bypass_validation: bool) -> bool {
        if self.state.is_terminal() {
            warn!(
                attempt = self.state.attempt(),
                phase = ?self.state.phase(),
                "retry refused until reset"
            );
            return false;
        }
        if let Some(cb) = &self.config.on_retry {
            cb(self.state.attempt());
        }
        self.save(bypass_validation).await
    }

    /// The user dismissed the affordance without retrying.
    pub fn close_dialog(&mut self) {
        self.apply(RetryEvent::DialogClosed);
    }

    pub fn reset(&mut self) {
        self.apply(RetryEvent::Reset);
    }

    fn apply(&mut self, event: RetryEvent) -> Effect {
        let (state, effect) = self.state.next(event);
        self.state = state;
        effect
    }
}
