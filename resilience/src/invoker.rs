//! Authenticated remote calls with deadlines, cancellation and transient
//! retry.
//!
//! Each logical call runs sequential attempts. Every attempt:
//! - reads a fresh credential from the session provider,
//! - runs the transport inside an [`AttemptScope`] bounded by the per-attempt
//!   timeout and by the caller's cancellation token,
//! - is classified into an [`InvocationResult`] or a transient failure.
//!
//! Transient failures are retried after `initial_delay * 2^n` until the
//! retry ceiling is reached. The retry loop is invisible to the caller,
//! which only sees the final result.

use backon::BackoffBuilder;
use backon::ExponentialBackoff;
use backon::ExponentialBuilder;
use bulwark_async_utils::AttemptScope;
use bulwark_async_utils::Interrupted;
use bulwark_async_utils::OrCancelExt;
use bulwark_async_utils::sleep_or_cancel;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::classifier::Classify;
use crate::classifier::ErrorClass;
use crate::classifier::application_error;
use crate::session::SessionProvider;
use crate::telemetry::TelemetryRecord;
use crate::telemetry::TelemetrySink;
use crate::transport::Transport;
use crate::types::CallRequest;
use crate::types::Credential;
use crate::types::InvocationResult;
use crate::types::RawResponse;

pub const NO_ACTIVE_SESSION: &str = "no active session";

/// Invoker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct InvokerConfig {
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Delay before the first automatic retry; doubles for each retry after.
    pub initial_delay: Duration,
    /// Upper bound for any single backoff delay.
    pub max_delay: Duration,
    /// Automatic retries after the first attempt (3 means 4 calls total).
    pub max_transient_retries: u32,
    /// Randomise delays to spread out concurrent retries.
    pub jitter: bool,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            max_transient_retries: 3,
            jitter: false,
        }
    }
}

impl InvokerConfig {
    /// Backoff schedule for one call: yields exactly `max_transient_retries`
    /// delays, then `None`.
    pub fn backoff(&self) -> ExponentialBackoff {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay.max(self.initial_delay))
            .with_factor(2.0)
            .with_max_times(self.max_transient_retries as usize);
        if self.jitter {
            builder.with_jitter().build()
        } else {
            builder.build()
        }
    }
}

/// Retry status reported before each backoff sleep.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStatus {
    pub operation: String,
    /// Attempt that just failed (1-indexed).
    pub attempt: u32,
    /// Sleep before the next attempt.
    pub delay: Duration,
    /// Time since the call started.
    pub elapsed: Duration,
    pub reason: String,
}

pub type StatusCallback = Arc<dyn Fn(&RetryStatus) + Send + Sync>;

enum AttemptOutcome {
    Done(InvocationResult),
    Transient(String),
}

/// Executes remote operations on behalf of UI handlers.
///
/// Cheap to clone; clones share the transport, session provider and sinks but
/// no per-call state, so concurrent calls never interfere.
#[derive(Clone)]
pub struct Invoker {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionProvider>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    on_status: Option<StatusCallback>,
    config: InvokerConfig,
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("config", &self.config)
            .field("telemetry", &self.telemetry.is_some())
            .finish_non_exhaustive()
    }
}

impl Invoker {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<dyn SessionProvider>) -> Self {
        Self {
            transport,
            session,
            telemetry: None,
            on_status: None,
            config: InvokerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InvokerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    pub fn with_status_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RetryStatus) + Send + Sync + 'static,
    {
        self.on_status = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Run `operation` with `params`, retrying transient failures.
    ///
    /// When `cancel` fires, no further attempt or backoff sleep starts and
    /// the call returns [`InvocationResult::Aborted`].
    pub async fn execute(
        &self,
        operation: &str,
        params: Value,
        cancel: Option<&CancellationToken>,
    ) -> InvocationResult {
        let timestamp = Utc::now();
        let started = Instant::now();
        let root = cancel.cloned().unwrap_or_default();

        let (result, attempts) = self.run(operation, &params, &root, started).await;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            operation,
            attempts,
            duration_ms,
            success = result.is_success(),
            "remote call completed"
        );
        if let Some(sink) = &self.telemetry {
            sink.record(TelemetryRecord::from_result(
                timestamp,
                operation,
                params,
                &result,
                duration_ms,
                attempts,
            ));
        }
        result
    }

    async fn run(
        &self,
        operation: &str,
        params: &Value,
        root: &CancellationToken,
        started: Instant,
    ) -> (InvocationResult, u32) {
        if operation.trim().is_empty() {
            return (
                InvocationResult::Failure("operation name must not be empty".to_string()),
                0,
            );
        }

        let mut delays = self.config.backoff();
        let mut attempt: u32 = 0;

        loop {
            if root.is_cancelled() {
                return (InvocationResult::Aborted, attempt);
            }

            let Ok(credential) = self.session.credential().or_cancel(root).await else {
                debug!(operation, attempt, "cancelled while reading credential");
                return (InvocationResult::Aborted, attempt);
            };
            let Some(credential) = credential else {
                warn!(operation, attempt, "no credential available, not calling");
                return (
                    InvocationResult::FatalFailure(NO_ACTIVE_SESSION.to_string()),
                    attempt,
                );
            };

            attempt = attempt.saturating_add(1);
            debug!(operation, attempt, "starting attempt");

            let reason = match self
                .attempt_once(operation, params, &credential, root)
                .await
            {
                AttemptOutcome::Done(result) => return (result, attempt),
                AttemptOutcome::Transient(reason) => reason,
            };

            if root.is_cancelled() {
                return (InvocationResult::Aborted, attempt);
            }

            let Some(delay) = delays.next() else {
                warn!(operation, attempt, %reason, "transient retries exhausted");
                return (InvocationResult::TransientFailure(reason), attempt);
            };

            let status = RetryStatus {
                operation: operation.to_string(),
                attempt,
                delay,
                elapsed: started.elapsed(),
                reason,
            };
            warn!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %status.reason,
                "transient failure, retrying"
            );
            if let Some(cb) = &self.on_status {
                cb(&status);
            }

            if sleep_or_cancel(root, delay).await.is_err() {
                debug!(operation, attempt, "cancelled during backoff");
                return (InvocationResult::Aborted, attempt);
            }
        }
    }

    async fn attempt_once(
        &self,
        operation: &str,
        params: &Value,
        credential: &Credential,
        root: &CancellationToken,
    ) -> AttemptOutcome {
        let request = CallRequest::new(operation, params.clone()).with_credential(credential);
        let scope = AttemptScope::new(root);

        let outcome = scope
            .run(
                self.transport.call(&request, scope.token()),
                self.config.timeout,
            )
            .await;

        match outcome {
            Err(Interrupted::Cancelled) => AttemptOutcome::Done(InvocationResult::Aborted),
            Err(Interrupted::DeadlineElapsed(deadline)) => {
                AttemptOutcome::Transient(format!("operation timed out after {deadline:?}"))
            }
            Ok(Err(err)) => {
                if root.is_cancelled() {
                    return AttemptOutcome::Done(InvocationResult::Aborted);
                }
                match err.classify() {
                    ErrorClass::Transient => AttemptOutcome::Transient(err.to_string()),
                    ErrorClass::Fatal => {
                        AttemptOutcome::Done(InvocationResult::FatalFailure(err.to_string()))
                    }
                    ErrorClass::Validation | ErrorClass::Other => {
                        AttemptOutcome::Done(InvocationResult::Failure(err.to_string()))
                    }
                }
            }
            Ok(Ok(response)) => classify_response(response),
        }
    }
}

fn classify_response(response: RawResponse) -> AttemptOutcome {
    let Some(app_error) = application_error(&response) else {
        return AttemptOutcome::Done(InvocationResult::Success(response.body));
    };

    match app_error.classify() {
        ErrorClass::Validation => {
            AttemptOutcome::Done(InvocationResult::ValidationFailure(app_error.issues))
        }
        ErrorClass::Transient => AttemptOutcome::Transient(app_error.message),
        ErrorClass::Fatal => AttemptOutcome::Done(InvocationResult::FatalFailure(app_error.message)),
        ErrorClass::Other => AttemptOutcome::Done(InvocationResult::Failure(app_error.message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_matches_documented_values() {
        let config = InvokerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_transient_retries, 3);
        assert!(!config.jitter);
    }

    #[test]
    fn backoff_doubles_and_stops_at_ceiling() {
        let delays: Vec<_> = InvokerConfig::default().backoff().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
            ]
        );
    }

    #[test]
    fn backoff_is_capped_by_max_delay() {
        let config = InvokerConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            max_transient_retries: 4,
            ..Default::default()
        };
        let delays: Vec<_> = config.backoff().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_secs(3),
            ]
        );
    }

    #[test]
    fn zero_retries_yields_no_delays() {
        let config = InvokerConfig {
            max_transient_retries: 0,
            ..Default::default()
        };
        assert_eq!(config.backoff().next(), None);
    }

    #[test]
    fn validation_marker_is_not_retried() {
        let response = RawResponse::ok(serde_json::json!({
            "error": "validation failed",
            "errors": [{ "message": "missing field X" }]
        }));
        match classify_response(response) {
            AttemptOutcome::Done(InvocationResult::ValidationFailure(issues)) => {
                assert_eq!(issues.len(), 1);
            }
            _ => panic!("expected validation failure"),
        }
    }
}
