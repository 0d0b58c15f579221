//! Observational call records for debug panels.
//!
//! Sinks receive one [`TelemetryRecord`] per top-level invoker call. They are
//! purely observational and never affect control flow.

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::types::InvocationResult;

/// Default number of records kept by [`MemorySink`].
pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    TransientFailure,
    ValidationFailure,
    FatalFailure,
    Failure,
    Aborted,
}

impl CallStatus {
    pub fn of<T>(result: &InvocationResult<T>) -> Self {
        match result {
            InvocationResult::Success(_) => CallStatus::Success,
            InvocationResult::TransientFailure(_) => CallStatus::TransientFailure,
            InvocationResult::ValidationFailure(_) => CallStatus::ValidationFailure,
            InvocationResult::FatalFailure(_) => CallStatus::FatalFailure,
            InvocationResult::Failure(_) => CallStatus::Failure,
            InvocationResult::Aborted => CallStatus::Aborted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CallOutcome {
    Response(Value),
    Error(String),
}

/// One top-level call as seen from the outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub request: Value,
    pub outcome: CallOutcome,
    pub status: CallStatus,
    pub duration_ms: u64,
    pub attempts: u32,
}

impl TelemetryRecord {
    pub fn from_result(
        timestamp: DateTime<Utc>,
        operation: &str,
        request: Value,
        result: &InvocationResult,
        duration_ms: u64,
        attempts: u32,
    ) -> Self {
        let outcome = match result {
            InvocationResult::Success(body) => CallOutcome::Response(body.clone()),
            other => CallOutcome::Error(other.error_message().unwrap_or_default()),
        };
        Self {
            timestamp,
            operation: operation.to_string(),
            request,
            outcome,
            status: CallStatus::of(result),
            duration_ms,
            attempts,
        }
    }
}

pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: TelemetryRecord);
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, record: TelemetryRecord) {
        match record.status {
            CallStatus::Success | CallStatus::Aborted => tracing::info!(
                target: "bulwark::telemetry",
                operation = %record.operation,
                status = ?record.status,
                duration_ms = record.duration_ms,
                attempts = record.attempts,
                "remote call finished"
            ),
            _ => tracing::warn!(
                target: "bulwark::telemetry",
                operation = %record.operation,
                status = ?record.status,
                duration_ms = record.duration_ms,
                attempts = record.attempts,
                outcome = ?record.outcome,
                "remote call failed"
            ),
        }
    }
}

/// Fixed-capacity in-memory sink that keeps only the most recent records.
#[derive(Clone)]
pub struct MemorySink {
    inner: Arc<Mutex<VecDeque<TelemetryRecord>>>,
    capacity: usize,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemorySink {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Copy of the buffered records, oldest first.
    pub fn snapshot(&self) -> Vec<TelemetryRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, record: TelemetryRecord) {
        let mut ring = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        while ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(record);
    }
}
