//! Resilient remote-operation layer.
//!
//! Two cooperating pieces:
//! - [`Invoker`] runs one authenticated backend call with a per-attempt
//!   deadline and caller cancellation, and silently retries transient
//!   failures with exponential backoff.
//! - [`RetryOrchestrator`] drives a bounded, user-visible retry workflow
//!   for saves that fail validation.
//!
//! Their retry counters are independent: the invoker's transient retries
//! never advance the orchestrator's attempt count.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod classifier;
pub mod config;
pub mod error;
pub mod invoker;
pub mod notice;
pub mod orchestrator;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod types;

pub use classifier::Classify;
pub use classifier::ErrorClass;
pub use error::OrchestratorError;
pub use error::TransportError;
pub use invoker::Invoker;
pub use invoker::InvokerConfig;
pub use invoker::RetryStatus;
pub use notice::NoticeAction;
pub use notice::UserNotice;
pub use orchestrator::InvokedSave;
pub use orchestrator::RetryConfig;
pub use orchestrator::RetryOrchestrator;
pub use orchestrator::RetryPhase;
pub use orchestrator::RetryState;
pub use orchestrator::SaveOperation;
pub use session::SessionProvider;
pub use session::SharedSession;
pub use session::StaticSession;
pub use telemetry::MemorySink;
pub use telemetry::TelemetryRecord;
pub use telemetry::TelemetrySink;
pub use telemetry::TracingSink;
pub use transport::HttpTransport;
pub use transport::Transport;
pub use types::CallRequest;
pub use types::Credential;
pub use types::InvocationResult;
pub use types::RawResponse;
pub use types::ValidationIssue;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
