//! Configuration for the invoker, retry orchestrator, transport and telemetry.
//!
//! Layered with the 12-factor app pattern:
//! 1. Defaults (from code)
//! 2. Config file (bulwark.toml)
//! 3. Environment variables (BULWARK_* prefix, `__` for nesting)
//!
//! # Example
//!
//! ```no_run
//! use bulwark_resilience::config::ConfigLoader;
//!
//! let config = ConfigLoader::load_default().expect("Failed to load config");
//! let invoker_config = config.invoker.to_invoker_config();
//! ```

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use error::Result;
pub use loader::ConfigLoader;
pub use loader::InvokerSettings;
pub use loader::ResilienceConfig;
pub use loader::RetrySettings;
pub use loader::TelemetrySettings;
pub use loader::TransportSettings;
