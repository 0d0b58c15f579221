use crate::config::error::ConfigError;
use crate::config::error::Result;
use crate::invoker::InvokerConfig;
use crate::orchestrator::RetryConfig;
use crate::telemetry::DEFAULT_CAPACITY;
use crate::telemetry::MemorySink;
use crate::transport::DEFAULT_FUNCTIONS_PATH;
use crate::transport::HttpTransport;
use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "BULWARK_CONFIG";
const ENV_PREFIX: &str = "BULWARK";
const DEFAULT_FILE_NAME: &str = "bulwark.toml";
const MAX_TRANSIENT_RETRIES: u32 = 10;
const MAX_USER_RETRIES: u32 = 20;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Automatic transient retry and deadlines
    #[serde(default)]
    pub invoker: InvokerSettings,

    /// User-driven validation retry
    #[serde(default)]
    pub retry: RetrySettings,

    /// Backend endpoint
    #[serde(default)]
    pub transport: TransportSettings,

    /// Debug call log
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokerSettings {
    /// Per-attempt deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Cap on any single backoff delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Automatic retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_transient_retries: u32,

    #[serde(default)]
    pub jitter: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// User-initiated retries offered after validation failures. The
    /// orchestrator never sleeps; its base delay comes from
    /// `invoker.initial_delay_ms`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_functions_path")]
    pub functions_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Records kept in memory
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

// serde field defaults
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_functions_path() -> String {
    DEFAULT_FUNCTIONS_PATH.to_string()
}
fn default_true() -> bool {
    true
}
fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_transient_retries: default_max_retries(),
            jitter: false,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            functions_path: default_functions_path(),
        }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            capacity: default_capacity(),
        }
    }
}

impl InvokerSettings {
    pub fn to_invoker_config(&self) -> InvokerConfig {
        InvokerConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_transient_retries: self.max_transient_retries,
            jitter: self.jitter,
        }
    }
}

impl TelemetrySettings {
    /// In-memory call log sized by `capacity`, or `None` when disabled.
    ///
    /// Keep the returned sink to read snapshots; hand a clone to
    /// `Invoker::with_telemetry`.
    pub fn build_sink(&self) -> Option<MemorySink> {
        self.enabled
            .then(|| MemorySink::with_capacity(self.capacity))
    }
}

impl TransportSettings {
    pub fn build_transport(&self) -> Result<HttpTransport> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| ConfigError::ValidationError("transport.base_url is not set".into()))?;
        let mut transport = HttpTransport::new(base_url)
            .map_err(|err| ConfigError::ValidationError(err.to_string()))?
            .with_functions_path(self.functions_path.clone());
        if let Some(api_key) = &self.api_key {
            transport = transport.with_api_key(api_key.clone());
        }
        Ok(transport)
    }
}

impl ResilienceConfig {
    /// Orchestrator config without callbacks; attach them with the
    /// `RetryConfig::on_*` builders.
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(self.retry.max_retries)
            .with_initial_delay(Duration::from_millis(self.invoker.initial_delay_ms))
    }

    pub fn validate(&self) -> Result<()> {
        let invoker = &self.invoker;
        if invoker.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "invoker.timeout_ms must be greater than zero".into(),
            ));
        }
        if invoker.max_transient_retries > MAX_TRANSIENT_RETRIES {
            return Err(ConfigError::ValidationError(format!(
                "invoker.max_transient_retries must be at most {MAX_TRANSIENT_RETRIES}"
            )));
        }
        if invoker.initial_delay_ms > invoker.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "invoker.initial_delay_ms must not exceed invoker.max_delay_ms".into(),
            ));
        }
        if self.retry.max_retries > MAX_USER_RETRIES {
            return Err(ConfigError::ValidationError(format!(
                "retry.max_retries must be at most {MAX_USER_RETRIES}"
            )));
        }
        if self.telemetry.enabled && self.telemetry.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.capacity must be greater than zero".into(),
            ));
        }
        if let Some(base_url) = &self.transport.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "transport.base_url must be an http(s) URL, got '{base_url}'"
            )));
        }
        Ok(())
    }
}

/// Builds a [`ResilienceConfig`] from defaults, an optional file and the
/// environment, in that order of precedence (last wins).
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Read `path` (TOML, or any format `config` infers from the extension).
    /// Loading fails if it does not exist.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Merge all layers, deserialize and validate.
    pub fn load(&self) -> Result<ResilienceConfig> {
        let mut builder = Config::builder();

        // Defaults go in as a JSON source so partial files only override what they name.
        let defaults_json = serde_json::to_string(&ResilienceConfig::default())?;
        builder = builder.add_source(File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(ref path) = self.config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            } else {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        }

        // e.g. BULWARK_INVOKER__TIMEOUT_MS=5000
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ResilienceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the first config file found:
    /// 1. `$BULWARK_CONFIG`
    /// 2. `./bulwark.toml`
    ///
    /// Falls back to defaults plus environment when neither exists.
    pub fn load_default() -> Result<ResilienceConfig> {
        match Self::locate_default_file() {
            Some(path) => Self::new().with_file(path).load(),
            None => Self::new().load(),
        }
    }

    fn locate_default_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        let local = PathBuf::from(DEFAULT_FILE_NAME);
        local.exists().then_some(local)
    }
}
