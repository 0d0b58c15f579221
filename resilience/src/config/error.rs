use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a usable [`super::ResilienceConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or merged.
    #[error("cannot load bulwark configuration: {0}")]
    LoadError(String),

    #[error("bulwark config file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// A source was read but its contents do not match the schema.
    #[error("malformed bulwark configuration: {0}")]
    ParseError(String),

    #[error("invalid bulwark configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::FileParse { .. } | config::ConfigError::Type { .. } => {
                ConfigError::ParseError(err.to_string())
            }
            other => ConfigError::LoadError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
