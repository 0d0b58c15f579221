#![allow(clippy::expect_used, clippy::unwrap_used)]

use bulwark_resilience::config::ConfigError;
use bulwark_resilience::config::ConfigLoader;
use bulwark_resilience::config::ResilienceConfig;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("bulwark.toml");
    fs::write(&path, contents).unwrap();
    path
}

fn clear_env() {
    // SAFETY: tests touching the environment are serialized.
    unsafe {
        std::env::remove_var("BULWARK_CONFIG");
        std::env::remove_var("BULWARK_INVOKER__TIMEOUT_MS");
        std::env::remove_var("BULWARK_RETRY__MAX_RETRIES");
    }
}

#[test]
#[serial]
fn defaults_without_file_or_env() {
    clear_env();
    let config = ConfigLoader::new().load().unwrap();
    assert_eq!(config, ResilienceConfig::default());
}

#[test]
#[serial]
fn file_overrides_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[invoker]
timeout_ms = 5000
max_transient_retries = 2

[retry]
max_retries = 5

[transport]
base_url = "https://db.example.com"
api_key = "anon"
"#,
    );

    let config = ConfigLoader::new().with_file(&path).load().unwrap();

    let invoker = config.invoker.to_invoker_config();
    assert_eq!(invoker.timeout, Duration::from_secs(5));
    assert_eq!(invoker.max_transient_retries, 2);
    assert_eq!(invoker.initial_delay, Duration::from_millis(500));
    assert_eq!(config.to_retry_config().max_retries, 5);
    assert_eq!(
        config.transport.base_url.as_deref(),
        Some("https://db.example.com")
    );
    assert_eq!(config.transport.functions_path, "functions/v1");
    assert!(config.transport.build_transport().is_ok());
}

#[test]
#[serial]
fn env_overrides_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[invoker]\ntimeout_ms = 5000\n");

    // SAFETY: serialized with the other environment tests.
    unsafe {
        std::env::set_var("BULWARK_INVOKER__TIMEOUT_MS", "750");
        std::env::set_var("BULWARK_RETRY__MAX_RETRIES", "1");
    }
    let config = ConfigLoader::new().with_file(&path).load();
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.invoker.timeout_ms, 750);
    assert_eq!(config.retry.max_retries, 1);
}

#[test]
#[serial]
fn config_path_env_selects_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[telemetry]\ncapacity = 25\n");

    // SAFETY: serialized with the other environment tests.
    unsafe {
        std::env::set_var("BULWARK_CONFIG", &path);
    }
    let config = ConfigLoader::load_default();
    clear_env();

    assert_eq!(config.unwrap().telemetry.capacity, 25);
}

#[test]
#[serial]
fn missing_file_is_reported() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = ConfigLoader::new().with_file(&missing).load().unwrap_err();

    assert!(matches!(err, ConfigError::FileNotFound(path) if path == missing));
}

#[test]
#[serial]
fn invalid_values_fail_validation() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[invoker]\nmax_transient_retries = 50\n");

    let err = ConfigLoader::new().with_file(&path).load().unwrap_err();

    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
#[serial]
fn unbounded_user_retries_are_rejected() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[retry]\nmax_retries = 4294967295\n");

    let err = ConfigLoader::new().with_file(&path).load().unwrap_err();

    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
#[serial]
fn telemetry_can_be_disabled_from_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[telemetry]\nenabled = false\n");

    let config = ConfigLoader::new().with_file(&path).load().unwrap();

    assert!(config.telemetry.build_sink().is_none());
    assert!(ConfigLoader::new().load().unwrap().telemetry.build_sink().is_some());
}
