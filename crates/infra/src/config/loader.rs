//! Configuration loader
//!
//! Loads configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `TETHER_API_URL` is not set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Every section has defaults, so a file only needs the values it changes.
//! The loaded configuration is always validated.
//!
//! ## Environment Variables
//! - `TETHER_API_URL`: Platform API base URL (required for env loading)
//! - `TETHER_AUTH_URL`: Authorization server URL
//! - `TETHER_LOG_URL`: Log cache URL
//! - `TETHER_API_TIMEOUT_SECS`: Request timeout in seconds
//! - `TETHER_POLL_INTERVAL_MS`: Job polling interval in milliseconds
//! - `TETHER_POLL_MAX_WAIT_SECS`: Job polling deadline in seconds (0 = none)
//! - `TETHER_POLL_MAX_RETRIES`: Consecutive transport failures tolerated
//! - `TETHER_POLL_MAX_BACKOFF_MS`: Upper bound for the polling backoff
//! - `TETHER_TOKEN_SAFETY_MARGIN_SECS`: Refresh this long before expiry
//! - `TETHER_TOKEN_RETRY_SECS`: Wait after a failed background refresh
//! - `TETHER_TRACE`: Whether traffic logging is enabled (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./tether.json` or `./tether.toml` (current working directory)
//! 2. `./config.json` or `./config.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tether_domain::{Config, Result, TetherError};

use crate::errors::InfraError;

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the API URL is not
/// set there, falls back to loading from a config file.
///
/// # Errors
/// Returns `TetherError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value fails validation
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// `TETHER_API_URL` must be present; every other variable is optional and
/// overrides the default when set.
///
/// # Errors
/// Returns `TetherError::Config` if the API URL is missing or a value is
/// invalid.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.api.base_url = env_var("TETHER_API_URL")?;
    if let Some(url) = env_opt("TETHER_AUTH_URL") {
        config.api.auth_url = url;
    }
    if let Some(url) = env_opt("TETHER_LOG_URL") {
        config.api.log_url = url;
    }
    override_parsed("TETHER_API_TIMEOUT_SECS", &mut config.api.timeout_seconds)?;

    override_parsed("TETHER_POLL_INTERVAL_MS", &mut config.polling.interval_ms)?;
    override_parsed("TETHER_POLL_MAX_WAIT_SECS", &mut config.polling.max_wait_seconds)?;
    override_parsed("TETHER_POLL_MAX_RETRIES", &mut config.polling.max_transport_retries)?;
    override_parsed("TETHER_POLL_MAX_BACKOFF_MS", &mut config.polling.max_backoff_ms)?;

    override_parsed("TETHER_TOKEN_SAFETY_MARGIN_SECS", &mut config.token.safety_margin_seconds)?;
    override_parsed("TETHER_TOKEN_RETRY_SECS", &mut config.token.retry_after_failure_seconds)?;

    config.traffic_log.enabled = env_bool("TETHER_TRACE", config.traffic_log.enabled);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `TetherError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - A value fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TetherError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TetherError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TetherError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `TetherError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| InfraError::from(e).into()),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TetherError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(TetherError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./tether.{json,toml}`,
///    `./config.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("tether.json"),
        dir.join("tether.toml"),
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `TetherError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| TetherError::Config(format!("Missing required environment variable: {key}")))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Replace `target` with the parsed value of `key`, if set.
fn override_parsed<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = env_opt(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| TetherError::Config(format!("Invalid value for {key}: {e}")))?;
    }
    Ok(())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
