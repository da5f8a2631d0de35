//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_TIMEOUT_SECS, DEFAULT_LOG_IDLE_INTERVAL_MS, DEFAULT_LOG_MAX_BACKOFF_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_MAX_BACKOFF_MS, DEFAULT_POLL_MAX_TRANSPORT_RETRIES,
    DEFAULT_TOKEN_RETRY_AFTER_FAILURE_SECS, DEFAULT_TOKEN_SAFETY_MARGIN_SECS,
};
use crate::errors::{Result, TetherError};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub token: TokenConfig,
    pub streaming: StreamingConfig,
    pub traffic_log: TrafficLogConfig,
}

/// Remote API endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Authorization server; refresh exchanges go to `{auth_url}/oauth/token`.
    pub auth_url: String,
    /// Log cache endpoint used for tailing application logs.
    pub log_url: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

/// Job polling policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Zero waits indefinitely (still cancellable).
    pub max_wait_seconds: u64,
    pub max_transport_retries: u32,
    pub max_backoff_ms: u64,
}

/// Background token refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Refresh this long before the access token expires.
    pub safety_margin_seconds: u64,
    /// Delay before the next attempt after a failed refresh.
    pub retry_after_failure_seconds: u64,
}

/// Log tailing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Wait between reads that returned no new lines.
    pub idle_interval_ms: u64,
    pub max_backoff_ms: u64,
}

/// Request/response tracing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficLogConfig {
    pub enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com".to_string(),
            auth_url: "https://login.example.com".to_string(),
            log_url: "https://log-cache.example.com".to_string(),
            client_id: "cf".to_string(),
            client_secret: String::new(),
            timeout_seconds: DEFAULT_API_TIMEOUT_SECS,
            user_agent: concat!("tether/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_wait_seconds: 0,
            max_transport_retries: DEFAULT_POLL_MAX_TRANSPORT_RETRIES,
            max_backoff_ms: DEFAULT_POLL_MAX_BACKOFF_MS,
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            safety_margin_seconds: DEFAULT_TOKEN_SAFETY_MARGIN_SECS,
            retry_after_failure_seconds: DEFAULT_TOKEN_RETRY_AFTER_FAILURE_SECS,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: DEFAULT_LOG_IDLE_INTERVAL_MS,
            max_backoff_ms: DEFAULT_LOG_MAX_BACKOFF_MS,
        }
    }
}

impl ApiConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl PollingConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// `None` when polling may continue indefinitely.
    pub const fn max_wait(&self) -> Option<Duration> {
        if self.max_wait_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.max_wait_seconds))
        }
    }

    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl TokenConfig {
    pub const fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_seconds)
    }

    pub const fn retry_after_failure(&self) -> Duration {
        Duration::from_secs(self.retry_after_failure_seconds)
    }
}

impl StreamingConfig {
    pub const fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Config {
    /// Reject values that would make the runtime misbehave.
    ///
    /// # Errors
    /// Returns `TetherError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(TetherError::Config(format!("invalid api.base_url: {}", self.api.base_url)));
        }
        if url::Url::parse(&self.api.auth_url).is_err() {
            return Err(TetherError::Config(format!("invalid api.auth_url: {}", self.api.auth_url)));
        }
        if url::Url::parse(&self.api.log_url).is_err() {
            return Err(TetherError::Config(format!("invalid api.log_url: {}", self.api.log_url)));
        }
        if self.api.timeout_seconds == 0 {
            return Err(TetherError::Config("api.timeout_seconds must be positive".into()));
        }
        if self.polling.interval_ms == 0 {
            return Err(TetherError::Config("polling.interval_ms must be positive".into()));
        }
        if self.polling.max_backoff_ms < self.polling.interval_ms {
            return Err(TetherError::Config(
                "polling.max_backoff_ms must be at least polling.interval_ms".into(),
            ));
        }
        if self.token.retry_after_failure_seconds == 0 {
            return Err(TetherError::Config(
                "token.retry_after_failure_seconds must be positive".into(),
            ));
        }
        if self.streaming.idle_interval_ms == 0 {
            return Err(TetherError::Config("streaming.idle_interval_ms must be positive".into()));
        }
        Ok(())
    }
}
