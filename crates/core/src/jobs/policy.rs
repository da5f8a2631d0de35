//! Polling interval policy

use std::time::Duration;

use tether_domain::config::PollingConfig;
use tether_domain::{Result, TetherError};

/// How often and for how long a job is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Nominal wait between polls.
    pub interval: Duration,
    /// Overall deadline; `None` polls until a terminal state or cancellation.
    pub max_wait: Option<Duration>,
    /// Consecutive transport failures tolerated before giving up.
    pub max_transport_retries: u32,
    /// Cap for the escalated wait after transport failures.
    pub max_backoff: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration) -> Self {
        Self { interval, ..Self::from(&PollingConfig::default()) }
    }

    /// A zero `max_wait` waits indefinitely.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = (!max_wait.is_zero()).then_some(max_wait);
        self
    }

    #[must_use]
    pub fn with_max_transport_retries(mut self, retries: u32) -> Self {
        self.max_transport_retries = retries;
        self
    }

    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// # Errors
    /// Returns `TetherError::InvalidInput` for a zero interval.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(TetherError::InvalidInput("polling interval must be positive".into()));
        }
        Ok(())
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_wait: config.max_wait(),
            max_transport_retries: config.max_transport_retries,
            max_backoff: config.max_backoff(),
        }
    }
}
