//! Escalating delay between attempts of a recurring operation
//!
//! Polling and tailing loops wait a nominal interval between iterations. A
//! transient failure doubles the wait (capped); the next success drops it
//! straight back to nominal.

use std::time::Duration;

/// Doubling, capped backoff that resets on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    /// `max` below `base` is raised to `base`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max: max.max(base), failures: 0 }
    }

    /// Delay to use now: nominal without failures, escalated otherwise.
    pub fn current(&self) -> Duration {
        let shift = self.failures.min(31);
        let factor = 1u32 << shift;
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Record a failure and return the escalated delay.
    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current()
    }

    /// Record a success and return the nominal delay.
    pub fn on_success(&mut self) -> Duration {
        self.failures = 0;
        self.base
    }

    /// Consecutive failures since the last success.
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    pub const fn base(&self) -> Duration {
        self.base
    }
}
