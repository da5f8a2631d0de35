//! Clock abstraction for timer-driven background work
//!
//! Code that sleeps until a wall-clock instant (token refresh ahead of
//! expiry) asks a [`Clock`] for both the current time and a "fire after"
//! signal, so tests can drive it without real time passing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

/// Source of the current time and of delayed wake-ups.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Future that completes once `delay` has elapsed.
    ///
    /// A zero delay completes on first poll.
    fn after(&self, delay: Duration) -> BoxFuture<'static, ()>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn after(&self, delay: Duration) -> BoxFuture<'static, ()> {
        (**self).after(delay)
    }
}

/// Real clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn after(&self, delay: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(delay))
    }
}

/// Time left until `deadline`, clamped at zero when it already passed.
pub fn duration_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}
