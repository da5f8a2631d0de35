//! Manually driven clock for deterministic tests
//!
//! # Examples
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use std::time::Duration;
//!
//! use tether_common::testing::ManualClock;
//! use tether_common::time::Clock;
//!
//! let clock = ManualClock::new();
//! let timer = clock.after(Duration::from_secs(60));
//! clock.advance(Duration::from_secs(60));
//! timer.await;
//! assert_eq!(clock.requested_delays(), vec![Duration::from_secs(60)]);
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

use crate::time::Clock;

#[derive(Debug)]
struct PendingTimer {
    deadline: DateTime<Utc>,
    fire: oneshot::Sender<()>,
}

#[derive(Debug)]
struct State {
    now: DateTime<Utc>,
    pending: Vec<PendingTimer>,
    requested: Vec<Duration>,
}

/// Clock whose time only moves when a test says so.
///
/// Every `after` call is recorded; its future completes once the clock has
/// been advanced to the deadline or [`fire_all`](Self::fire_all) is called.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<State>>,
    registered: Arc<Notify>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Clock frozen at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default())
    }

    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State { now, pending: Vec::new(), requested: Vec::new() })),
            registered: Arc::new(Notify::new()),
        }
    }

    /// Move time forward and fire every timer whose deadline has passed.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock();
        state.now = shifted(state.now, by);
        let now = state.now;
        let (due, waiting): (Vec<_>, Vec<_>) =
            state.pending.drain(..).partition(|timer| timer.deadline <= now);
        state.pending = waiting;
        drop(state);
        for timer in due {
            let _ = timer.fire.send(());
        }
    }

    /// Fire every pending timer without moving time.
    pub fn fire_all(&self) {
        let due: Vec<_> = self.state.lock().pending.drain(..).collect();
        for timer in due {
            let _ = timer.fire.send(());
        }
    }

    /// Number of timers still waiting (dropped futures included).
    pub fn pending_timers(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Every delay passed to `after`, in call order.
    pub fn requested_delays(&self) -> Vec<Duration> {
        self.state.lock().requested.clone()
    }

    /// Wait until at least `count` timers have been requested in total.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.registered.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.state.lock().requested.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

fn shifted(from: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    fn after(&self, delay: Duration) -> BoxFuture<'static, ()> {
        let (fire, fired) = oneshot::channel();
        {
            let mut state = self.state.lock();
            state.requested.push(delay);
            let deadline = shifted(state.now, delay);
            if deadline <= state.now {
                let _ = fire.send(());
            } else {
                state.pending.push(PendingTimer { deadline, fire });
            }
        }
        self.registered.notify_waiters();

        Box::pin(async move {
            if fired.await.is_err() {
                // Clock dropped with the timer pending: never fire.
                std::future::pending::<()>().await;
            }
        })
    }
}
