//! Background token refresh ahead of expiry

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tether_common::time::{duration_until, Clock};
use tether_domain::config::TokenConfig;
use tether_domain::{SessionToken, TetherError};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::session::SessionManager;

/// Timing of background refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    /// Refresh this long before the access token expires.
    pub safety_margin: Duration,
    /// Wait before retrying after a failed refresh.
    pub retry_after_failure: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self::from(&TokenConfig::default())
    }
}

impl From<&TokenConfig> for RefreshSchedule {
    fn from(config: &TokenConfig) -> Self {
        Self {
            safety_margin: config.safety_margin(),
            retry_after_failure: config.retry_after_failure(),
        }
    }
}

impl RefreshSchedule {
    /// Delay until `token` should be refreshed, zero if already due.
    pub fn delay_for(&self, token: &SessionToken, clock: &dyn Clock) -> Duration {
        duration_until(clock.now(), token.expires_at).saturating_sub(self.safety_margin)
    }
}

/// Why the scheduler stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerExit {
    /// The stop signal fired.
    Stopped,
    /// The refresh credential was rejected; the session cannot be renewed.
    CredentialRejected(TetherError),
}

/// Handle to a running scheduler.
///
/// Dropping the handle stops the scheduler.
#[derive(Debug)]
pub struct RefreshHandle {
    errors: mpsc::UnboundedReceiver<TetherError>,
    done: oneshot::Receiver<SchedulerExit>,
    stop: CancellationToken,
}

impl RefreshHandle {
    /// Next reported refresh failure; `None` once the scheduler exited and
    /// every report was read.
    pub async fn next_error(&mut self) -> Option<TetherError> {
        self.errors.recv().await
    }

    pub fn try_next_error(&mut self) -> Option<TetherError> {
        self.errors.try_recv().ok()
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Wait for the scheduler to exit.
    pub async fn done(&mut self) -> SchedulerExit {
        (&mut self.done).await.unwrap_or(SchedulerExit::Stopped)
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Keeps the session's access token valid in the background.
pub struct TokenRefreshScheduler {
    session: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
    schedule: RefreshSchedule,
}

impl TokenRefreshScheduler {
    pub fn new(session: Arc<SessionManager>, clock: Arc<dyn Clock>, schedule: RefreshSchedule) -> Self {
        Self { session, clock, schedule }
    }

    /// Spawn the refresh loop.
    ///
    /// The loop runs until `stop` fires (or the handle is dropped) or the
    /// refresh credential is rejected. Every other refresh failure is
    /// reported through the handle and retried after
    /// `retry_after_failure`, keeping the current token meanwhile.
    pub fn start(self, stop: CancellationToken) -> RefreshHandle {
        let stop = stop.child_token();
        let (errors_tx, errors) = mpsc::unbounded_channel();
        let (done_tx, done) = oneshot::channel();

        let task_stop = stop.clone();
        tokio::spawn(async move {
            let exit = self.run(&task_stop, &errors_tx).await;
            match &exit {
                SchedulerExit::Stopped => info!("token refresh scheduler stopped"),
                SchedulerExit::CredentialRejected(e) => {
                    error!(error = %e, "token refresh scheduler terminated");
                }
            }
            let _ = done_tx.send(exit);
        });

        RefreshHandle { errors, done, stop }
    }

    async fn run(
        &self,
        stop: &CancellationToken,
        errors: &mpsc::UnboundedSender<TetherError>,
    ) -> SchedulerExit {
        info!(margin_secs = self.schedule.safety_margin.as_secs(), "token refresh scheduler started");
        let mut updates = self.session.subscribe();
        let mut retry_in: Option<Duration> = None;

        loop {
            let current = updates.borrow_and_update().token.clone();
            let timer: BoxFuture<'static, ()> = match (&current, retry_in) {
                (None, _) => Box::pin(std::future::pending()),
                (Some(_), Some(delay)) => self.clock.after(delay),
                (Some(token), None) => {
                    let delay = self.schedule.delay_for(token, self.clock.as_ref());
                    debug!(version = token.version, delay_secs = delay.as_secs(), "next refresh scheduled");
                    self.clock.after(delay)
                }
            };

            tokio::select! {
                biased;
                () = stop.cancelled() => return SchedulerExit::Stopped,
                changed = updates.changed() => {
                    if changed.is_err() {
                        return SchedulerExit::Stopped;
                    }
                    // A newer token (or a logout) was published elsewhere.
                    retry_in = None;
                    continue;
                }
                () = timer => {}
            }

            match self.session.refresh().await {
                Ok(token) => {
                    debug!(version = token.version, "scheduled refresh succeeded");
                    retry_in = None;
                }
                Err(e @ TetherError::RefreshCredentialInvalid(_)) => {
                    let _ = errors.send(e.clone());
                    return SchedulerExit::CredentialRejected(e);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_secs = self.schedule.retry_after_failure.as_secs(),
                        "scheduled refresh failed, keeping current token"
                    );
                    let _ = errors.send(e);
                    retry_in = Some(self.schedule.retry_after_failure);
                }
            }
        }
    }
}
