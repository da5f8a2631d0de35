//! Job poller - turns a backend job handle into a progress stream

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tether_common::resilience::Backoff;
use tether_domain::{JobFailure, JobHandle, JobStatus, ProgressEvent, Result, TetherError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::policy::PollPolicy;
use super::ports::JobStatusSource;
use crate::stream::{EventSender, EventStream};
use crate::transport::JobHandleResolver;

/// Polls jobs through a [`JobStatusSource`].
#[derive(Clone)]
pub struct JobPoller {
    source: Arc<dyn JobStatusSource>,
    policy: PollPolicy,
}

impl JobPoller {
    pub fn new(source: Arc<dyn JobStatusSource>, policy: PollPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll `handle` until it reaches a terminal state.
    ///
    /// The stream delivers, per poll, a `Warnings` event when the poll
    /// returned any, then either `Status` or the terminal event. The
    /// finished job's payload is decoded into `T`.
    ///
    /// # Errors
    /// Returns `TetherError::InvalidInput` if the policy is invalid.
    pub fn poll<T>(
        &self,
        handle: JobHandle,
        cancel: CancellationToken,
    ) -> Result<EventStream<ProgressEvent<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.policy.validate()?;
        let source = Arc::clone(&self.source);
        let policy = self.policy;
        Ok(EventStream::spawn(cancel, move |tx| async move {
            poll_until_terminal(source.as_ref(), &handle, policy, tx).await;
        }))
    }

    /// Start the job through `resolver`, then poll the handle it returns.
    ///
    /// Warnings from starting the job come first; a failure to start is the
    /// stream's only (terminal) event.
    ///
    /// # Errors
    /// Returns `TetherError::InvalidInput` if the policy is invalid.
    pub fn start<T>(
        &self,
        resolver: Arc<dyn JobHandleResolver>,
        cancel: CancellationToken,
    ) -> Result<EventStream<ProgressEvent<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.policy.validate()?;
        let source = Arc::clone(&self.source);
        let policy = self.policy;
        Ok(EventStream::spawn(cancel, move |tx| async move {
            let (handle, warnings) = match resolver.resolve_job_handle().await {
                Ok(resolved) => resolved,
                Err(error) => {
                    tx.finish(ProgressEvent::Failed(error)).await;
                    return;
                }
            };
            if !warnings.is_empty() && !tx.emit(ProgressEvent::Warnings(warnings)).await {
                return;
            }
            poll_until_terminal(source.as_ref(), &handle, policy, tx).await;
        }))
    }
}

/// Stream the progress of `handle` through `source`.
///
/// # Errors
/// Returns `TetherError::InvalidInput` if `policy` is invalid.
pub fn poll_job<T>(
    source: Arc<dyn JobStatusSource>,
    handle: JobHandle,
    policy: PollPolicy,
    cancel: CancellationToken,
) -> Result<EventStream<ProgressEvent<T>>>
where
    T: DeserializeOwned + Send + 'static,
{
    JobPoller::new(source, policy).poll(handle, cancel)
}

enum Step {
    Continue(std::time::Duration),
    Stop,
}

#[instrument(skip_all, fields(job = %handle))]
async fn poll_until_terminal<T>(
    source: &dyn JobStatusSource,
    handle: &JobHandle,
    policy: PollPolicy,
    tx: EventSender<ProgressEvent<T>>,
) where
    T: DeserializeOwned + Send + 'static,
{
    let started = Instant::now();
    let deadline = policy.max_wait.map(|wait| started + wait);
    let mut backoff = Backoff::new(policy.interval, policy.max_backoff);
    let mut last_status: Option<JobStatus> = None;
    let mut polls: u32 = 0;

    loop {
        if tx.cancellation().is_cancelled() {
            debug!(polls, "polling cancelled");
            tx.finish(ProgressEvent::Failed(TetherError::Cancelled)).await;
            return;
        }
        if let (Some(deadline), Some(max_wait)) = (deadline, policy.max_wait) {
            if Instant::now() >= deadline {
                warn!(polls, ?max_wait, "job did not finish before the deadline");
                tx.finish(ProgressEvent::Failed(TetherError::DeadlineExceeded(max_wait))).await;
                return;
            }
        }

        polls += 1;
        let step = match source.fetch_status(handle).await {
            Ok(snapshot) => {
                backoff.on_success();
                if !snapshot.warnings.is_empty()
                    && !tx.emit(ProgressEvent::Warnings(snapshot.warnings.clone())).await
                {
                    return;
                }

                let status = clamp(last_status, snapshot.status);
                if status != snapshot.status {
                    debug!(reported = %snapshot.status, kept = %status, "ignoring status regression");
                }
                match status {
                    JobStatus::Finished => {
                        info!(polls, "job finished");
                        let event = match serde_json::from_value::<T>(snapshot.payload) {
                            Ok(value) => ProgressEvent::Succeeded(value),
                            Err(e) => ProgressEvent::Failed(TetherError::Decode(format!(
                                "finished job payload: {e}"
                            ))),
                        };
                        tx.finish(event).await;
                        Step::Stop
                    }
                    JobStatus::Failed => {
                        let failure = snapshot
                            .failure
                            .unwrap_or_else(|| JobFailure::new("job failed without a reason"));
                        warn!(polls, reason = %failure.reason, "job failed");
                        tx.finish(ProgressEvent::Failed(failure.into())).await;
                        Step::Stop
                    }
                    status => {
                        last_status = Some(status);
                        if tx.emit(ProgressEvent::Status(status)).await {
                            Step::Continue(policy.interval)
                        } else {
                            Step::Stop
                        }
                    }
                }
            }
            Err(error) if error.is_retryable() && backoff.failures() < policy.max_transport_retries => {
                let delay = backoff.on_failure();
                warn!(
                    error = %error,
                    attempt = backoff.failures(),
                    retry_in_ms = delay.as_millis() as u64,
                    "status request failed, retrying"
                );
                Step::Continue(delay)
            }
            Err(error) => {
                warn!(error = %error, polls, "giving up on job status");
                tx.finish(ProgressEvent::Failed(error)).await;
                Step::Stop
            }
        };

        let Step::Continue(delay) = step else {
            return;
        };
        let wake = deadline.map_or(Instant::now() + delay, |d| d.min(Instant::now() + delay));
        tokio::select! {
            biased;
            () = tx.cancellation().cancelled() => {}
            () = tokio::time::sleep_until(wake) => {}
        }
    }
}

/// Keep reported statuses from moving backwards.
fn clamp(last: Option<JobStatus>, observed: JobStatus) -> JobStatus {
    match last {
        Some(last) if observed.rank() < last.rank() => last,
        _ => observed,
    }
}
