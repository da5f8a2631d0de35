//! Port interfaces for observing backend jobs

use std::sync::Arc;

use async_trait::async_trait;
use tether_domain::{JobHandle, JobSnapshot, Result};

/// Anything that can issue a status request for a job handle.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Fetch the current state of the job behind `handle`.
    ///
    /// Transport failures are errors; a job the backend reports as failed is
    /// an `Ok` snapshot with `JobStatus::Failed`.
    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobSnapshot>;
}

#[async_trait]
impl<S: JobStatusSource + ?Sized> JobStatusSource for Arc<S> {
    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobSnapshot> {
        (**self).fetch_status(handle).await
    }
}
