//! Asynchronous backend jobs: handles, statuses and poll snapshots

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use super::warnings::Warnings;
use crate::errors::{Result, TetherError};
use crate::impl_wire_status_conversions;

/// Opaque handle to backend work started by an earlier API call.
///
/// Immutable once issued. Usually the job URL returned in a `Location`
/// header, but any non-empty identifier is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    /// Create a handle, rejecting empty or whitespace-only identifiers.
    ///
    /// # Errors
    /// Returns `TetherError::InvalidInput` for an empty handle.
    pub fn new(handle: impl Into<String>) -> Result<Self> {
        let handle = handle.into();
        if handle.trim().is_empty() {
            return Err(TetherError::InvalidInput("job handle must not be empty".into()));
        }
        Ok(Self(handle))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the handle as an absolute URL, if it is one.
    pub fn as_url(&self) -> Option<Url> {
        Url::parse(&self.0).ok()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a backend job.
///
/// Monotonic per job: `Queued` < `Processing` < terminal. Once `Finished` or
/// `Failed` is observed no further transition is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Finished,
    Failed,
}

impl_wire_status_conversions!(JobStatus {
    Queued => "queued" | "pending" | "awaiting_upload",
    Processing => "processing" | "polling" | "staging" | "in_progress",
    Finished => "finished" | "complete" | "completed" | "succeeded" | "staged" | "ready",
    Failed => "failed" | "expired",
});

impl JobStatus {
    /// Whether no further transition can occur from this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Position in the lifecycle; terminal states share the highest rank.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Processing => 1,
            Self::Finished | Self::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the monotonic lifecycle.
    pub const fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

/// Failure detail reported by the backend for a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

impl JobFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into(), code: None }
    }

    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

impl From<JobFailure> for TetherError {
    fn from(failure: JobFailure) -> Self {
        Self::JobFailed { reason: failure.reason, code: failure.code }
    }
}

/// Everything a single status request told us about a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Warnings returned by this particular status request.
    pub warnings: Warnings,
    /// Present when the backend reported why the job failed.
    pub failure: Option<JobFailure>,
    /// Raw job document; handed to the caller on success.
    pub payload: serde_json::Value,
}

impl JobSnapshot {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            warnings: Warnings::new(),
            failure: None,
            payload: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Warnings) -> Self {
        self.warnings = warnings;
        self
    }

    #[must_use]
    pub fn with_failure(mut self, failure: JobFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}
