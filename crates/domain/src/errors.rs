//! Error types used throughout the application

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Tether
///
/// Every operation either succeeds (alongside its `Warnings`) or fails with one
/// of these classified errors. `JobFailed` is reserved for failures reported by
/// the remote operation itself; anything that prevented us from *observing* the
/// operation is a `Transport` or `Status` error.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum TetherError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Job failed: {reason}")]
    JobFailed { reason: String, code: Option<i64> },

    #[error("Authentication expired: {0}")]
    AuthenticationExpired(String),

    #[error("Refresh credential rejected: {0}")]
    RefreshCredentialInvalid(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Logging sink error: {0}")]
    LoggingSink(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse categories of [`TetherError`] for retry decisions and log labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network failures, timeouts, 5xx and 429 responses - retryable
    Transport,
    /// The remote job reported failure - never retried
    Backend,
    /// Access token rejected - refresh then retry once
    Authentication,
    /// Refresh credential rejected - fatal for the session
    Credential,
    /// Caller cancelled or the deadline fired
    Cancellation,
    /// The diagnostic sink failed - always swallowed
    Logging,
    /// Caller or configuration mistakes - non-retryable
    Client,
    /// Bugs and unexpected payloads
    Internal,
}

impl TetherError {
    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Status { status, .. } if *status == 429 || *status >= 500 => {
                ErrorCategory::Transport
            }
            Self::Status { .. } | Self::InvalidInput(_) | Self::Config(_) => ErrorCategory::Client,
            Self::JobFailed { .. } => ErrorCategory::Backend,
            Self::AuthenticationExpired(_) => ErrorCategory::Authentication,
            Self::RefreshCredentialInvalid(_) => ErrorCategory::Credential,
            Self::Cancelled | Self::DeadlineExceeded(_) => ErrorCategory::Cancellation,
            Self::LoggingSink(_) => ErrorCategory::Logging,
            Self::Decode(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this error is transient and the call may be retried locally
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    /// Stable label suitable for structured log fields
    pub fn label(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::JobFailed { .. } => "job_failed",
            Self::AuthenticationExpired(_) => "authentication_expired",
            Self::RefreshCredentialInvalid(_) => "refresh_credential_invalid",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::LoggingSink(_) => "logging_sink",
            Self::InvalidInput(_) => "invalid_input",
            Self::Config(_) => "config",
            Self::Decode(_) => "decode",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for Tether operations
pub type Result<T> = std::result::Result<T, TetherError>;
