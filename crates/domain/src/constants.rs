//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

/// Literal substituted for any redacted value in diagnostic output.
pub const REDACTION_MARKER: &str = "[PRIVATE DATA HIDDEN]";

/// Response header carrying URL-encoded, comma separated advisory warnings.
pub const WARNINGS_HEADER: &str = "X-Cf-Warnings";

/// Protocol label used when displaying outbound requests.
pub const DEFAULT_PROTOCOL: &str = "HTTP/1.1";

// Polling defaults
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_POLL_MAX_TRANSPORT_RETRIES: u32 = 3;
pub const DEFAULT_POLL_MAX_BACKOFF_MS: u64 = 30_000;

// Token refresh defaults
pub const DEFAULT_TOKEN_SAFETY_MARGIN_SECS: u64 = 300;
pub const DEFAULT_TOKEN_RETRY_AFTER_FAILURE_SECS: u64 = 60;

// Log tailing defaults
pub const DEFAULT_LOG_IDLE_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_LOG_MAX_BACKOFF_MS: u64 = 16_000;

// API defaults
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
