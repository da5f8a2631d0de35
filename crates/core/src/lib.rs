//! # Tether Core
//!
//! Coordination logic for talking to a platform API - no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - Job polling and log tailing behind one cancellable [`EventStream`]
//! - Session token ownership, background refresh and refresh-on-rejection
//! - Redacting traffic logging
//!
//! ## Architecture Principles
//! - Only depends on `tether-common` and `tether-domain`
//! - No HTTP client, file or platform code
//! - All external collaborators via port traits
//! - Transport decorators compose through [`HttpTransport`]

pub mod auth;
pub mod jobs;
pub mod stream;
pub mod traffic;
pub mod transport;

pub use auth::{
    AuthRetryTransport, RefreshHandle, RefreshSchedule, SchedulerExit, SessionManager,
    TokenExchanger, TokenRefreshScheduler,
};
pub use jobs::{poll_job, JobPoller, JobStatusSource, PollPolicy};
pub use stream::{stream_logs, EventSender, EventStream, LogSource, StreamEvent, StreamOptions};
pub use traffic::{TrafficLogSink, TrafficLogger};
pub use transport::{HttpTransport, JobHandleResolver};
