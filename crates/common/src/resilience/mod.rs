//! Resilience patterns for recurring remote calls
//!
//! - **[`backoff`]**: doubling, capped delay that resets on success, shared by
//!   the job poller and the log tailer

pub mod backoff;

pub use backoff::Backoff;
