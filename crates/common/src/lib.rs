//! Modular common utilities shared across Tether crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: redaction of credentials in diagnostic output (`privacy`)
//! - `runtime`: async infrastructure (`time`, `resilience`)
//! - `test-utils`: deterministic test doubles (`testing`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod privacy;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(feature = "test-utils")]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use privacy::{PrivacyError, PrivacyResult, RedactionPolicy, REDACTION_MARKER};
#[cfg(feature = "runtime")]
pub use resilience::Backoff;
#[cfg(feature = "runtime")]
pub use time::{Clock, SystemClock};
