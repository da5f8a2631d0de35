//! Testing utilities and helpers
//!
//! - **[`time`]**: manually driven [`Clock`](crate::time::Clock) for timer
//!   tests

pub mod time;

pub use time::ManualClock;
