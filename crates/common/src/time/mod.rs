//! Time utilities and abstractions
//!
//! - **[`clock`]**: wall-clock reads and "fire after" timers behind a trait
//! - Manual clock for tests lives in [`crate::testing`]

pub mod clock;

pub use clock::{duration_until, Clock, SystemClock};
