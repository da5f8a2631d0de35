//! Event streaming for long-running operations
//!
//! Jobs and log tails are both exposed as an [`EventStream`]: an ordered
//! sequence of tagged events with an explicit cancel, backed by a producer
//! that blocks while the consumer has not taken the previous event.

pub mod event_stream;
pub mod logs;
pub mod ports;

pub use event_stream::{EventSender, EventStream, StreamEvent};
pub use logs::{stream_logs, StreamOptions};
pub use ports::LogSource;
