//! Redacted diagnostic output of HTTP traffic

pub mod logger;
pub mod ports;

pub use logger::TrafficLogger;
pub use ports::TrafficLogSink;
