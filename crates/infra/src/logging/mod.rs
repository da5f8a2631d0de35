//! Traffic log sink implementations

pub mod sinks;

pub use sinks::{TracingTrafficSink, WriterTrafficSink, TRAFFIC_TARGET};
