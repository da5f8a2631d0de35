//! Request/response transport boundary

pub mod ports;

pub use ports::{HttpTransport, JobHandleResolver};
