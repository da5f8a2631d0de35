//! Events delivered by job and log streams

use crate::errors::TetherError;
use crate::types::job::JobStatus;
use crate::types::logs::LogLine;
use crate::types::warnings::Warnings;

/// Progress of a polled job, in poll order.
///
/// `Succeeded` and `Failed` are terminal: exactly one of them is the last
/// event a job stream delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent<T> {
    /// A poll observed a non-terminal status.
    Status(JobStatus),
    /// Warnings returned by one poll, delivered as soon as they are seen.
    Warnings(Warnings),
    Succeeded(T),
    Failed(TetherError),
}

impl<T> ProgressEvent<T> {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }
}

/// Item of a (potentially endless) log tailing stream.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Line(LogLine),
    /// A read failed transiently; tailing continues.
    Interrupted(TetherError),
    /// Tailing stopped for good. Always the last event.
    Failed(TetherError),
}

impl LogEvent {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
