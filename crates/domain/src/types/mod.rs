//! Domain types and models

pub mod events;
pub mod http;
pub mod job;
pub mod logs;
pub mod token;
pub mod warnings;

pub use events::{LogEvent, ProgressEvent};
pub use http::{ApiRequest, ApiResponse, Headers, Method};
pub use job::{JobFailure, JobHandle, JobSnapshot, JobStatus};
pub use logs::{LogKind, LogLine};
pub use token::{SessionToken, TokenGrant};
pub use warnings::{Outcome, Warnings};
