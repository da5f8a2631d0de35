//! Job polling
//!
//! A started backend job is observed by repeatedly fetching its status until
//! it finishes, fails, runs out of time or is cancelled.

pub mod poller;
pub mod policy;
pub mod ports;

pub use poller::{poll_job, JobPoller};
pub use policy::PollPolicy;
pub use ports::JobStatusSource;
