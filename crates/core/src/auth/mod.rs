//! Session token lifecycle
//!
//! [`SessionManager`] owns the shared token; [`TokenRefreshScheduler`] renews
//! it ahead of expiry and [`AuthRetryTransport`] renews it when a request is
//! rejected. Both go through the same single-flight, version-checked refresh.

pub mod ports;
pub mod retry;
pub mod scheduler;
pub mod session;

pub use ports::TokenExchanger;
pub use retry::AuthRetryTransport;
pub use scheduler::{RefreshHandle, RefreshSchedule, SchedulerExit, TokenRefreshScheduler};
pub use session::{SessionManager, SessionState};
