//! Diagnostic logging setup
//!
//! Installs a `tracing-subscriber` formatter filtered by `TETHER_LOG`
//! (falling back to the given default directive, then `info`). Traffic
//! output from [`TracingTrafficSink`](crate::logging::TracingTrafficSink)
//! is enabled with a `tether::traffic=info` directive.

use tether_domain::{Result, TetherError};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "TETHER_LOG";

/// Output format for diagnostic logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter from `TETHER_LOG`, or `default_directive` when unset or invalid.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, writing to stderr.
///
/// Calling it again once a subscriber is installed is a no-op.
///
/// # Errors
/// Never fails for an already-installed subscriber; returns
/// `TetherError::Internal` only if the subscriber could not be built.
pub fn init_tracing(default_directive: &str, format: LogFormat) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    match installed {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("already") => Ok(()),
        Err(e) => Err(TetherError::Internal(format!("failed to install tracing subscriber: {e}"))),
    }
}
