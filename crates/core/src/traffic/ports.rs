//! Port interfaces for diagnostic traffic output

use chrono::{DateTime, Utc};
use tether_domain::{Result, TetherError};

/// Display surface for logged HTTP traffic.
///
/// Every value handed to a sink is already redacted. Each request and each
/// response is bracketed by [`start`](Self::start) and [`stop`](Self::stop).
/// Failures are returned to the logger, which reports them through
/// [`handle_internal_error`](Self::handle_internal_error) and never lets them
/// reach the request being observed.
pub trait TrafficLogSink: Send + Sync {
    fn start(&self) -> Result<()>;

    /// Section heading, `REQUEST` or `RESPONSE`, with the time it was logged.
    fn display_type(&self, name: &str, time: DateTime<Utc>) -> Result<()>;

    fn display_request_header(&self, method: &str, uri: &str, protocol: &str) -> Result<()>;

    fn display_host(&self, host: &str) -> Result<()>;

    fn display_header(&self, name: &str, value: &str) -> Result<()>;

    /// Body of a type that is not rendered, shown as is.
    fn display_body(&self, body: &[u8]) -> Result<()>;

    /// Pretty-printed, redacted JSON document.
    fn display_json_body(&self, body: &str) -> Result<()>;

    fn display_response_header(&self, protocol: &str, status: &str) -> Result<()>;

    /// Transport failure shown in place of a response.
    fn display_error(&self, error: &TetherError) -> Result<()>;

    /// Report a failure of this sink. Must not fail itself.
    fn handle_internal_error(&self, error: &TetherError);

    fn stop(&self) -> Result<()>;
}

impl<S: TrafficLogSink + ?Sized> TrafficLogSink for std::sync::Arc<S> {
    fn start(&self) -> Result<()> {
        (**self).start()
    }

    fn display_type(&self, name: &str, time: DateTime<Utc>) -> Result<()> {
        (**self).display_type(name, time)
    }

    fn display_request_header(&self, method: &str, uri: &str, protocol: &str) -> Result<()> {
        (**self).display_request_header(method, uri, protocol)
    }

    fn display_host(&self, host: &str) -> Result<()> {
        (**self).display_host(host)
    }

    fn display_header(&self, name: &str, value: &str) -> Result<()> {
        (**self).display_header(name, value)
    }

    fn display_body(&self, body: &[u8]) -> Result<()> {
        (**self).display_body(body)
    }

    fn display_json_body(&self, body: &str) -> Result<()> {
        (**self).display_json_body(body)
    }

    fn display_response_header(&self, protocol: &str, status: &str) -> Result<()> {
        (**self).display_response_header(protocol, status)
    }

    fn display_error(&self, error: &TetherError) -> Result<()> {
        (**self).display_error(error)
    }

    fn handle_internal_error(&self, error: &TetherError) {
        (**self).handle_internal_error(error);
    }

    fn stop(&self) -> Result<()> {
        (**self).stop()
    }
}
