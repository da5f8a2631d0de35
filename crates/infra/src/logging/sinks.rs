//! Traffic log sinks
//!
//! [`WriterTrafficSink`] renders the familiar text layout:
//!
//! ```text
//! REQUEST: [2024-01-01T00:00:00Z]
//! GET /v3/apps?names=web HTTP/1.1
//! Host: api.example.com
//! Authorization: [PRIVATE DATA HIDDEN]
//!
//! RESPONSE: [2024-01-01T00:00:01Z]
//! HTTP/1.1 200 OK
//! Content-Type: application/json
//! {
//!   "resources": []
//! }
//! ```
//!
//! [`TracingTrafficSink`] emits the same lines as `tracing` events under the
//! `tether::traffic` target.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use tether_core::traffic::TrafficLogSink;
use tether_domain::{Result, TetherError};
use tracing::{info, warn};

pub const TRAFFIC_TARGET: &str = "tether::traffic";

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn io_error(e: &std::io::Error) -> TetherError {
    TetherError::LoggingSink(e.to_string())
}

/// Writes traffic as plain text, one blank line after each section.
pub struct WriterTrafficSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> WriterTrafficSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn line(&self, text: &str) -> Result<()> {
        writeln!(self.out.lock(), "{text}").map_err(|e| io_error(&e))
    }
}

impl<W: Write + Send> TrafficLogSink for WriterTrafficSink<W> {
    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn display_type(&self, name: &str, time: DateTime<Utc>) -> Result<()> {
        self.line(&format!("{name}: [{}]", timestamp(time)))
    }

    fn display_request_header(&self, method: &str, uri: &str, protocol: &str) -> Result<()> {
        self.line(&format!("{method} {uri} {protocol}"))
    }

    fn display_host(&self, host: &str) -> Result<()> {
        self.line(&format!("Host: {host}"))
    }

    fn display_header(&self, name: &str, value: &str) -> Result<()> {
        self.line(&format!("{name}: {value}"))
    }

    fn display_body(&self, body: &[u8]) -> Result<()> {
        let mut out = self.out.lock();
        out.write_all(body).and_then(|()| writeln!(out)).map_err(|e| io_error(&e))
    }

    fn display_json_body(&self, body: &str) -> Result<()> {
        self.line(body)
    }

    fn display_response_header(&self, protocol: &str, status: &str) -> Result<()> {
        self.line(&format!("{protocol} {status}"))
    }

    fn display_error(&self, error: &TetherError) -> Result<()> {
        self.line(&format!("ERROR: {error}"))
    }

    fn handle_internal_error(&self, error: &TetherError) {
        warn!(target: TRAFFIC_TARGET, error = %error, "failed to write traffic log");
    }

    fn stop(&self) -> Result<()> {
        let mut out = self.out.lock();
        writeln!(out).and_then(|()| out.flush()).map_err(|e| io_error(&e))
    }
}

/// Emits each displayed line as an `info` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTrafficSink;

impl TrafficLogSink for TracingTrafficSink {
    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn display_type(&self, name: &str, time: DateTime<Utc>) -> Result<()> {
        info!(target: TRAFFIC_TARGET, "{name}: [{}]", timestamp(time));
        Ok(())
    }

    fn display_request_header(&self, method: &str, uri: &str, protocol: &str) -> Result<()> {
        info!(target: TRAFFIC_TARGET, "{method} {uri} {protocol}");
        Ok(())
    }

    fn display_host(&self, host: &str) -> Result<()> {
        info!(target: TRAFFIC_TARGET, "Host: {host}");
        Ok(())
    }

    fn display_header(&self, name: &str, value: &str) -> Result<()> {
        info!(target: TRAFFIC_TARGET, "{name}: {value}");
        Ok(())
    }

    fn display_body(&self, body: &[u8]) -> Result<()> {
        info!(target: TRAFFIC_TARGET, "{}", String::from_utf8_lossy(body));
        Ok(())
    }

    fn display_json_body(&self, body: &str) -> Result<()> {
        info!(target: TRAFFIC_TARGET, "{body}");
        Ok(())
    }

    fn display_response_header(&self, protocol: &str, status: &str) -> Result<()> {
        info!(target: TRAFFIC_TARGET, "{protocol} {status}");
        Ok(())
    }

    fn display_error(&self, error: &TetherError) -> Result<()> {
        info!(target: TRAFFIC_TARGET, "ERROR: {error}");
        Ok(())
    }

    fn handle_internal_error(&self, error: &TetherError) {
        warn!(target: TRAFFIC_TARGET, error = %error, "traffic log sink failed");
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_writer_layout() {
        let sink = WriterTrafficSink::new(Vec::new());
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        sink.start().unwrap();
        sink.display_type("REQUEST", time).unwrap();
        sink.display_request_header("GET", "/v3/apps", "HTTP/1.1").unwrap();
        sink.display_host("api.example.com").unwrap();
        sink.display_header("Authorization", "[PRIVATE DATA HIDDEN]").unwrap();
        sink.display_body(b"raw").unwrap();
        sink.stop().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "REQUEST: [2024-01-01T00:00:00Z]\nGET /v3/apps HTTP/1.1\nHost: api.example.com\n\
             Authorization: [PRIVATE DATA HIDDEN]\nraw\n\n"
        );
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_a_sink_error() {
        let sink = WriterTrafficSink::new(BrokenPipe);
        let err = sink.display_host("api.example.com").unwrap_err();
        assert!(matches!(err, TetherError::LoggingSink(_)));
    }
}
