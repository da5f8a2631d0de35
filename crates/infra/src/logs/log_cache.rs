//! Log tailing against a log-cache style read API
//!
//! `GET {log_url}/api/v1/read/{source_id}?start_time={ns}&envelope_types=LOG`
//! returns envelopes in timestamp order:
//!
//! ```json
//! {"envelopes": {"batch": [{
//!     "timestamp": "1700000000000000000",
//!     "source_id": "app-guid",
//!     "instance_id": "0",
//!     "tags": {"source_type": "APP/PROC/WEB"},
//!     "log": {"payload": "aGVsbG8=", "type": "OUT"}
//! }]}}
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tether_core::stream::LogSource;
use tether_core::transport::HttpTransport;
use tether_domain::{ApiRequest, LogKind, LogLine, Result, TetherError};
use tracing::{debug, trace};
use url::Url;

use crate::api::errors::map_status_error;

const PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Default, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    envelopes: Batch,
}

#[derive(Debug, Default, Deserialize)]
struct Batch {
    #[serde(default)]
    batch: Vec<Envelope>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    /// Nanoseconds since the epoch, as a decimal string.
    timestamp: String,
    #[serde(default)]
    instance_id: String,
    #[serde(default)]
    tags: HashMap<String, String>,
    log: Option<LogPayload>,
}

#[derive(Debug, Deserialize)]
struct LogPayload {
    #[serde(default)]
    payload: String,
    #[serde(default, rename = "type")]
    kind: String,
}

/// Tails one source's log lines.
///
/// The cursor is the timestamp after the last delivered line. A stream that
/// is restarted with [`resume_from`](Self::resume_from) set to the last line
/// it delivered may see lines sharing that timestamp again, but loses none.
pub struct LogCacheSource {
    transport: Arc<dyn HttpTransport>,
    read_url: Url,
    cursor_ns: i64,
}

impl LogCacheSource {
    /// Source starting at the current time.
    ///
    /// # Errors
    /// `TetherError::Config` when `log_url` cannot be joined with the source id.
    pub fn new(transport: Arc<dyn HttpTransport>, log_url: &str, source_id: &str) -> Result<Self> {
        let read_url = Url::parse(log_url)
            .and_then(|base| base.join(&format!("/api/v1/read/{}", urlencoding::encode(source_id))))
            .map_err(|e| TetherError::Config(format!("invalid log url {log_url}: {e}")))?;
        Ok(Self { transport, read_url, cursor_ns: Utc::now().timestamp_nanos_opt().unwrap_or(0) })
    }

    /// Start reading at `timestamp` (inclusive).
    #[must_use]
    pub fn resume_from(mut self, timestamp: DateTime<Utc>) -> Self {
        self.cursor_ns = timestamp.timestamp_nanos_opt().unwrap_or(0);
        self
    }

    /// Timestamp the next read starts from, in nanoseconds.
    pub const fn cursor(&self) -> i64 {
        self.cursor_ns
    }

    fn request(&self) -> ApiRequest {
        let mut url = self.read_url.clone();
        url.query_pairs_mut()
            .append_pair("start_time", &self.cursor_ns.to_string())
            .append_pair("envelope_types", "LOG")
            .append_pair("limit", &PAGE_LIMIT.to_string());
        ApiRequest::get(url)
    }
}

#[async_trait]
impl LogSource for LogCacheSource {
    async fn read(&mut self) -> Result<Vec<LogLine>> {
        let request = self.request();
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(map_status_error(&response, self.read_url.path()));
        }
        let page: ReadResponse = serde_json::from_slice(&response.body)
            .map_err(|e| TetherError::Decode(format!("invalid log envelope batch: {e}")))?;

        let mut lines = Vec::with_capacity(page.envelopes.batch.len());
        for envelope in page.envelopes.batch {
            let Ok(nanos) = envelope.timestamp.parse::<i64>() else {
                debug!(timestamp = %envelope.timestamp, "skipping envelope with bad timestamp");
                continue;
            };
            self.cursor_ns = self.cursor_ns.max(nanos.saturating_add(1));
            if let Some(line) = to_line(nanos, envelope) {
                lines.push(line);
            }
        }
        trace!(count = lines.len(), cursor = self.cursor_ns, "log batch read");
        Ok(lines)
    }
}

fn to_line(nanos: i64, envelope: Envelope) -> Option<LogLine> {
    let log = envelope.log?;
    let message = match STANDARD.decode(log.payload.as_bytes()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => log.payload,
    };
    let kind = log.kind.parse().unwrap_or(LogKind::Out);
    let source_type = envelope.tags.get("source_type").cloned().unwrap_or_default();
    Some(
        LogLine::new(DateTime::from_timestamp_nanos(nanos), message)
            .from_source(source_type, envelope.instance_id)
            .with_kind(kind),
    )
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::HttpClient;

    fn source(server: &MockServer) -> LogCacheSource {
        let transport: Arc<dyn HttpTransport> = Arc::new(HttpClient::new().unwrap());
        LogCacheSource::new(transport, &server.uri(), "app-guid")
            .unwrap()
            .resume_from(DateTime::from_timestamp_nanos(1_000))
    }

    fn envelope(ts: i64, text: &str, kind: &str) -> serde_json::Value {
        serde_json::json!({
            "timestamp": ts.to_string(),
            "source_id": "app-guid",
            "instance_id": "0",
            "tags": {"source_type": "APP/PROC/WEB"},
            "log": {"payload": STANDARD.encode(text), "type": kind}
        })
    }

    #[tokio::test]
    async fn test_lines_are_decoded_and_cursor_advances() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/read/app-guid"))
            .and(query_param("start_time", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "envelopes": {"batch": [
                    envelope(1_500, "hello", "OUT"),
                    {"timestamp": "1600", "tags": {}},
                    envelope(2_000, "boom", "ERR"),
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut source = source(&server);
        let lines = source.read().await.unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "hello");
        assert_eq!(lines[0].source_type, "APP/PROC/WEB");
        assert_eq!(lines[1].kind, LogKind::Err);
        assert_eq!(lines[1].timestamp, DateTime::from_timestamp_nanos(2_000));
        assert_eq!(source.cursor(), 2_001);
    }

    #[tokio::test]
    async fn test_empty_batch_keeps_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let mut source = source(&server);
        assert!(source.read().await.unwrap().is_empty());
        assert_eq!(source.cursor(), 1_000);
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let transport: Arc<dyn HttpTransport> =
            Arc::new(HttpClient::builder().max_attempts(1).build().unwrap());
        let mut source = LogCacheSource::new(transport, &server.uri(), "app-guid").unwrap();

        let err = source.read().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_not_found_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let mut source = source(&server);
        let err = source.read().await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
