//! Redacting request/response logger

use std::sync::Arc;

use async_trait::async_trait;
use tether_common::privacy::RedactionPolicy;
use tether_common::time::{Clock, SystemClock};
use tether_domain::{ApiRequest, ApiResponse, Headers, Result, TetherError};
use tracing::debug;
use url::Url;

use super::ports::TrafficLogSink;
use crate::transport::HttpTransport;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Transport decorator that writes every exchange to a [`TrafficLogSink`].
///
/// Headers are shown one line per value, sorted by name. Sensitive headers
/// are replaced by the redaction marker and redirect targets lose the values
/// of sensitive query parameters. JSON bodies are pretty-printed with
/// sensitive keys hidden, form bodies have the same keys hidden, anything
/// else is shown raw.
///
/// Logging only reads the request and response. Sink failures go to
/// [`TrafficLogSink::handle_internal_error`], at most once per request and
/// once per response, and never change the outcome of the request.
pub struct TrafficLogger<T, S> {
    inner: T,
    sink: S,
    policy: Arc<RedactionPolicy>,
    clock: Arc<dyn Clock>,
}

impl<T, S> TrafficLogger<T, S>
where
    T: HttpTransport,
    S: TrafficLogSink,
{
    pub fn new(inner: T, sink: S) -> Self {
        Self {
            inner,
            sink,
            policy: Arc::new(RedactionPolicy::default()),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<RedactionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn log_request(&self, request: &ApiRequest) {
        self.section(|sink| {
            sink.display_type("REQUEST", self.clock.now())?;
            let uri = request.request_uri();
            sink.display_request_header(
                request.method.as_str(),
                &self.policy.redact_redirect_target(&uri),
                request.protocol(),
            )?;
            if let Some(host) = host_of(&request.url) {
                sink.display_host(&host)?;
            }
            self.display_headers(&request.headers)?;
            if let Some(body) = &request.body {
                self.display_body(&request.headers, body)?;
            }
            Ok(())
        });
    }

    fn log_response(&self, response: &ApiResponse) {
        self.section(|sink| {
            sink.display_type("RESPONSE", self.clock.now())?;
            sink.display_response_header(&response.protocol, &response.status_line())?;
            self.display_headers(&response.headers)?;
            self.display_body(&response.headers, &response.body)
        });
    }

    fn log_error(&self, error: &TetherError) {
        self.section(|sink| {
            sink.display_type("RESPONSE", self.clock.now())?;
            sink.display_error(error)
        });
    }

    /// Run one bracketed section, reporting its first failure.
    fn section(&self, display: impl FnOnce(&S) -> Result<()>) {
        if let Err(e) = self.sink.start() {
            self.report(&e);
            return;
        }
        let shown = display(&self.sink);
        let stopped = self.sink.stop();
        if let Err(e) = shown.and(stopped) {
            self.report(&e);
        }
    }

    fn report(&self, error: &TetherError) {
        debug!(error = %error, "traffic log sink failed");
        self.sink.handle_internal_error(error);
    }

    fn display_headers(&self, headers: &Headers) -> Result<()> {
        let mut sorted: Vec<(&str, &str)> = headers.iter().collect();
        sorted.sort_by_cached_key(|(name, _)| name.to_ascii_lowercase());
        for (name, value) in sorted {
            self.sink.display_header(name, &self.policy.redact_header(name, value))?;
        }
        Ok(())
    }

    fn display_body(&self, headers: &Headers, body: &[u8]) -> Result<()> {
        if body.is_empty() {
            return Ok(());
        }
        match headers.content_type().as_deref() {
            Some(kind) if is_json(kind) => match self.policy.render_json_body(body) {
                Ok(rendered) => self.sink.display_json_body(&rendered),
                Err(e) => {
                    debug!(error = %e, "body declared as JSON did not parse, showing raw");
                    self.sink.display_body(body)
                }
            },
            Some(FORM_CONTENT_TYPE) => match std::str::from_utf8(body) {
                Ok(text) => self.sink.display_body(self.policy.redact_form_body(text).as_bytes()),
                Err(_) => self.sink.display_body(body),
            },
            _ => self.sink.display_body(body),
        }
    }
}

#[async_trait]
impl<T, S> HttpTransport for TrafficLogger<T, S>
where
    T: HttpTransport,
    S: TrafficLogSink,
{
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.log_request(&request);
        let result = self.inner.send(request).await;
        match &result {
            Ok(response) => self.log_response(response),
            Err(error) => self.log_error(error),
        }
        result
    }
}

fn is_json(content_type: &str) -> bool {
    content_type == "application/json" || content_type.ends_with("+json")
}

fn host_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use tether_common::testing::ManualClock;
    use tether_common::REDACTION_MARKER;

    use super::*;

    /// Records every display call as one line of text.
    #[derive(Default)]
    struct RecordingSink {
        lines: Mutex<Vec<String>>,
        internal_errors: Mutex<Vec<TetherError>>,
        failing_starts: AtomicUsize,
        fail_headers: bool,
    }

    impl RecordingSink {
        fn failing_first_start() -> Self {
            Self { failing_starts: AtomicUsize::new(1), ..Self::default() }
        }

        fn failing_headers() -> Self {
            Self { fail_headers: true, ..Self::default() }
        }

        fn record(&self, line: String) -> Result<()> {
            self.lines.lock().push(line);
            Ok(())
        }

        fn lines(&self) -> Vec<String> {
            self.lines.lock().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.lines().iter().filter(|line| line.starts_with(prefix)).count()
        }

        fn headers(&self) -> Vec<String> {
            self.lines()
                .into_iter()
                .filter_map(|line| line.strip_prefix("header ").map(str::to_string))
                .collect()
        }

        fn internal_errors(&self) -> Vec<TetherError> {
            self.internal_errors.lock().clone()
        }
    }

    impl TrafficLogSink for RecordingSink {
        fn start(&self) -> Result<()> {
            let failing = self.failing_starts.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_starts.store(failing - 1, Ordering::SeqCst);
                return Err(TetherError::LoggingSink("terminal gone".into()));
            }
            self.record("start".into())
        }

        fn display_type(&self, name: &str, time: DateTime<Utc>) -> Result<()> {
            self.record(format!("type {name} {}", time.to_rfc3339()))
        }

        fn display_request_header(&self, method: &str, uri: &str, protocol: &str) -> Result<()> {
            self.record(format!("request {method} {uri} {protocol}"))
        }

        fn display_host(&self, host: &str) -> Result<()> {
            self.record(format!("host {host}"))
        }

        fn display_header(&self, name: &str, value: &str) -> Result<()> {
            if self.fail_headers {
                return Err(TetherError::LoggingSink("cannot format header".into()));
            }
            self.record(format!("header {name}: {value}"))
        }

        fn display_body(&self, body: &[u8]) -> Result<()> {
            self.record(format!("body {}", String::from_utf8_lossy(body)))
        }

        fn display_json_body(&self, body: &str) -> Result<()> {
            self.record(format!("json {body}"))
        }

        fn display_response_header(&self, protocol: &str, status: &str) -> Result<()> {
            self.record(format!("response {protocol} {status}"))
        }

        fn display_error(&self, error: &TetherError) -> Result<()> {
            self.record(format!("error {error}"))
        }

        fn handle_internal_error(&self, error: &TetherError) {
            self.internal_errors.lock().push(error.clone());
        }

        fn stop(&self) -> Result<()> {
            self.record("stop".into())
        }
    }

    /// Returns a canned response and keeps every request it was given.
    struct CannedTransport {
        reply: Result<ApiResponse>,
        received: Mutex<Vec<ApiRequest>>,
    }

    impl CannedTransport {
        fn ok(response: ApiResponse) -> Self {
            Self { reply: Ok(response), received: Mutex::default() }
        }

        fn failing(error: TetherError) -> Self {
            Self { reply: Err(error), received: Mutex::default() }
        }

        fn received(&self) -> Vec<ApiRequest> {
            self.received.lock().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for CannedTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
            self.received.lock().push(request);
            self.reply.clone()
        }
    }

    fn logger(
        transport: CannedTransport,
        sink: RecordingSink,
    ) -> TrafficLogger<CannedTransport, RecordingSink> {
        TrafficLogger::new(transport, sink).with_clock(Arc::new(ManualClock::new()))
    }

    fn request(url: &str) -> ApiRequest {
        ApiRequest::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_authorization_header_logged_once_redacted() {
        let logger = logger(CannedTransport::ok(ApiResponse::new(200)), RecordingSink::default());

        logger
            .send(request("https://api.example.com/v3/apps").header("Authorization", "secret"))
            .await
            .unwrap();

        assert_eq!(logger.sink().headers(), vec![format!("Authorization: {REDACTION_MARKER}")]);
        assert!(!logger.sink().lines().iter().any(|line| line.contains("secret")));
        // The transport still sees the real credential.
        assert_eq!(logger.inner().received()[0].headers.get("authorization"), Some("secret"));
    }

    #[tokio::test]
    async fn test_request_section_layout() {
        let logger = logger(CannedTransport::ok(ApiResponse::new(204)), RecordingSink::default());

        logger
            .send(
                request("https://api.example.com:8443/banana?query1=a&query2=b")
                    .header("Aghi", "bar")
                    .header("abc", "json")
                    .header("Adef", "application/json"),
            )
            .await
            .unwrap();

        let lines = logger.sink().lines();
        assert_eq!(
            &lines[..7],
            [
                "start",
                "type REQUEST 2024-01-01T00:00:00+00:00",
                "request GET /banana?query1=a&query2=b HTTP/1.1",
                "host api.example.com:8443",
                "header abc: json",
                "header Adef: application/json",
                "header Aghi: bar",
            ]
        );
        assert_eq!(lines[7], "stop");
    }

    #[tokio::test]
    async fn test_repeated_header_values_keep_arrival_order() {
        let response = ApiResponse::new(200)
            .with_reason("OK")
            .with_header("CCCCC", "third")
            .with_header("Set-Cookie", "session=abc")
            .with_header("AAAAA", "first")
            .with_header("set-cookie", "other=def")
            .with_header("BBBBB", "second");
        let logger = logger(CannedTransport::ok(response), RecordingSink::default());

        logger.send(request("https://api.example.com/")).await.unwrap();

        assert_eq!(
            logger.sink().headers(),
            vec![
                "AAAAA: first".to_string(),
                "BBBBB: second".to_string(),
                "CCCCC: third".to_string(),
                format!("Set-Cookie: {REDACTION_MARKER}"),
                format!("set-cookie: {REDACTION_MARKER}"),
            ]
        );
        assert_eq!(logger.sink().count("response HTTP/1.1 200 OK"), 1);
    }

    #[tokio::test]
    async fn test_location_keeps_non_sensitive_parameters() {
        let response = ApiResponse::new(302).with_header(
            "Location",
            "https://login.example.com/callback?state=pleasePersist&code=pleaseRedact&x=1",
        );
        let logger = logger(CannedTransport::ok(response), RecordingSink::default());

        logger.send(request("https://login.example.com/oauth/authorize")).await.unwrap();

        assert_eq!(
            logger.sink().headers(),
            vec![format!(
                "Location: https://login.example.com/callback?state=pleasePersist&code={REDACTION_MARKER}&x=1"
            )]
        );
    }

    #[tokio::test]
    async fn test_request_line_hides_sensitive_query_values() {
        let logger = logger(CannedTransport::ok(ApiResponse::new(200)), RecordingSink::default());

        logger
            .send(request("https://login.example.com/oauth/authorize?code=s3kr1t&access_token=tok&state=keep"))
            .await
            .unwrap();

        let lines = logger.sink().lines();
        assert!(lines.contains(&format!(
            "request GET /oauth/authorize?code={REDACTION_MARKER}&access_token={REDACTION_MARKER}&state=keep HTTP/1.1"
        )));
        assert!(lines.iter().all(|line| !line.contains("s3kr1t") && !line.contains("tok&")));
        assert_eq!(
            logger.inner().received()[0].url.query(),
            Some("code=s3kr1t&access_token=tok&state=keep")
        );
    }

    #[tokio::test]
    async fn test_json_body_is_rendered_redacted_and_left_intact() {
        let body = br#"{"username":"admin","password":"hunter2"}"#.to_vec();
        let logger = logger(CannedTransport::ok(ApiResponse::new(200)), RecordingSink::default());

        logger
            .send(
                request("https://api.example.com/login")
                    .header("Content-Type", "application/json; charset=utf-8")
                    .body(body.clone()),
            )
            .await
            .unwrap();

        let json: Vec<String> =
            logger.sink().lines().into_iter().filter(|line| line.starts_with("json ")).collect();
        assert_eq!(json.len(), 1);
        assert!(json[0].contains(&format!("\"password\": \"{REDACTION_MARKER}\"")));
        assert!(json[0].contains("\"username\": \"admin\""));
        assert!(!json[0].contains("hunter2"));
        assert_eq!(logger.inner().received()[0].body.as_deref(), Some(body.as_slice()));
    }

    #[tokio::test]
    async fn test_form_and_raw_bodies() {
        let response = ApiResponse::new(200)
            .with_header("Content-Type", "text/plain")
            .with_body("some-response-body");
        let logger = logger(CannedTransport::ok(response), RecordingSink::default());

        logger
            .send(
                request("https://uaa.example.com/oauth/token")
                    .header("Content-Type", FORM_CONTENT_TYPE)
                    .body("grant_type=refresh_token&refresh_token=abc"),
            )
            .await
            .unwrap();

        let bodies: Vec<String> =
            logger.sink().lines().into_iter().filter(|line| line.starts_with("body ")).collect();
        assert_eq!(
            bodies,
            vec![
                format!("body grant_type=refresh_token&refresh_token={REDACTION_MARKER}"),
                "body some-response-body".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_shown_raw() {
        let response = ApiResponse::new(500)
            .with_header("Content-Type", "application/json")
            .with_body("some-error-body");
        let logger = logger(CannedTransport::ok(response), RecordingSink::default());

        logger.send(request("https://api.example.com/")).await.unwrap();

        assert_eq!(logger.sink().count("body some-error-body"), 1);
        assert_eq!(logger.sink().count("json "), 0);
    }

    #[tokio::test]
    async fn test_each_exchange_starts_and_stops_twice() {
        let logger = logger(CannedTransport::ok(ApiResponse::new(200)), RecordingSink::default());

        logger.send(request("https://api.example.com/")).await.unwrap();

        assert_eq!(logger.sink().count("start"), 2);
        assert_eq!(logger.sink().count("stop"), 2);
        assert!(logger.sink().internal_errors().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failing_once_does_not_affect_request() {
        let logger = logger(
            CannedTransport::ok(ApiResponse::new(200).with_reason("OK")),
            RecordingSink::failing_first_start(),
        );

        let response = logger.send(request("https://api.example.com/")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(logger.inner().received().len(), 1);
        assert_eq!(
            logger.sink().internal_errors(),
            vec![TetherError::LoggingSink("terminal gone".into())]
        );
        // The response section is still logged.
        assert_eq!(logger.sink().count("response HTTP/1.1 200 OK"), 1);
    }

    #[tokio::test]
    async fn test_display_failure_reported_once_per_section() {
        let response = ApiResponse::new(200).with_header("X-One", "1").with_header("X-Two", "2");
        let logger = logger(CannedTransport::ok(response), RecordingSink::failing_headers());

        logger
            .send(request("https://api.example.com/").header("Accept", "application/json"))
            .await
            .unwrap();

        assert_eq!(logger.sink().internal_errors().len(), 2);
        assert_eq!(logger.sink().count("stop"), 2);
        assert_eq!(logger.inner().received().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_displayed_and_returned() {
        let logger = logger(
            CannedTransport::failing(TetherError::Transport("connection refused".into())),
            RecordingSink::default(),
        );

        let err = logger.send(request("https://api.example.com/")).await.unwrap_err();

        assert_eq!(err, TetherError::Transport("connection refused".into()));
        assert_eq!(logger.sink().count("type RESPONSE"), 1);
        assert_eq!(logger.sink().count("error Transport error: connection refused"), 1);
        assert_eq!(logger.sink().count("response "), 0);
    }
}
