//! API client - the composition root for talking to the platform
//!
//! Requests flow through three layers:
//!
//! ```text
//! AuthRetryTransport -> TrafficLogger (when enabled) -> HttpClient
//! ```
//!
//! so the traffic log sees the injected `Authorization` header (and redacts
//! it), and a request retried after a token refresh is logged twice. The
//! refresh exchange itself goes through the logged transport without the
//! auth layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tether_common::time::Clock;
use tether_core::auth::{
    AuthRetryTransport, RefreshHandle, RefreshSchedule, SessionManager, TokenRefreshScheduler,
};
use tether_core::jobs::{JobPoller, PollPolicy};
use tether_core::stream::{stream_logs, EventStream, StreamOptions};
use tether_core::traffic::{TrafficLogSink, TrafficLogger};
use tether_core::transport::HttpTransport;
use tether_domain::{
    ApiRequest, ApiResponse, Config, JobHandle, LogEvent, Method, ProgressEvent, Result,
    SessionToken, TetherError, TokenGrant, Warnings,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use super::errors::map_status_error;
use super::jobs::{HttpJobStatusSource, RequestJobResolver};
use super::token::OAuthTokenExchanger;
use crate::http::HttpClient;
use crate::logging::TracingTrafficSink;
use crate::logs::LogCacheSource;

/// Authenticated, optionally traced access to the platform API.
pub struct ApiClient {
    config: Config,
    base_url: Url,
    session: Arc<SessionManager>,
    transport: Arc<dyn HttpTransport>,
    jobs: JobPoller,
}

impl ApiClient {
    /// Client whose traffic log (if enabled) goes to `tracing`.
    ///
    /// # Errors
    /// Returns `TetherError::Config` if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_traffic_sink(config, Arc::new(TracingTrafficSink))
    }

    /// Client whose traffic log (if enabled) goes to `sink`.
    ///
    /// # Errors
    /// Returns `TetherError::Config` if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn with_traffic_sink(config: Config, sink: Arc<dyn TrafficLogSink>) -> Result<Self> {
        config.validate()?;
        let base_url = Url::parse(&config.api.base_url)
            .map_err(|e| TetherError::Config(format!("invalid api.base_url: {e}")))?;

        let http: Arc<dyn HttpTransport> = Arc::new(HttpClient::from_config(&config.api)?);
        let logged: Arc<dyn HttpTransport> = if config.traffic_log.enabled {
            Arc::new(TrafficLogger::new(http, sink))
        } else {
            http
        };

        let exchanger = OAuthTokenExchanger::new(Arc::clone(&logged), &config.api)?;
        let session = Arc::new(SessionManager::new(Arc::new(exchanger)));
        let transport: Arc<dyn HttpTransport> =
            Arc::new(AuthRetryTransport::new(logged, Arc::clone(&session)));

        let source = HttpJobStatusSource::new(Arc::clone(&transport), base_url.clone());
        let jobs = JobPoller::new(Arc::new(source), PollPolicy::from(&config.polling));

        info!(
            base_url = %base_url,
            traffic_log = config.traffic_log.enabled,
            "API client initialized"
        );
        Ok(Self { config, base_url, session, transport, jobs })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared session; subscribe to it for refreshed-token notifications.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Authenticated transport, for callers issuing their own requests.
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    /// Install the tokens obtained at authentication time.
    pub fn login(&self, grant: TokenGrant) -> Arc<SessionToken> {
        self.session.establish(grant)
    }

    /// Forget the session. Requests issued afterwards are unauthenticated.
    pub fn logout(&self) {
        self.session.revoke();
    }

    /// Keep the session token fresh in the background until `stop` fires.
    pub fn start_token_refresh(&self, clock: Arc<dyn Clock>, stop: CancellationToken) -> RefreshHandle {
        TokenRefreshScheduler::new(
            Arc::clone(&self.session),
            clock,
            RefreshSchedule::from(&self.config.token),
        )
        .start(stop)
    }

    /// Resolve `path` against the API base URL.
    ///
    /// # Errors
    /// Returns `TetherError::InvalidInput` if `path` does not form a URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| TetherError::InvalidInput(format!("invalid API path {path:?}: {e}")))
    }

    /// Send a request through the full transport stack.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.transport.send(request).await
    }

    /// `GET path` and decode the JSON response.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<(T, Warnings)> {
        let url = self.url(path)?;
        let request = ApiRequest::get(url).header("Accept", "application/json");
        self.exchange_json(request).await
    }

    /// `POST path` with a JSON body and decode the JSON response.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<(T, Warnings)>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.json_request(Method::Post, path, body)?;
        self.exchange_json(request).await
    }

    /// Build a request carrying `body` as JSON.
    ///
    /// # Errors
    /// Returns `TetherError::InvalidInput` for a bad path or an unserializable
    /// body.
    pub fn json_request<B>(&self, method: Method, path: &str, body: &B) -> Result<ApiRequest>
    where
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)
            .map_err(|e| TetherError::InvalidInput(format!("failed to serialize body: {e}")))?;
        Ok(ApiRequest::new(method, self.url(path)?)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .body(payload))
    }

    async fn exchange_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<(T, Warnings)> {
        let url = request.url.clone();
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(map_status_error(&response, url.path()));
        }

        let warnings = response.warnings();
        // 204 and 205 carry no body
        let value = if response.body.is_empty() || matches!(response.status, 204 | 205) {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&response.body)
        }
        .map_err(|e| TetherError::Decode(format!("failed to parse response from {url}: {e}")))?;

        debug!(status = response.status, warnings = warnings.len(), "request successful");
        Ok((value, warnings))
    }

    /// Stream the progress of an already started job.
    ///
    /// # Errors
    /// Returns `TetherError::InvalidInput` if the polling policy is invalid.
    pub fn poll_job<T>(
        &self,
        handle: JobHandle,
        cancel: CancellationToken,
    ) -> Result<EventStream<ProgressEvent<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.jobs.poll(handle, cancel)
    }

    /// Send `request`, which must answer `202 Accepted` with a job
    /// `Location`, then stream that job's progress.
    ///
    /// # Errors
    /// Returns `TetherError::InvalidInput` if the polling policy is invalid.
    pub fn start_job<T>(
        &self,
        request: ApiRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream<ProgressEvent<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let resolver = RequestJobResolver::new(Arc::clone(&self.transport), request);
        self.jobs.start(Arc::new(resolver), cancel)
    }

    /// Tail the logs of `source_id` starting now.
    ///
    /// # Errors
    /// Returns `TetherError::Config` if `api.log_url` is unusable.
    pub fn stream_logs(&self, source_id: &str, cancel: CancellationToken) -> Result<EventStream<LogEvent>> {
        let source = LogCacheSource::new(self.transport(), &self.config.api.log_url, source_id)?;
        Ok(self.tail(source, cancel))
    }

    /// Tail the logs of `source_id` starting at `since`.
    ///
    /// Pass the timestamp of the last line a previous stream delivered to
    /// reconnect without losing lines.
    ///
    /// # Errors
    /// Returns `TetherError::Config` if `api.log_url` is unusable.
    pub fn resume_logs(
        &self,
        source_id: &str,
        since: DateTime<Utc>,
        cancel: CancellationToken,
    ) -> Result<EventStream<LogEvent>> {
        let source = LogCacheSource::new(self.transport(), &self.config.api.log_url, source_id)?
            .resume_from(since);
        Ok(self.tail(source, cancel))
    }

    fn tail(&self, source: LogCacheSource, cancel: CancellationToken) -> EventStream<LogEvent> {
        stream_logs(source, StreamOptions::from(&self.config.streaming), cancel)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use parking_lot::Mutex;
    use tether_common::REDACTION_MARKER;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.api.auth_url = server.uri();
        config.api.log_url = server.uri();
        config.polling.interval_ms = 10;
        config.polling.max_backoff_ms = 50;
        config
    }

    fn grant(access: &str) -> TokenGrant {
        TokenGrant::new(access, "refresh", Duration::from_secs(600), Utc::now())
    }

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl TrafficLogSink for Lines {
        fn start(&self) -> Result<()> {
            Ok(())
        }

        fn display_type(&self, name: &str, _time: DateTime<Utc>) -> Result<()> {
            self.0.lock().push(name.to_string());
            Ok(())
        }

        fn display_request_header(&self, method: &str, uri: &str, _protocol: &str) -> Result<()> {
            self.0.lock().push(format!("{method} {uri}"));
            Ok(())
        }

        fn display_host(&self, _host: &str) -> Result<()> {
            Ok(())
        }

        fn display_header(&self, name: &str, value: &str) -> Result<()> {
            self.0.lock().push(format!("{name}: {value}"));
            Ok(())
        }

        fn display_body(&self, _body: &[u8]) -> Result<()> {
            Ok(())
        }

        fn display_json_body(&self, _body: &str) -> Result<()> {
            Ok(())
        }

        fn display_response_header(&self, _protocol: &str, status: &str) -> Result<()> {
            self.0.lock().push(status.to_string());
            Ok(())
        }

        fn display_error(&self, _error: &TetherError) -> Result<()> {
            Ok(())
        }

        fn handle_internal_error(&self, _error: &TetherError) {}

        fn stop(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_get_json_sends_token_and_collects_warnings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/apps"))
            .and(header("Authorization", "bearer access-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Cf-Warnings", "first,second%20one")
                    .set_body_json(serde_json::json!({"resources": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(config(&server)).unwrap();
        client.login(grant("access-1"));

        let (body, warnings): (serde_json::Value, _) = client.get_json("/v3/apps").await.unwrap();

        assert_eq!(body["resources"], serde_json::json!([]));
        assert_eq!(warnings.into_vec(), ["first", "second one"]);
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/apps"))
            .and(header("Authorization", "bearer stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "refresh_token": "refresh-2",
                "token_type": "bearer",
                "expires_in": 600
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/apps"))
            .and(header("Authorization", "bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(config(&server)).unwrap();
        let before = client.login(grant("stale")).version;

        let (body, _): (serde_json::Value, _) = client.get_json("/v3/apps").await.unwrap();

        assert_eq!(body["ok"], true);
        assert!(client.session().version() > before);
    }

    #[tokio::test]
    async fn test_unexpected_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errors": [{"detail": "App not found", "title": "CF-ResourceNotFound", "code": 10010}]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(config(&server)).unwrap();
        client.login(grant("access"));

        let err = client.get_json::<serde_json::Value>("/v3/apps/missing").await.unwrap_err();
        match err {
            TetherError::Status { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("App not found"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_started_job_is_polled_to_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/apps/123/actions/restage"))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("Location", "/v3/jobs/abc")
                    .insert_header("X-Cf-Warnings", "restaging"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/jobs/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"state": "PROCESSING"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/jobs/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "COMPLETE",
                "guid": "abc",
                "warnings": [{"detail": "stack deprecated"}]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(config(&server)).unwrap();
        client.login(grant("access"));
        let request = client.json_request(Method::Post, "/v3/apps/123/actions/restage", &serde_json::json!({})).unwrap();

        let outcome = client
            .start_job::<serde_json::Value>(request, CancellationToken::new())
            .unwrap()
            .outcome()
            .await;

        let (result, warnings) = outcome.into_parts();
        assert_eq!(result.unwrap()["guid"], "abc");
        assert_eq!(warnings.into_vec(), ["restaging", "stack deprecated"]);
    }

    #[tokio::test]
    async fn test_failed_job_keeps_backend_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/jobs/bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "FAILED",
                "errors": [{"detail": "service broker unreachable", "code": 10001}]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(config(&server)).unwrap();
        client.login(grant("access"));
        let handle = JobHandle::new(format!("{}/v3/jobs/bad", server.uri())).unwrap();

        let outcome = client
            .poll_job::<serde_json::Value>(handle, CancellationToken::new())
            .unwrap()
            .outcome()
            .await;

        assert_eq!(
            outcome.result.unwrap_err(),
            TetherError::JobFailed { reason: "service broker unreachable".into(), code: Some(10001) }
        );
    }

    #[tokio::test]
    async fn test_traffic_log_redacts_injected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let mut config = config(&server);
        config.traffic_log.enabled = true;
        let sink = Arc::new(Lines::default());
        let client = ApiClient::with_traffic_sink(config, sink.clone()).unwrap();
        client.login(grant("super-secret"));

        let _: (serde_json::Value, _) = client.get_json("/v3/info").await.unwrap();

        let lines = sink.0.lock().clone();
        assert_eq!(lines[0], "REQUEST");
        assert_eq!(lines[1], "GET /v3/info");
        assert!(lines.contains(&format!("Authorization: {REDACTION_MARKER}")));
        assert!(lines.contains(&"RESPONSE".to_string()));
        assert!(lines.contains(&"200 OK".to_string()));
        assert!(lines.iter().all(|line| !line.contains("super-secret")));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.api.base_url = "not a url".into();
        assert!(matches!(ApiClient::new(config), Err(TetherError::Config(_))));
    }
}
