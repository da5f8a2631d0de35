use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Request, Response};
use tether_common::resilience::Backoff;
use tether_core::transport::HttpTransport;
use tether_domain::config::ApiConfig;
use tether_domain::{ApiRequest, ApiResponse, Headers, Method, Result, TetherError};
use tracing::debug;

use crate::errors::InfraError;

/// HTTP client with built-in retry and timeout support.
///
/// Connection failures are retried for every method. Timeouts and `5xx`
/// responses are retried only for idempotent methods, so a `POST` that may
/// have reached the server is never sent twice.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Client configured from the `api` section.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        Self::builder().timeout(config.timeout()).user_agent(config.user_agent.clone()).build()
    }

    /// Execute `request` with retry semantics.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let attempts = self.max_attempts.max(1);
        let idempotent = is_idempotent(request.method);
        let mut backoff = Backoff::new(self.base_backoff, self.max_backoff);

        for attempt in 0..attempts {
            let outgoing = self.to_reqwest(request)?;
            let last = attempt + 1 == attempts;
            debug!(attempt = attempt + 1, method = %request.method, url = %request.url, "sending HTTP request");

            match self.client.execute(outgoing).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt = attempt + 1, method = %request.method, url = %request.url, %status, "received HTTP response");

                    if status.is_server_error() && idempotent && !last {
                        tokio::time::sleep(backoff.on_failure()).await;
                        continue;
                    }

                    return from_reqwest(response).await;
                }
                Err(err) => {
                    debug!(attempt = attempt + 1, method = %request.method, url = %request.url, error = %err, "HTTP request failed");

                    if !last && should_retry_error(&err, idempotent) {
                        tokio::time::sleep(backoff.on_failure()).await;
                        continue;
                    }

                    return Err(InfraError::from(err).into());
                }
            }
        }

        Err(TetherError::Internal("http client exhausted retries without producing a result".into()))
    }

    fn to_reqwest(&self, request: &ApiRequest) -> Result<Request> {
        let mut builder = self.client.request(to_reqwest_method(request.method), request.url.clone());
        builder = builder.headers(to_header_map(&request.headers)?);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder.build().map_err(|err| InfraError::from(err).into())
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.execute(&request).await
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    max_backoff: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    accept_invalid_certs: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            user_agent: None,
            default_headers: None,
            accept_invalid_certs: false,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Test-only helper to allow insecure TLS (e.g., self-signed certs).
    #[cfg(test)]
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        // Redirects are surfaced to the caller: a 202 `Location` names the job to poll.
        let mut builder = ReqwestClient::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(InfraError::from)?;

        Ok(HttpClient {
            client,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
            max_backoff: self.max_backoff,
        })
    }
}

const fn is_idempotent(method: Method) -> bool {
    matches!(method, Method::Get | Method::Put | Method::Delete)
}

fn should_retry_error(err: &reqwest::Error, idempotent: bool) -> bool {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if err.is_connect() {
            return true;
        }
    }
    idempotent && (err.is_timeout() || err.is_request())
}

const fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TetherError::InvalidInput(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TetherError::InvalidInput(format!("invalid value for header {name}: {e}")))?;
        map.append(name, value);
    }
    Ok(map)
}

async fn from_reqwest(response: Response) -> Result<ApiResponse> {
    let status = response.status();
    let mut converted = ApiResponse::new(status.as_u16())
        .with_reason(status.canonical_reason().unwrap_or_default());
    converted.protocol = format!("{:?}", response.version());
    for (name, value) in response.headers() {
        converted.headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
    }
    converted.body = response.bytes().await.map_err(InfraError::from)?.to_vec();
    Ok(converted)
}
