//! Platform job endpoints
//!
//! Asynchronous operations answer `202 Accepted` with the job URL in
//! `Location`. The job document looks like:
//!
//! ```json
//! {
//!   "guid": "b19ae525-cbd3-4155-b156-dc0c2a431b4c",
//!   "state": "FAILED",
//!   "errors": [{ "detail": "droplet not found", "code": 10010 }],
//!   "warnings": [{ "detail": "buildpack is deprecated" }]
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tether_core::jobs::JobStatusSource;
use tether_core::transport::{HttpTransport, JobHandleResolver};
use tether_domain::{
    ApiRequest, ApiResponse, JobFailure, JobHandle, JobSnapshot, JobStatus, Result, TetherError,
    Warnings,
};
use tracing::debug;
use url::Url;

use super::errors::{map_status_error, ErrorEntry};

#[derive(Debug, Deserialize)]
struct JobDocument {
    state: String,
    #[serde(default)]
    errors: Vec<ErrorEntry>,
    #[serde(default)]
    warnings: Vec<WarningEntry>,
}

#[derive(Debug, Deserialize)]
struct WarningEntry {
    #[serde(default)]
    detail: String,
}

/// Reads job documents over HTTP.
///
/// Relative handles are resolved against `base_url`.
pub struct HttpJobStatusSource {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
}

impl HttpJobStatusSource {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: Url) -> Self {
        Self { transport, base_url }
    }

    fn job_url(&self, handle: &JobHandle) -> Result<Url> {
        match handle.as_url() {
            Some(url) => Ok(url),
            None => self.base_url.join(handle.as_str()).map_err(|e| {
                TetherError::InvalidInput(format!("job handle {handle} is not a URL: {e}"))
            }),
        }
    }
}

#[async_trait]
impl JobStatusSource for HttpJobStatusSource {
    async fn fetch_status(&self, handle: &JobHandle) -> Result<JobSnapshot> {
        let url = self.job_url(handle)?;
        let response = self.transport.send(ApiRequest::get(url.clone())).await?;
        if !response.is_success() {
            return Err(map_status_error(&response, url.path()));
        }
        decode_job(&response)
    }
}

/// Decode a job document, merging header warnings before body warnings.
pub fn decode_job(response: &ApiResponse) -> Result<JobSnapshot> {
    let payload: serde_json::Value = serde_json::from_slice(&response.body)
        .map_err(|e| TetherError::Decode(format!("job document is not JSON: {e}")))?;
    let document = JobDocument::deserialize(&payload)
        .map_err(|e| TetherError::Decode(format!("unexpected job document: {e}")))?;
    let status: JobStatus = document.state.parse().map_err(TetherError::Decode)?;

    let mut warnings = response.warnings();
    warnings.extend(
        document.warnings.into_iter().map(|w| w.detail).filter(|detail| !detail.is_empty()),
    );

    let mut snapshot = JobSnapshot::new(status).with_warnings(warnings);
    if status == JobStatus::Failed {
        snapshot = snapshot.with_failure(job_failure(&document.errors));
    }
    Ok(snapshot.with_payload(payload))
}

fn job_failure(errors: &[ErrorEntry]) -> JobFailure {
    let reason: Vec<&str> = errors.iter().map(ErrorEntry::message).filter(|m| !m.is_empty()).collect();
    let failure = if reason.is_empty() {
        JobFailure::new("job failed without details")
    } else {
        JobFailure::new(reason.join("; "))
    };
    match errors.iter().find_map(|e| e.code) {
        Some(code) => failure.with_code(code),
        None => failure,
    }
}

/// Job handle named by an accepted response's `Location` header.
///
/// A relative location is resolved against `request_url`.
///
/// # Errors
/// `TetherError::Status` for a non-2xx response, `TetherError::Decode` when
/// `Location` is missing or unusable.
pub fn job_handle_from_response(response: &ApiResponse, request_url: &Url) -> Result<(JobHandle, Warnings)> {
    if !response.is_success() {
        return Err(map_status_error(response, request_url.path()));
    }
    let location = response
        .headers
        .get("Location")
        .ok_or_else(|| TetherError::Decode(format!("{} response has no Location header", response.status)))?;
    let url = request_url
        .join(location)
        .map_err(|e| TetherError::Decode(format!("invalid job location {location:?}: {e}")))?;
    debug!(job = %url, "job accepted");
    Ok((JobHandle::new(url.as_str())?, response.warnings()))
}

/// Starts a job by sending one request and reading the handle it returns.
pub struct RequestJobResolver {
    transport: Arc<dyn HttpTransport>,
    request: ApiRequest,
}

impl RequestJobResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, request: ApiRequest) -> Self {
        Self { transport, request }
    }
}

#[async_trait]
impl JobHandleResolver for RequestJobResolver {
    async fn resolve_job_handle(&self) -> Result<(JobHandle, Warnings)> {
        let url = self.request.url.clone();
        let response = self.transport.send(self.request.clone()).await?;
        job_handle_from_response(&response, &url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://api.example.com/v3/apps/123/actions/start").unwrap()
    }

    #[test]
    fn test_failed_job_carries_backend_reason() {
        let response = ApiResponse::new(200).with_header("X-Cf-Warnings", "from%20header").with_body(
            r#"{"state":"FAILED","errors":[{"detail":"droplet not found","code":10010}],"warnings":[{"detail":"deprecated"}]}"#,
        );

        let snapshot = decode_job(&response).unwrap();

        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.warnings.into_vec(), ["from header", "deprecated"]);
        assert_eq!(snapshot.failure, Some(JobFailure::new("droplet not found").with_code(10010)));
    }

    #[test]
    fn test_backend_vocabulary_is_accepted() {
        let processing = ApiResponse::new(200).with_body(r#"{"state":"PROCESSING"}"#);
        let complete = ApiResponse::new(200).with_body(r#"{"state":"COMPLETE","guid":"abc"}"#);

        assert_eq!(decode_job(&processing).unwrap().status, JobStatus::Processing);
        let done = decode_job(&complete).unwrap();
        assert_eq!(done.status, JobStatus::Finished);
        assert_eq!(done.payload["guid"], "abc");
        assert!(done.failure.is_none());
    }

    #[test]
    fn test_unknown_state_is_a_decode_error() {
        let response = ApiResponse::new(200).with_body(r#"{"state":"EXPLODED"}"#);
        assert!(matches!(decode_job(&response), Err(TetherError::Decode(_))));
    }

    #[test]
    fn test_relative_location_is_resolved() {
        let response = ApiResponse::new(202)
            .with_header("Location", "/v3/jobs/abc")
            .with_header("X-Cf-Warnings", "w0");

        let (handle, warnings) = job_handle_from_response(&response, &url()).unwrap();

        assert_eq!(handle.as_str(), "https://api.example.com/v3/jobs/abc");
        assert_eq!(warnings.into_vec(), ["w0"]);
    }

    #[test]
    fn test_missing_location_is_rejected() {
        let err = job_handle_from_response(&ApiResponse::new(202), &url()).unwrap_err();
        assert!(matches!(err, TetherError::Decode(_)));
    }
}
