//! Classification of unexpected HTTP responses
//!
//! The platform reports failures as `{"errors": [{"detail", "title", "code"}]}`.
//! Details are joined into the error message; anything else in the body is
//! shown verbatim.

use serde::Deserialize;
use tether_domain::{ApiResponse, TetherError};

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEntry {
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub code: Option<i64>,
}

impl ErrorEntry {
    pub(crate) fn message(&self) -> &str {
        if self.detail.is_empty() {
            &self.title
        } else {
            &self.detail
        }
    }
}

/// Turn a non-2xx response into a classified error.
pub fn map_status_error(response: &ApiResponse, url: &str) -> TetherError {
    let detail = error_detail(&response.body);
    let message = if detail.is_empty() {
        format!("{url} returned status {}", response.status_line())
    } else {
        format!("{url} returned status {}: {detail}", response.status_line())
    };

    match response.status {
        401 => TetherError::AuthenticationExpired(message),
        status => TetherError::Status { status, message },
    }
}

fn error_detail(body: &[u8]) -> String {
    if let Ok(document) = serde_json::from_slice::<ErrorDocument>(body) {
        let details: Vec<&str> =
            document.errors.iter().map(ErrorEntry::message).filter(|m| !m.is_empty()).collect();
        if !details.is_empty() {
            return details.join("; ");
        }
    }
    String::from_utf8_lossy(body).trim().to_string()
}
