//! Transport-neutral HTTP request and response values
//!
//! The core never talks to an HTTP library directly; adapters translate these
//! values to and from their client of choice. Bodies are owned byte buffers so
//! inspecting them (for logging) never consumes them.

use std::fmt;

use url::Url;

use crate::constants::{DEFAULT_PROTOCOL, WARNINGS_HEADER};
use crate::types::warnings::Warnings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered multi-map of header names to values.
///
/// Lookups are case-insensitive; the original casing and arrival order are
/// kept for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a value, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Replace every value for `name` with a single value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.0.push((name, value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Declared media type without parameters, lowercased.
    pub fn content_type(&self) -> Option<String> {
        self.get("Content-Type")
            .map(|value| value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect())
    }
}

/// Outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: Headers::new(), body: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Protocol label shown in diagnostic output.
    pub fn protocol(&self) -> &'static str {
        DEFAULT_PROTOCOL
    }

    /// Path plus query, as displayed on the request line.
    pub fn request_uri(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// Inbound response, fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    /// Canonical reason phrase, e.g. `OK`.
    pub reason: String,
    /// Negotiated protocol, e.g. `HTTP/1.1`.
    pub protocol: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: String::new(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status line as displayed, e.g. `200 OK`.
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.reason)
        }
    }

    /// Advisory warnings carried in the warnings header.
    ///
    /// The header holds URL-encoded messages separated by commas; a message
    /// that fails to decode is kept verbatim.
    pub fn warnings(&self) -> Warnings {
        self.headers
            .get_all(WARNINGS_HEADER)
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                urlencoding::decode(&raw.replace('+', " "))
                    .map_or_else(|_| raw.to_string(), |decoded| decoded.into_owned())
            })
            .collect()
    }
}
