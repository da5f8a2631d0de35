// Redaction of credentials in diagnostic output

use std::borrow::Cow;
use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::error::{PrivacyError, PrivacyResult};

/// Literal substituted for any redacted value.
pub const REDACTION_MARKER: &str = "[PRIVATE DATA HIDDEN]";

/// Body keys whose values are never displayed (matched case-insensitively,
/// anywhere in the key).
pub const DEFAULT_SENSITIVE_KEY_PATTERN: &str =
    r"token|password|secret|passcode|credentials|client_secret";

/// The alternatives of [`DEFAULT_SENSITIVE_KEY_PATTERN`], already lowercase.
const DEFAULT_SENSITIVE_KEYS: [&str; 6] =
    ["token", "password", "secret", "passcode", "credentials", "client_secret"];

const DEFAULT_SENSITIVE_HEADERS: [&str; 4] =
    ["authorization", "proxy-authorization", "cookie", "set-cookie"];
const DEFAULT_REDIRECT_HEADER: &str = "location";
const DEFAULT_SENSITIVE_QUERY_KEYS: [&str; 4] =
    ["code", "access_token", "refresh_token", "id_token"];

/// How body keys are recognised as sensitive.
#[derive(Debug, Clone)]
enum KeyMatcher {
    /// Case-insensitive substring match against fixed keywords.
    Keywords(&'static [&'static str]),
    Pattern(Regex),
}

impl KeyMatcher {
    fn is_match(&self, key: &str) -> bool {
        match self {
            Self::Keywords(keywords) => {
                let key = key.to_ascii_lowercase();
                keywords.iter().any(|keyword| key.contains(keyword))
            }
            Self::Pattern(pattern) => pattern.is_match(key),
        }
    }
}

/// Static description of what must never appear verbatim in logged traffic.
///
/// The policy is stateless: every method is a pure function of its input, so
/// one instance can be shared by any number of concurrent loggers.
#[derive(Debug, Clone)]
pub struct RedactionPolicy {
    marker: String,
    sensitive_headers: BTreeSet<String>,
    redirect_header: String,
    sensitive_query_keys: BTreeSet<String>,
    sensitive_keys: KeyMatcher,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            marker: REDACTION_MARKER.to_string(),
            sensitive_headers: DEFAULT_SENSITIVE_HEADERS.iter().map(|h| (*h).to_string()).collect(),
            redirect_header: DEFAULT_REDIRECT_HEADER.to_string(),
            sensitive_query_keys: DEFAULT_SENSITIVE_QUERY_KEYS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
            sensitive_keys: KeyMatcher::Keywords(&DEFAULT_SENSITIVE_KEYS),
        }
    }
}

impl RedactionPolicy {
    pub fn builder() -> RedactionPolicyBuilder {
        RedactionPolicyBuilder::new()
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether the whole value of header `name` must be hidden.
    pub fn is_sensitive_header(&self, name: &str) -> bool {
        self.sensitive_headers.contains(&name.to_ascii_lowercase())
    }

    /// Whether `name` is the redirect header whose query is partially hidden.
    pub fn is_redirect_header(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.redirect_header)
    }

    pub fn is_sensitive_query_key(&self, key: &str) -> bool {
        self.sensitive_query_keys.contains(&key.to_ascii_lowercase())
    }

    pub fn is_sensitive_body_key(&self, key: &str) -> bool {
        self.sensitive_keys.is_match(key)
    }

    /// Value of a header as it may be displayed.
    pub fn redact_header<'a>(&self, name: &str, value: &'a str) -> Cow<'a, str> {
        if self.is_sensitive_header(name) {
            Cow::Owned(self.marker.clone())
        } else if self.is_redirect_header(name) {
            self.redact_redirect_target(value)
        } else {
            Cow::Borrowed(value)
        }
    }

    /// Hide the values of sensitive query parameters in a URL-ish string.
    ///
    /// Only the value part of a matching pair changes; every other byte,
    /// including pair order, encoding and the fragment, is kept verbatim.
    pub fn redact_redirect_target<'a>(&self, target: &'a str) -> Cow<'a, str> {
        let Some(query_start) = target.find('?') else {
            return Cow::Borrowed(target);
        };
        let (prefix, rest) = target.split_at(query_start + 1);
        let (query, fragment) = match rest.find('#') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };

        match self.redact_pairs(query, |key| self.is_sensitive_query_key(key)) {
            Cow::Borrowed(_) => Cow::Borrowed(target),
            Cow::Owned(redacted) => Cow::Owned(format!("{prefix}{redacted}{fragment}")),
        }
    }

    /// Redact an `application/x-www-form-urlencoded` body.
    pub fn redact_form_body<'a>(&self, body: &'a str) -> Cow<'a, str> {
        self.redact_pairs(body, |key| {
            self.is_sensitive_body_key(key) || self.is_sensitive_query_key(key)
        })
    }

    /// Copy of `value` with every sensitive key's value replaced.
    pub fn redact_json(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, inner)| {
                        let redacted = if self.is_sensitive_body_key(key) {
                            Value::String(self.marker.clone())
                        } else {
                            self.redact_json(inner)
                        };
                        (key.clone(), redacted)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_json(v)).collect()),
            other => other.clone(),
        }
    }

    /// Parse, redact and pretty-print a JSON body.
    ///
    /// # Errors
    /// Returns `PrivacyError::MalformedJson` when `body` is not valid JSON;
    /// callers fall back to showing the body as raw bytes.
    pub fn render_json_body(&self, body: &[u8]) -> PrivacyResult<String> {
        let parsed: Value = serde_json::from_slice(body)
            .map_err(|e| PrivacyError::MalformedJson(e.to_string()))?;
        serde_json::to_string_pretty(&self.redact_json(&parsed))
            .map_err(|e| PrivacyError::MalformedJson(e.to_string()))
    }

    fn redact_pairs<'a>(&self, encoded: &'a str, sensitive: impl Fn(&str) -> bool) -> Cow<'a, str> {
        let mut changed = false;
        let pairs: Vec<Cow<'a, str>> = encoded
            .split('&')
            .map(|pair| {
                let Some((raw_key, _)) = pair.split_once('=') else {
                    return Cow::Borrowed(pair);
                };
                let key = urlencoding::decode(&raw_key.replace('+', " "))
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| raw_key.to_string());
                if sensitive(&key) {
                    changed = true;
                    Cow::Owned(format!("{raw_key}={}", self.marker))
                } else {
                    Cow::Borrowed(pair)
                }
            })
            .collect();

        if changed {
            Cow::Owned(pairs.join("&"))
        } else {
            Cow::Borrowed(encoded)
        }
    }
}

/// Builder for [`RedactionPolicy`] starting from the default rules.
#[derive(Debug)]
pub struct RedactionPolicyBuilder {
    policy: RedactionPolicy,
    pattern: Option<String>,
}

impl Default for RedactionPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RedactionPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RedactionPolicy::default(), pattern: None }
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.policy.marker = marker.into();
        self
    }

    pub fn sensitive_header(mut self, name: &str) -> Self {
        self.policy.sensitive_headers.insert(name.to_ascii_lowercase());
        self
    }

    pub fn sensitive_query_key(mut self, key: &str) -> Self {
        self.policy.sensitive_query_keys.insert(key.to_ascii_lowercase());
        self
    }

    /// Replace the body key pattern (always matched case-insensitively).
    pub fn sensitive_key_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// # Errors
    /// Returns `PrivacyError::InvalidPattern` if the key pattern does not
    /// compile.
    pub fn build(mut self) -> PrivacyResult<RedactionPolicy> {
        if let Some(pattern) = self.pattern {
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| PrivacyError::InvalidPattern(e.to_string()))?;
            self.policy.sensitive_keys = KeyMatcher::Pattern(regex);
        }
        Ok(self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keys_match_documented_pattern() {
        assert_eq!(DEFAULT_SENSITIVE_KEYS.join("|"), DEFAULT_SENSITIVE_KEY_PATTERN);

        let keywords = RedactionPolicy::default();
        let pattern =
            RedactionPolicy::builder().sensitive_key_pattern(DEFAULT_SENSITIVE_KEY_PATTERN).build().unwrap();
        for key in ["access_token", "Password", "CLIENT_SECRET", "passcode", "Credentials", "username", "pass"] {
            assert_eq!(keywords.is_sensitive_body_key(key), pattern.is_sensitive_body_key(key), "{key}");
        }
        assert!(keywords.is_sensitive_body_key("RefreshToken"));
        assert!(!keywords.is_sensitive_body_key("username"));
    }

    #[test]
    fn test_sensitive_headers_ignore_case() {
        let policy = RedactionPolicy::default();
        for name in ["Authorization", "AUTHORIZATION", "authorization", "Set-Cookie", "cookie"] {
            assert_eq!(policy.redact_header(name, "secret"), REDACTION_MARKER, "{name}");
        }
        assert_eq!(policy.redact_header("Accept", "application/json"), "application/json");
    }

    #[test]
    fn test_location_only_hides_sensitive_query_values() {
        let policy = RedactionPolicy::default();
        let redacted =
            policy.redact_header("Location", "foo.bar/login?state=abc&code=pleaseRedact&x=%2F1#top");

        assert_eq!(redacted, "foo.bar/login?state=abc&code=[PRIVATE DATA HIDDEN]&x=%2F1#top");
        assert!(!redacted.contains("pleaseRedact"));
    }

    #[test]
    fn test_location_without_sensitive_keys_is_borrowed() {
        let policy = RedactionPolicy::default();
        let value = "https://example.com/next?page=2";
        assert!(matches!(policy.redact_redirect_target(value), Cow::Borrowed(v) if v == value));
        assert_eq!(policy.redact_redirect_target("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_repeated_sensitive_keys_are_all_hidden() {
        let policy = RedactionPolicy::default();
        let redacted = policy.redact_redirect_target("/cb?code=a&keep=1&CODE=b&access_token=c");
        assert_eq!(
            redacted,
            "/cb?code=[PRIVATE DATA HIDDEN]&keep=1&CODE=[PRIVATE DATA HIDDEN]&access_token=[PRIVATE DATA HIDDEN]"
        );
    }

    #[test]
    fn test_json_body_redaction_is_recursive() {
        let policy = RedactionPolicy::default();
        let body = br#"{"name":"app","auth":{"access_token":"abc","nested":[{"Password":"p"}]},"credentials":{"a":1}}"#;

        let rendered = policy.render_json_body(body).unwrap();
        let value: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["name"], "app");
        assert_eq!(value["auth"]["access_token"], REDACTION_MARKER);
        assert_eq!(value["auth"]["nested"][0]["Password"], REDACTION_MARKER);
        assert_eq!(value["credentials"], REDACTION_MARKER);
        assert!(rendered.contains('\n'), "pretty printed");
    }

    #[test]
    fn test_malformed_json_is_reported() {
        let policy = RedactionPolicy::default();
        assert!(matches!(policy.render_json_body(b"{not json"), Err(PrivacyError::MalformedJson(_))));
    }

    #[test]
    fn test_form_body_redaction() {
        let policy = RedactionPolicy::default();
        let redacted = policy.redact_form_body("grant_type=refresh_token&refresh_token=xyz&scope=a+b");
        assert_eq!(redacted, "grant_type=refresh_token&refresh_token=[PRIVATE DATA HIDDEN]&scope=a+b");
    }

    #[test]
    fn test_builder_extends_defaults() {
        let policy = RedactionPolicy::builder()
            .sensitive_header("X-Api-Key")
            .sensitive_query_key("sig")
            .sensitive_key_pattern("pin")
            .marker("***")
            .build()
            .unwrap();

        assert_eq!(policy.redact_header("x-api-key", "k"), "***");
        assert_eq!(policy.redact_header("authorization", "k"), "***");
        assert_eq!(policy.redact_redirect_target("/a?sig=1"), "/a?sig=***");
        assert!(policy.is_sensitive_body_key("PIN_CODE"));
        assert!(!policy.is_sensitive_body_key("password"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = RedactionPolicy::builder().sensitive_key_pattern("(").build();
        assert!(matches!(result, Err(PrivacyError::InvalidPattern(_))));
    }
}
