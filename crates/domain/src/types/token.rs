//! Session credentials shared by every request issuer

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::REDACTION_MARKER;

/// Token material returned by a refresh exchange, before it is published.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenGrant {
    /// Build a grant from an `expires_in` lifetime measured from `issued_at`.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: Duration,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let lifetime = chrono::Duration::from_std(expires_in).unwrap_or(chrono::Duration::zero());
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: "bearer".to_string(),
            expires_at: issued_at + lifetime,
        }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &REDACTION_MARKER)
            .field("refresh_token", &REDACTION_MARKER)
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Access/refresh credential pair plus a monotonically increasing version.
///
/// The version is the only ordering used when deciding whether a refreshed
/// token may replace the current one; wall-clock order is never consulted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub version: u64,
}

impl SessionToken {
    /// Token established at authentication time (version 1).
    pub fn from_grant(grant: TokenGrant) -> Self {
        Self::versioned(grant, 1)
    }

    /// Stamp a freshly exchanged grant with an explicit version.
    pub fn versioned(grant: TokenGrant, version: u64) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            token_type: grant.token_type,
            expires_at: grant.expires_at,
            version,
        }
    }

    /// Value for the `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Time left before expiry, or zero if already expired.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the token expires within `margin` of `now`.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.time_until_expiry(now) <= margin
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("access_token", &REDACTION_MARKER)
            .field("refresh_token", &REDACTION_MARKER)
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("version", &self.version)
            .finish()
    }
}
