//! OAuth refresh-token exchange

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tether_common::time::{Clock, SystemClock};
use tether_core::auth::TokenExchanger;
use tether_core::transport::HttpTransport;
use tether_domain::config::ApiConfig;
use tether_domain::{ApiRequest, ApiResponse, Method, Result, TetherError, TokenGrant};
use tracing::{debug, instrument, warn};
use url::Url;

use super::errors::map_status_error;

const TOKEN_PATH: &str = "/oauth/token";

/// OAuth error codes meaning the refresh token itself is no longer usable.
const REJECTED_GRANT_ERRORS: [&str; 2] = ["invalid_grant", "invalid_token"];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Default, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Exchanges refresh tokens at `{auth_url}/oauth/token`.
///
/// The transport must not be the auth-retrying one: the token endpoint is
/// authorized with the client credentials, never with the session token.
pub struct OAuthTokenExchanger {
    transport: Arc<dyn HttpTransport>,
    token_url: Url,
    client_id: String,
    client_secret: String,
    clock: Arc<dyn Clock>,
}

impl OAuthTokenExchanger {
    /// # Errors
    /// `TetherError::Config` when `config.auth_url` is not a valid URL.
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ApiConfig) -> Result<Self> {
        let token_url = Url::parse(&config.auth_url)
            .and_then(|base| base.join(TOKEN_PATH))
            .map_err(|e| TetherError::Config(format!("invalid api.auth_url: {e}")))?;
        Ok(Self {
            transport,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            clock: Arc::new(SystemClock),
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn request(&self, refresh_token: &str) -> ApiRequest {
        let body = format!(
            "grant_type=refresh_token&refresh_token={}",
            urlencoding::encode(refresh_token)
        );
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        ApiRequest::new(Method::Post, self.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .header("Authorization", format!("Basic {credentials}"))
            .body(body)
    }

    fn classify_failure(&self, response: &ApiResponse) -> TetherError {
        let body: OAuthErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
        let rejected = REJECTED_GRANT_ERRORS.contains(&body.error.as_str());
        if response.status == 401 || rejected {
            let reason = if body.error.is_empty() {
                format!("token endpoint returned {}", response.status_line())
            } else if body.error_description.is_empty() {
                body.error
            } else {
                format!("{}: {}", body.error, body.error_description)
            };
            warn!(status = response.status, "refresh credential rejected");
            return TetherError::RefreshCredentialInvalid(reason);
        }
        map_status_error(response, self.token_url.path())
    }
}

#[async_trait]
impl TokenExchanger for OAuthTokenExchanger {
    #[instrument(skip_all, fields(url = %self.token_url))]
    async fn exchange(&self, refresh_token: &str) -> Result<TokenGrant> {
        let response = self.transport.send(self.request(refresh_token)).await?;
        if !response.is_success() {
            return Err(self.classify_failure(&response));
        }

        let token: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| TetherError::Decode(format!("invalid token response: {e}")))?;
        debug!(expires_in = token.expires_in, "access token issued");

        let mut grant = TokenGrant::new(
            token.access_token,
            token.refresh_token,
            Duration::from_secs(token.expires_in),
            self.clock.now(),
        );
        if let Some(token_type) = token.token_type {
            grant.token_type = token_type;
        }
        Ok(grant)
    }
}
