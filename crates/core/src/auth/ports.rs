//! Port interfaces for token refresh

use async_trait::async_trait;
use tether_domain::{Result, TokenGrant};

/// Exchanges a refresh credential for a new access token.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// # Errors
    /// `TetherError::RefreshCredentialInvalid` when the authorization server
    /// rejects `refresh_token` itself; any other error is transient.
    async fn exchange(&self, refresh_token: &str) -> Result<TokenGrant>;
}
