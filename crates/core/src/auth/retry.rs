//! Refresh-and-retry on rejected access tokens

use std::sync::Arc;

use async_trait::async_trait;
use tether_domain::{ApiRequest, ApiResponse, Result, SessionToken, TetherError};
use tracing::{debug, instrument, warn};

use super::session::SessionManager;
use crate::transport::HttpTransport;

const UNAUTHORIZED: u16 = 401;

/// Transport decorator that authorizes requests with the session token.
///
/// A `401` triggers one synchronous refresh (coordinated with any refresh
/// already in flight) and one retry of the original request. A second `401`
/// is reported as `TetherError::AuthenticationExpired`.
pub struct AuthRetryTransport<T> {
    inner: T,
    session: Arc<SessionManager>,
}

impl<T: HttpTransport> AuthRetryTransport<T> {
    pub fn new(inner: T, session: Arc<SessionManager>) -> Self {
        Self { inner, session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn send_with(&self, mut request: ApiRequest, token: Option<&SessionToken>) -> Result<ApiResponse> {
        if let Some(token) = token {
            request.headers.insert("Authorization", token.authorization_value());
        }
        self.inner.send(request).await
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for AuthRetryTransport<T> {
    #[instrument(skip_all, fields(method = %request.method, path = request.url.path()))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let token = self.session.current();
        let response = self.send_with(request.clone(), token.as_deref()).await?;
        if response.status != UNAUTHORIZED {
            return Ok(response);
        }

        let Some(token) = token else {
            return Err(TetherError::AuthenticationExpired("not logged in".into()));
        };

        debug!(version = token.version, "access token rejected, refreshing");
        let refreshed = self.session.refresh_after_rejection(token.version).await?;
        let retried = self.send_with(request, Some(&refreshed)).await?;
        if retried.status == UNAUTHORIZED {
            warn!(version = refreshed.version, "request rejected after token refresh");
            return Err(TetherError::AuthenticationExpired(
                "request rejected after refreshing the access token".into(),
            ));
        }
        Ok(retried)
    }
}
