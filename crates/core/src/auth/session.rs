//! Session token shared by every component issuing requests
//!
//! Manages the token lifecycle:
//! - Atomic snapshots for readers (never a half-updated token)
//! - Refreshed-token notification through a watch channel
//! - Single-flight refresh exchanges
//! - Version-checked publish so an older exchange never overwrites a newer
//!   token

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tether_domain::{Result, SessionToken, TetherError, TokenGrant};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::ports::TokenExchanger;

/// Published session state.
///
/// `version` only ever increases. It advances on every publish and on
/// revocation, so a refresh that started before either can be detected as
/// stale.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub token: Option<Arc<SessionToken>>,
    pub version: u64,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<Arc<SessionToken>>>>;

struct InFlight {
    id: u64,
    future: RefreshFuture,
}

/// Owner of the process-wide session token.
pub struct SessionManager {
    exchanger: Arc<dyn TokenExchanger>,
    state: Arc<watch::Sender<SessionState>>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    next_flight: AtomicU64,
}

impl SessionManager {
    /// Create a manager with no active session.
    pub fn new(exchanger: Arc<dyn TokenExchanger>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            exchanger,
            state: Arc::new(state),
            in_flight: Arc::new(Mutex::new(None)),
            next_flight: AtomicU64::new(0),
        }
    }

    /// Create a manager already holding `grant` (e.g. restored credentials).
    pub fn with_grant(exchanger: Arc<dyn TokenExchanger>, grant: TokenGrant) -> Self {
        let manager = Self::new(exchanger);
        manager.establish(grant);
        manager
    }

    /// Install a token obtained at authentication time.
    pub fn establish(&self, grant: TokenGrant) -> Arc<SessionToken> {
        let mut token = Arc::new(SessionToken::from_grant(grant));
        self.state.send_modify(|state| {
            Arc::make_mut(&mut token).version = state.version + 1;
            state.version = token.version;
            state.token = Some(Arc::clone(&token));
        });
        info!(version = token.version, "session established");
        token
    }

    /// Current token snapshot, if logged in.
    pub fn current(&self) -> Option<Arc<SessionToken>> {
        self.state.borrow().token.clone()
    }

    /// # Errors
    /// `TetherError::AuthenticationExpired` when there is no active session.
    pub fn require_current(&self) -> Result<Arc<SessionToken>> {
        self.current()
            .ok_or_else(|| TetherError::AuthenticationExpired("not logged in".into()))
    }

    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    /// Receiver notified every time a new token is published or the session
    /// is revoked.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Drop the session (logout / revocation).
    ///
    /// A refresh still in flight will not resurrect it.
    pub fn revoke(&self) {
        self.state.send_modify(|state| {
            state.token = None;
            state.version += 1;
        });
        info!("session revoked");
    }

    /// Exchange the refresh credential for a new access token.
    ///
    /// Concurrent callers share one exchange. The result is published only if
    /// no newer token appeared meanwhile; otherwise the newer token is
    /// returned.
    ///
    /// # Errors
    /// `AuthenticationExpired` without an active session, or whatever the
    /// exchange failed with (`RefreshCredentialInvalid` is fatal).
    pub async fn refresh(&self) -> Result<Arc<SessionToken>> {
        let (id, future) = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(flight) => {
                    debug!("joining refresh already in flight");
                    (flight.id, flight.future.clone())
                }
                None => {
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let future = self.exchange_future(id)?;
                    *slot = Some(InFlight { id, future: future.clone() });
                    (id, future)
                }
            }
        };

        let result = future.await;

        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|flight| flight.id == id) {
            *slot = None;
        }
        result
    }

    /// Refresh after a request was rejected while carrying token
    /// `observed_version`.
    ///
    /// Skips the exchange when a newer token has already been published.
    ///
    /// # Errors
    /// Same as [`refresh`](Self::refresh).
    #[instrument(skip(self))]
    pub async fn refresh_after_rejection(&self, observed_version: u64) -> Result<Arc<SessionToken>> {
        if let Some(current) = self.current() {
            if current.version > observed_version {
                debug!(current = current.version, "newer token already available");
                return Ok(current);
            }
        }
        self.refresh().await
    }

    /// Start exchange `id` on its own task.
    ///
    /// The exchange runs to completion and publishes even if every caller
    /// waiting on it goes away; it then frees the in-flight slot so the next
    /// refresh starts a fresh exchange.
    fn exchange_future(&self, id: u64) -> Result<RefreshFuture> {
        let base = self.require_current()?;
        let exchanger = Arc::clone(&self.exchanger);
        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);

        let task = tokio::spawn(async move {
            debug!(version = base.version, "exchanging refresh token");
            let result = match exchanger.exchange(&base.refresh_token).await {
                Ok(mut grant) => {
                    if grant.refresh_token.is_empty() {
                        grant.refresh_token.clone_from(&base.refresh_token);
                    }
                    publish(&state, base.version, grant)
                }
                Err(e) => {
                    warn!(error = %e, version = base.version, "token refresh failed");
                    Err(e)
                }
            };
            let mut slot = in_flight.lock();
            if slot.as_ref().is_some_and(|flight| flight.id == id) {
                *slot = None;
            }
            result
        });

        Ok(async move {
            task.await
                .unwrap_or_else(|e| Err(TetherError::Internal(format!("token refresh task failed: {e}"))))
        }
        .boxed()
        .shared())
    }
}

/// Compare-and-set: store `grant` as `base_version + 1` only if the session
/// is still at `base_version`.
fn publish(
    state: &watch::Sender<SessionState>,
    base_version: u64,
    grant: TokenGrant,
) -> Result<Arc<SessionToken>> {
    let mut published = None;
    state.send_if_modified(|current| {
        if current.version != base_version || current.token.is_none() {
            return false;
        }
        let token = Arc::new(SessionToken::versioned(grant, base_version + 1));
        current.version = token.version;
        current.token = Some(Arc::clone(&token));
        published = Some(token);
        true
    });

    if let Some(token) = published {
        info!(version = token.version, expires_at = %token.expires_at, "access token refreshed");
        return Ok(token);
    }

    let current = state.borrow().clone();
    match current.token {
        Some(newer) => {
            debug!(base_version, current = newer.version, "discarding stale refresh result");
            Ok(newer)
        }
        None => Err(TetherError::AuthenticationExpired("session revoked during refresh".into())),
    }
}
