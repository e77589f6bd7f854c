//! Session store: credential lifecycle, identity resolution and expiry.
//!
//! SYSTEM CONTEXT
//! ==============
//! The store is the only component that mutates session state. Screens call
//! [`SessionStore::send`] for authorized backend calls, the route guard reads
//! [`SessionStore::guard`], and views subscribe to the watch channel returned
//! by [`SessionStore::subscribe`].
//!
//! DESIGN
//! ======
//! - The persisted credential is the source of truth; an in-memory copy tracks
//!   which credential this store last acted on so external writes (another
//!   process sharing the storage) can be detected by [`SessionStore::reconcile`].
//! - Identity is never persisted. It is re-fetched at startup and after every
//!   credential change.
//! - Identity fetches are single-flight: a caller that queued behind an
//!   in-flight fetch for the same access token receives that fetch's outcome.
//! - Token refresh is single-flight too: concurrent 401s trigger one refresh,
//!   later callers pick up the rotated token.
//!
//! TRADE-OFFS
//! ==========
//! A 401 carrying an access token that is no longer current is reported to
//! the caller but never tears down the newer session. A credential that cannot
//! be resolved to an identity is discarded, transient failures included, so
//! the store is never anonymous while still holding a token. Only a session
//! that is already authenticated rides out a transient refresh failure.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::auth::SessionState;
use super::storage::{CredentialStorage, FileStorage};
use crate::config::{ClientConfig, Endpoints, GuardMode, SessionOptions, UnauthorizedPolicy};
use crate::net::api;
use crate::net::error::{GatewayError, SessionError};
use crate::net::gateway::Gateway;
use crate::net::resources::{Resource, ResourceClient};
use crate::net::types::{Credential, Identity};
use crate::util::auth::{RouteDecision, route_decision};

/// Outcome of the most recent identity fetch, keyed by the access token it
/// was issued with.
#[derive(Default)]
struct IdentityFetch {
    last: Option<(String, Result<Identity, SessionError>)>,
}

pub struct SessionStore {
    gateway: Gateway,
    storage: Arc<dyn CredentialStorage>,
    options: SessionOptions,
    state: watch::Sender<SessionState>,
    credential: Mutex<Option<Credential>>,
    identity_fetch: tokio::sync::Mutex<IdentityFetch>,
    token_refresh: tokio::sync::Mutex<()>,
}

impl SessionStore {
    #[must_use]
    pub fn new(gateway: Gateway, storage: Arc<dyn CredentialStorage>, options: SessionOptions) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            gateway,
            storage,
            options,
            state,
            credential: Mutex::new(None),
            identity_fetch: tokio::sync::Mutex::new(IdentityFetch::default()),
            token_refresh: tokio::sync::Mutex::new(()),
        }
    }

    /// Store backed by file storage and a `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NetworkError`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, SessionError> {
        let storage: Arc<dyn CredentialStorage> =
            Arc::new(FileStorage::new(config.credentials_path.clone(), config.storage_keys.clone()));
        let gateway = Gateway::from_config(config, storage.clone())?;
        Ok(Self::new(gateway, storage, config.session_options()))
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Identity when authenticated. Never touches the network.
    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    /// Receiver that yields every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.options.endpoints
    }

    #[must_use]
    pub fn guard_mode(&self) -> GuardMode {
        self.options.guard_mode
    }

    /// Whether this store currently holds a credential in memory.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.cached().is_some()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Resolve the persisted credential: `Anonymous` when none is stored,
    /// otherwise `Authenticating` followed by an identity fetch.
    pub async fn start(&self) -> SessionState {
        let stored = self.load_or_none();
        let Some(credential) = stored else {
            *self.cached() = None;
            self.set_state(SessionState::Anonymous);
            return self.state();
        };
        *self.cached() = Some(credential);
        self.set_state(SessionState::Authenticating);
        if let Err(e) = self.refresh_identity().await {
            debug!(error = %e, "stored credential did not resolve to an identity");
        }
        self.state()
    }

    /// Exchange email/password for a credential, persist it, then resolve the
    /// identity.
    ///
    /// # Errors
    ///
    /// - [`SessionError::InvalidCredentials`] when the token endpoint rejects
    ///   the pair (backend `detail`, or the flattened field messages).
    /// - [`SessionError::NetworkError`] when the request got no response.
    /// - Any identity-fetch error once the credential has been issued.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, SessionError> {
        debug!(email, "login attempt");
        let body = self
            .gateway
            .send_as(Method::POST, &self.options.endpoints.token, Some(api::login_payload(email, password)), None)
            .await
            .map_err(api::login_error)?;
        let credential = api::parse_token_pair(body)?;

        self.storage.save(&credential)?;
        *self.cached() = Some(credential);
        self.set_state(SessionState::Authenticating);
        info!(email, "credential issued");
        self.refresh_identity().await
    }

    /// Drop the credential and identity. Safe to call in any state.
    pub fn logout(&self) {
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "failed to clear stored credential on logout");
        }
        *self.cached() = None;
        if self.set_state(SessionState::Anonymous) {
            info!("logged out");
        }
    }

    /// Re-fetch the identity with the persisted credential.
    ///
    /// Callers that queue behind an in-flight fetch for the same token get
    /// that fetch's result instead of issuing another request.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Unauthorized`] when no credential is stored or the
    ///   backend rejects it.
    /// - [`SessionError::Unavailable`] / [`SessionError::NetworkError`] on
    ///   transient failures. An authenticated session keeps its credential;
    ///   an unresolved one discards it and becomes `Anonymous`.
    pub async fn refresh_identity(&self) -> Result<Identity, SessionError> {
        // A held slot means a fetch is in flight; its outcome is joinable.
        let (mut slot, queued) = match self.identity_fetch.try_lock() {
            Ok(slot) => (slot, false),
            Err(_) => (self.identity_fetch.lock().await, true),
        };

        let Some(credential) = self.storage.load()? else {
            *self.cached() = None;
            self.set_state(SessionState::Anonymous);
            return Err(SessionError::Unauthorized);
        };

        if queued {
            if let Some((token, outcome)) = &slot.last {
                if *token == credential.access_token {
                    debug!("joined in-flight identity fetch");
                    return outcome.clone();
                }
            }
        }

        let token = credential.access_token.clone();
        let outcome = self.fetch_identity(credential).await;
        slot.last = Some((token, outcome.clone()));
        outcome
    }

    /// Converge with external writes to the persisted credential.
    ///
    /// A removal moves the session to `Anonymous`; a replaced access token
    /// re-resolves the identity.
    pub async fn reconcile(&self) -> SessionState {
        if self.state() == SessionState::Unknown {
            return self.start().await;
        }
        let stored = match self.storage.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "credential storage unreadable during reconcile");
                return self.state();
            }
        };
        let cached = self.cached().clone();
        if stored == cached {
            return self.state();
        }

        match (stored, cached) {
            (None, _) => {
                info!("credential removed externally");
                *self.cached() = None;
                self.set_state(SessionState::Anonymous);
            }
            (Some(stored), Some(cached)) if stored.access_token == cached.access_token => {
                debug!("refresh token rotated externally");
                *self.cached() = Some(stored);
            }
            (Some(stored), _) => {
                info!("credential replaced externally");
                *self.cached() = Some(stored);
                self.set_state(SessionState::Authenticating);
                if let Err(e) = self.refresh_identity().await {
                    debug!(error = %e, "replaced credential did not resolve to an identity");
                }
            }
        }
        self.state()
    }

    /// Poll storage and reconcile on every tick until the store is dropped.
    pub fn spawn_storage_watcher(store: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(store);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else {
                    debug!("session store dropped; storage watcher exiting");
                    break;
                };
                store.reconcile().await;
            }
        })
    }

    // =========================================================================
    // REQUESTS
    // =========================================================================

    /// Authorized call through the gateway. Sends unauthenticated when no
    /// credential is held, and applies the unauthorized policy on a 401.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Unauthorized`] when the session is missing or
    ///   expired; the session has been moved to `Anonymous` unless the 401
    ///   was for a superseded token.
    /// - [`SessionError::Rejected`] with the backend field messages verbatim.
    /// - [`SessionError::Unavailable`] / [`SessionError::NetworkError`].
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, SessionError> {
        self.reconcile().await;
        let credential = self.cached().clone();
        match credential {
            Some(credential) => self
                .dispatch(method, path, body, credential)
                .await
                .map(|(value, _)| value),
            None => Ok(self.gateway.send_as(method, path, body, None).await?),
        }
    }

    /// Create an account. Unauthenticated; does not log in.
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] carries the backend validation messages.
    pub async fn register(&self, payload: Value) -> Result<Value, SessionError> {
        Ok(self
            .gateway
            .send_as(Method::POST, &self.options.endpoints.register, Some(payload), None)
            .await?)
    }

    /// Route decision for a protected view under the configured guard mode.
    pub async fn guard(&self) -> RouteDecision {
        match self.options.guard_mode {
            GuardMode::TokenPresence => {
                let has_credential = self.load_or_none().is_some();
                route_decision(GuardMode::TokenPresence, &self.state(), has_credential)
            }
            GuardMode::VerifiedIdentity => {
                let state = self.reconcile().await;
                route_decision(GuardMode::VerifiedIdentity, &state, self.has_credential())
            }
        }
    }

    #[must_use]
    pub fn resource(&self, resource: Resource) -> ResourceClient<'_> {
        ResourceClient::new(self, resource)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    async fn fetch_identity(&self, credential: Credential) -> Result<Identity, SessionError> {
        *self.cached() = Some(credential.clone());
        if !self.state().is_authenticated() {
            self.set_state(SessionState::Authenticating);
        }

        let identity_path = self.options.endpoints.identity.clone();
        let outcome = match self.dispatch(Method::GET, &identity_path, None, credential.clone()).await {
            Ok((body, used)) => api::parse_identity(body)
                .map(|identity| (identity, used))
                .map_err(SessionError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((identity, used)) => {
                if !self.holds_token(&used) {
                    debug!("discarding identity fetched with a superseded credential");
                    return Err(SessionError::Unauthorized);
                }
                info!(user_id = identity.id, "session authenticated");
                self.set_state(SessionState::Authenticated(identity.clone()));
                Ok(identity)
            }
            Err(e @ (SessionError::Unavailable(_) | SessionError::NetworkError(_)))
                if self.state().is_authenticated() =>
            {
                warn!(error = %e, "identity refresh failed; keeping authenticated session");
                Err(e)
            }
            Err(SessionError::Unauthorized) => Err(SessionError::Unauthorized),
            Err(e) => {
                warn!(error = %e, "identity fetch failed; discarding credential");
                self.invalidate(&credential.access_token);
                Err(e)
            }
        }
    }

    /// Send with `credential`, applying the unauthorized policy. Returns the
    /// body and the access token that produced it.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        credential: Credential,
    ) -> Result<(Value, String), SessionError> {
        let retry_body = body.clone();
        match self
            .gateway
            .send_as(method.clone(), path, body, Some(&credential.access_token))
            .await
        {
            Ok(value) => return Ok((value, credential.access_token)),
            Err(GatewayError::Unauthorized(detail)) => {
                warn!(%method, path, detail = detail.as_deref().unwrap_or(""), "request unauthorized");
            }
            Err(e) => return Err(e.into()),
        }

        if self.options.unauthorized_policy == UnauthorizedPolicy::Logout {
            self.invalidate(&credential.access_token);
            return Err(SessionError::Unauthorized);
        }

        let rotated = self.refresh_access_token(&credential).await?;
        match self
            .gateway
            .send_as(method.clone(), path, retry_body, Some(&rotated.access_token))
            .await
        {
            Ok(value) => Ok((value, rotated.access_token)),
            Err(GatewayError::Unauthorized(_)) => {
                warn!(%method, path, "request unauthorized after token refresh");
                self.invalidate(&rotated.access_token);
                Err(SessionError::Unauthorized)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Exchange the refresh token for a new access token. Concurrent callers
    /// holding the same stale token share one refresh request.
    async fn refresh_access_token(&self, stale: &Credential) -> Result<Credential, SessionError> {
        let _refresh = self.token_refresh.lock().await;
        let current = self.cached().clone();
        match current {
            None => return Err(SessionError::Unauthorized),
            Some(current) if current.access_token != stale.access_token => {
                debug!("access token already rotated");
                return Ok(current);
            }
            Some(_) => {}
        }

        let outcome = self
            .gateway
            .send_as(
                Method::POST,
                &self.options.endpoints.refresh,
                Some(api::refresh_payload(&stale.refresh_token)),
                None,
            )
            .await
            .and_then(|body| api::parse_refreshed(body, stale));

        match outcome {
            Ok(rotated) => {
                let mut cached = self.cached();
                if cached.as_ref().is_none_or(|c| c.access_token != stale.access_token) {
                    return Err(SessionError::Unauthorized);
                }
                self.storage.save(&rotated)?;
                *cached = Some(rotated.clone());
                info!("access token refreshed");
                Ok(rotated)
            }
            Err(e @ GatewayError::Unavailable { .. }) => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                self.invalidate(&stale.access_token);
                Err(SessionError::Unauthorized)
            }
        }
    }

    /// End the session for `token` if it is still the current credential.
    /// Returns `false` when a newer credential has replaced it.
    fn invalidate(&self, token: &str) -> bool {
        let mut cached = self.cached();
        if cached.as_ref().is_some_and(|c| c.access_token != token) {
            debug!("ignoring auth failure for superseded token");
            return false;
        }
        match self.storage.load() {
            Ok(Some(stored)) if stored.access_token != token => {
                debug!("stored credential changed; leaving it for reconcile");
                return false;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "credential storage unreadable during invalidation"),
        }
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "failed to clear stored credential");
        }
        *cached = None;
        drop(cached);
        if self.set_state(SessionState::Anonymous) {
            info!("session expired");
        }
        true
    }

    fn holds_token(&self, token: &str) -> bool {
        self.cached().as_ref().is_some_and(|c| c.access_token == token)
    }

    fn load_or_none(&self) -> Option<Credential> {
        self.storage.load().unwrap_or_else(|e| {
            warn!(error = %e, "credential storage unreadable; treating as logged out");
            None
        })
    }

    fn cached(&self) -> MutexGuard<'_, Option<Credential>> {
        self.credential.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `next`; returns whether the state changed.
    fn set_state(&self, next: SessionState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(from = current.label(), to = next.label(), "session transition");
            *current = next;
            true
        })
    }
}
