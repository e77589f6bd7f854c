//! Shared route-guard helpers.
//!
//! SYSTEM CONTEXT
//! ==============
//! Protected views apply identical unauthenticated redirect behavior, whether
//! they poll a decision through [`crate::SessionStore::guard`] or react to
//! state transitions through [`install_unauth_redirect`].

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::GuardMode;
use crate::state::auth::SessionState;

pub const LOGIN_ROUTE: &str = "/login";

/// What a protected view should do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// The session is still resolving; render a placeholder.
    Wait,
    RedirectToLogin,
}

/// `true` once the session has resolved and nobody is signed in.
#[must_use]
pub fn should_redirect_unauth(state: &SessionState) -> bool {
    matches!(state, SessionState::Anonymous)
}

#[must_use]
pub fn route_decision(mode: GuardMode, state: &SessionState, has_credential: bool) -> RouteDecision {
    match mode {
        GuardMode::TokenPresence if has_credential => RouteDecision::Allow,
        GuardMode::TokenPresence => RouteDecision::RedirectToLogin,
        GuardMode::VerifiedIdentity if state.is_authenticated() => RouteDecision::Allow,
        GuardMode::VerifiedIdentity if should_redirect_unauth(state) => RouteDecision::RedirectToLogin,
        GuardMode::VerifiedIdentity => RouteDecision::Wait,
    }
}

/// Call `navigate(LOGIN_ROUTE)` whenever the session settles as anonymous.
/// The task ends when the session store is dropped.
pub fn install_unauth_redirect<F>(mut state: watch::Receiver<SessionState>, navigate: F) -> JoinHandle<()>
where
    F: Fn(&str) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let redirect = should_redirect_unauth(&state.borrow_and_update());
            if redirect {
                debug!(route = LOGIN_ROUTE, "redirecting unauthenticated session");
                navigate(LOGIN_ROUTE);
            }
            if state.changed().await.is_err() {
                break;
            }
        }
    })
}
