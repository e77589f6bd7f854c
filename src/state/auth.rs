//! Auth-session state for the current client user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Published by the session store on a watch channel; route guards and
//! identity-aware views subscribe to it to coordinate login redirects.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use crate::net::types::Identity;

/// Where the session is in its lifecycle.
///
/// `Unknown` only exists between process start and the first storage check;
/// `Authenticating` covers the identity fetch for a stored or fresh credential.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unknown,
    Authenticating,
    Authenticated(Identity),
    Anonymous,
}

impl SessionState {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// `true` once the session has resolved to either outcome.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Authenticated(_) | Self::Anonymous)
    }

    /// Short label for logs and CLI output.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Authenticating => "authenticating",
            Self::Authenticated(_) => "authenticated",
            Self::Anonymous => "anonymous",
        }
    }
}
