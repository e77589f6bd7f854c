//! Session wire types shared by the gateway and the session store.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access/refresh token pair proving an authenticated session.
///
/// `Debug` is redacted so credentials never land in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

impl Credential {
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: refresh_token.into() }
    }

    /// Copy of this credential with a new access token. The refresh token is
    /// replaced only when the backend rotated it.
    #[must_use]
    pub fn rotated(&self, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// The authenticated user's profile, as returned by the current-user endpoint.
///
/// Deployments disagree on the exact shape; unknown fields are ignored and the
/// name fields default to empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Identity {
    /// Human-readable name, falling back to the email when no names are set.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() { self.email.clone() } else { full.to_owned() }
    }
}
