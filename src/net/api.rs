//! Auth endpoint payloads for the token, refresh and current-user routes.
//!
//! ERROR HANDLING
//! ==============
//! Payload parsing is kept pure so the session store can stay focused on
//! state transitions. Shape mismatches surface as `GatewayError::Malformed`
//! rather than panics.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{FieldErrors, GatewayError, SessionError};
use super::types::{Credential, Identity};

pub(crate) const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check your credentials.";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

#[derive(Deserialize)]
struct RefreshedToken {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

pub(crate) fn login_payload(email: &str, password: &str) -> Value {
    serde_json::json!(LoginRequest { email, password })
}

pub(crate) fn refresh_payload(refresh_token: &str) -> Value {
    serde_json::json!(RefreshRequest { refresh: refresh_token })
}

/// `{access, refresh}` from the token endpoint.
pub(crate) fn parse_token_pair(body: Value) -> Result<Credential, GatewayError> {
    let pair: TokenPair =
        serde_json::from_value(body).map_err(|e| GatewayError::Malformed(format!("token pair: {e}")))?;
    if pair.access.is_empty() || pair.refresh.is_empty() {
        return Err(GatewayError::Malformed("token pair: empty token".to_owned()));
    }
    Ok(Credential::new(pair.access, pair.refresh))
}

/// `{access[, refresh]}` from the refresh endpoint, merged onto `previous`.
pub(crate) fn parse_refreshed(body: Value, previous: &Credential) -> Result<Credential, GatewayError> {
    let token: RefreshedToken =
        serde_json::from_value(body).map_err(|e| GatewayError::Malformed(format!("refreshed token: {e}")))?;
    if token.access.is_empty() {
        return Err(GatewayError::Malformed("refreshed token: empty access token".to_owned()));
    }
    let rotated = token.refresh.filter(|r| !r.is_empty());
    Ok(previous.rotated(token.access, rotated))
}

pub(crate) fn parse_identity(body: Value) -> Result<Identity, GatewayError> {
    serde_json::from_value(body).map_err(|e| GatewayError::Malformed(format!("identity: {e}")))
}

/// Message shown for a rejected login: the backend `detail`, else every
/// field message, else a generic hint.
pub(crate) fn login_failure_message(errors: &FieldErrors) -> String {
    if let Some(detail) = errors.detail() {
        return detail.to_owned();
    }
    if errors.is_empty() {
        return LOGIN_FAILED_MESSAGE.to_owned();
    }
    errors.flatten()
}

/// Map a token-endpoint failure onto the login error taxonomy.
pub(crate) fn login_error(error: GatewayError) -> SessionError {
    match error {
        GatewayError::Unauthorized(detail) => {
            SessionError::InvalidCredentials(detail.unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_owned()))
        }
        GatewayError::Rejected(errors) => SessionError::InvalidCredentials(login_failure_message(&errors)),
        other => other.into(),
    }
}
