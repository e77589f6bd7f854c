//! Authenticated request gateway.
//!
//! ARCHITECTURE
//! ============
//! Every backend call goes through [`Gateway::send_as`]: it resolves the URL,
//! attaches the bearer token when one is supplied, issues the request exactly
//! once, and classifies the outcome. [`Gateway::send`] reads the token from
//! credential storage for callers that do not hold a session store.
//!
//! TRADE-OFFS
//! ==========
//! The gateway never retries and never touches session state on a 401; it
//! reports `Unauthorized` and leaves the decision to the session store. That
//! keeps a burst of concurrent 401s from each tearing the session down.

#[cfg(test)]
#[path = "gateway_test.rs"]
mod gateway_test;

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{FieldErrors, GatewayError};
use super::transport::{ApiRequest, ApiTransport, HttpTransport};
use crate::config::ClientConfig;
use crate::state::storage::CredentialStorage;

const TOKEN_NOT_VALID: &str = "token_not_valid";

pub struct Gateway {
    base_url: String,
    transport: Arc<dyn ApiTransport>,
    credentials: Arc<dyn CredentialStorage>,
}

impl Gateway {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn ApiTransport>,
        credentials: Arc<dyn CredentialStorage>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { base_url, transport, credentials }
    }

    /// Build a gateway backed by `reqwest` with the configured timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig, credentials: Arc<dyn CredentialStorage>) -> Result<Self, GatewayError> {
        let transport = HttpTransport::new(config.timeouts)
            .map_err(|e| GatewayError::Unavailable { status: None, message: e.to_string() })?;
        Ok(Self::new(config.base_url.clone(), Arc::new(transport), credentials))
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Send with whatever credential storage currently holds.
    ///
    /// # Errors
    ///
    /// See [`Gateway::send_as`].
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, GatewayError> {
        let credential = match self.credentials.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "credential storage unreadable, sending unauthenticated");
                None
            }
        };
        let bearer = credential.as_ref().map(|c| c.access_token.as_str());
        self.send_as(method, path, body, bearer).await
    }

    /// Send with an explicit bearer token (`None` sends unauthenticated).
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Unauthorized`] on 401 or a `token_not_valid` 4xx.
    /// - [`GatewayError::Rejected`] on any other 4xx, with field messages verbatim.
    /// - [`GatewayError::Unavailable`] on 5xx or when no response arrives.
    pub async fn send_as(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        bearer: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let request = ApiRequest {
            method: method.clone(),
            url: self.url(path),
            bearer: bearer.map(ToOwned::to_owned),
            body,
        };
        debug!(%method, path, authenticated = bearer.is_some(), "gateway send");

        let response = self.transport.execute(request).await.map_err(|e| {
            warn!(%method, path, error = %e, "gateway transport failure");
            GatewayError::Unavailable { status: None, message: e.to_string() }
        })?;

        let outcome = classify_response(response.status, &response.body);
        if let Err(e) = &outcome {
            debug!(%method, path, status = response.status, error = %e, "gateway call failed");
        }
        outcome
    }
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_owned();
    }
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map a raw status/body pair onto the gateway's outcome taxonomy.
pub(crate) fn classify_response(status: u16, body: &str) -> Result<Value, GatewayError> {
    let value = parse_body(body);
    match status {
        200..=299 => Ok(value),
        401 => Err(GatewayError::Unauthorized(detail_of(&value))),
        400..=499 if is_token_invalid(&value) => Err(GatewayError::Unauthorized(detail_of(&value))),
        400..=499 => Err(GatewayError::Rejected(FieldErrors::from_body(&value))),
        _ => Err(GatewayError::Unavailable {
            status: Some(status),
            message: detail_of(&value).unwrap_or_else(|| format!("status {status}")),
        }),
    }
}

fn parse_body(body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_owned()))
}

fn detail_of(value: &Value) -> Option<String> {
    value
        .get("detail")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

fn is_token_invalid(value: &Value) -> bool {
    value.get("code").and_then(Value::as_str) == Some(TOKEN_NOT_VALID)
}
