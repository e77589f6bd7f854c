//! HTTP transport seam underneath the gateway.
//!
//! Thin `reqwest` wrapper that only moves bytes; status classification lives
//! in the gateway so it can be tested without a network.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde_json::Value;

use crate::config::Timeouts;

/// A fully resolved outgoing request.
#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Access token to send as `Authorization: Bearer <token>`.
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

/// Raw status and body of a backend response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self { status, body: body.to_string() }
    }
}

/// Failures that happen before a response is received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else {
            Self::Request(error.to_string())
        }
    }
}

/// Async transport trait. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ApiTransport: Send + Sync {
    /// Execute one request and return its raw response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response was received.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

// =============================================================================
// REQWEST TRANSPORT
// =============================================================================

pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with request and connect timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the TLS backend cannot be
    /// initialised.
    pub fn new(timeouts: Timeouts) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl ApiTransport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self.http.request(request.method, &request.url);
        if let Some(token) = &request.bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::Request(format!("invalid bearer token: {e}")))?;
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ApiResponse { status, body })
    }
}
