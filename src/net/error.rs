//! Failure taxonomy for the gateway and the session store.
//!
//! ERROR HANDLING
//! ==============
//! The gateway only classifies (`GatewayError`); it never mutates session
//! state. The session store converts gateway failures into `SessionError`
//! after applying its unauthorized policy, so callers see one taxonomy:
//! `InvalidCredentials`, `Unauthorized`, `Rejected`, `Unavailable`,
//! `NetworkError`.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::storage::StorageError;

/// Key DRF uses for errors that are not tied to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

// =============================================================================
// FIELD ERRORS
// =============================================================================

/// Backend validation messages keyed by field name.
///
/// Messages are kept verbatim and in backend order so screens can render them
/// without reinterpretation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a DRF-style error body: `{field: [msg, ...]}`.
    ///
    /// A scalar value under a field becomes a single message; a bare string
    /// body lands under [`NON_FIELD_ERRORS`].
    #[must_use]
    pub fn from_body(body: &Value) -> Self {
        let mut errors = Self::new();
        match body {
            Value::Object(map) => {
                for (field, value) in map {
                    errors
                        .0
                        .insert(field.clone(), message_list(value));
                }
            }
            Value::Null => {}
            Value::String(text) if text.trim().is_empty() => {}
            other => {
                errors
                    .0
                    .insert(NON_FIELD_ERRORS.to_owned(), message_list(other));
            }
        }
        errors
    }

    /// Append a message under `field`.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The first `detail` message, which DRF uses for non-validation errors
    /// such as failed logins.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.get("detail")
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// Single-line rendering: `field: msg1, msg2; other: msg3`.
    #[must_use]
    pub fn flatten(&self) -> String {
        self.0
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("no details")
        } else {
            f.write_str(&self.flatten())
        }
    }
}

fn message_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(message_text).collect(),
        Value::Null => Vec::new(),
        other => vec![message_text(other)],
    }
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// GATEWAY ERROR
// =============================================================================

/// Classified outcome of a failed gateway call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// 401, or a 4xx carrying the `token_not_valid` code. Carries the
    /// backend's `detail` message when present.
    #[error("unauthorized: {}", .0.as_deref().unwrap_or("token missing or expired"))]
    Unauthorized(Option<String>),

    /// Any other 4xx, with the backend's field-keyed messages.
    #[error("request rejected: {0}")]
    Rejected(FieldErrors),

    /// 5xx (`status` set) or a transport failure before any response
    /// (`status` is `None`).
    #[error("backend unavailable: {message}")]
    Unavailable { status: Option<u16>, message: String },

    /// 2xx whose body does not have the expected shape.
    #[error("unexpected response body: {0}")]
    Malformed(String),
}

// =============================================================================
// SESSION ERROR
// =============================================================================

/// Errors surfaced by [`crate::SessionStore`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The token endpoint rejected the email/password pair.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The session is missing or expired; the caller should show the login view.
    #[error("session expired or missing, please log in")]
    Unauthorized,

    #[error("request rejected: {0}")]
    Rejected(FieldErrors),

    /// The backend answered with a server error.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The request never got a response (timeout, DNS, refused connection).
    #[error("network error: {0}")]
    NetworkError(String),

    #[error("unexpected response body: {0}")]
    Malformed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<GatewayError> for SessionError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Unauthorized(_) => Self::Unauthorized,
            GatewayError::Rejected(errors) => Self::Rejected(errors),
            GatewayError::Unavailable { status: None, message } => Self::NetworkError(message),
            GatewayError::Unavailable { status: Some(status), message } => {
                Self::Unavailable(format!("HTTP {status}: {message}"))
            }
            GatewayError::Malformed(message) => Self::Malformed(message),
        }
    }
}
