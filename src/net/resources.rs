//! CRUD helpers for the backend's resource collections.
//!
//! Records stay opaque JSON; these helpers only build paths and route every
//! call through [`SessionStore::send`] so the unauthorized policy applies.

#[cfg(test)]
#[path = "resources_test.rs"]
mod resources_test;

use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde_json::Value;

use super::error::SessionError;
use crate::state::session::SessionStore;

/// Backend collections exposed to the admin screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Schools,
    Levels,
    Classes,
    Students,
    Users,
    Roles,
}

impl Resource {
    pub const ALL: [Self; 6] = [Self::Schools, Self::Levels, Self::Classes, Self::Students, Self::Users, Self::Roles];

    /// Collection path segment, with the trailing slash DRF routers expect.
    #[must_use]
    pub fn segment(self) -> &'static str {
        match self {
            Self::Schools => "schools/",
            Self::Levels => "levels/",
            Self::Classes => "classes/",
            Self::Students => "students/",
            Self::Users => "users/",
            Self::Roles => "roles/",
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.segment().trim_end_matches('/')
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().trim_end_matches('/').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|resource| resource.name() == wanted)
            .ok_or_else(|| format!("unknown resource: {raw}"))
    }
}

/// Collection path under `prefix`, e.g. `/api/schools/`.
pub(crate) fn collection_path(prefix: &str, resource: Resource) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), resource.segment())
}

/// Record path under `prefix`, e.g. `/api/schools/7/`.
pub(crate) fn record_path(prefix: &str, resource: Resource, id: &str) -> String {
    format!("{}{}/", collection_path(prefix, resource), id.trim_matches('/'))
}

/// Records from a list response: a bare array, or a paginated
/// `{"results": [...]}` envelope.
pub(crate) fn list_items(body: Value) -> Result<Vec<Value>, SessionError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(SessionError::Malformed("list response has no results array".to_owned())),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(SessionError::Malformed(format!("unexpected list response: {other}"))),
    }
}

/// One collection, bound to a session store.
pub struct ResourceClient<'a> {
    store: &'a SessionStore,
    resource: Resource,
}

impl<'a> ResourceClient<'a> {
    pub(crate) fn new(store: &'a SessionStore, resource: Resource) -> Self {
        Self { store, resource }
    }

    #[must_use]
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// # Errors
    ///
    /// Any [`SessionError`] from the authorized send, or
    /// [`SessionError::Malformed`] when the body is not a list.
    pub async fn list(&self) -> Result<Vec<Value>, SessionError> {
        let body = self.store.send(Method::GET, &self.collection(), None).await?;
        list_items(body)
    }

    /// # Errors
    ///
    /// Any [`SessionError`] from the authorized send.
    pub async fn get(&self, id: &str) -> Result<Value, SessionError> {
        self.store.send(Method::GET, &self.record(id), None).await
    }

    /// # Errors
    ///
    /// [`SessionError::Rejected`] carries field-level validation messages.
    pub async fn create(&self, record: Value) -> Result<Value, SessionError> {
        self.store.send(Method::POST, &self.collection(), Some(record)).await
    }

    /// Partial update (`PATCH`).
    ///
    /// # Errors
    ///
    /// [`SessionError::Rejected`] carries field-level validation messages.
    pub async fn update(&self, id: &str, changes: Value) -> Result<Value, SessionError> {
        self.store.send(Method::PATCH, &self.record(id), Some(changes)).await
    }

    /// # Errors
    ///
    /// Any [`SessionError`] from the authorized send.
    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        self.store.send(Method::DELETE, &self.record(id), None).await?;
        Ok(())
    }

    fn collection(&self) -> String {
        collection_path(&self.store.endpoints().resource_prefix, self.resource)
    }

    fn record(&self, id: &str) -> String {
        record_path(&self.store.endpoints().resource_prefix, self.resource, id)
    }
}
