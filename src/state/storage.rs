//! Durable credential storage.
//!
//! SYSTEM CONTEXT
//! ==============
//! The credential is the only shared mutable resource in the client. Several
//! processes (or several stores in one process) may point at the same
//! storage; writes are last-write-wins and readers re-load on every check, so
//! a logout in one context is visible to the others on their next read.
//!
//! Storage is a flat string map, like browser local storage: the access and
//! refresh tokens live under two fixed key names and unrelated keys are left
//! alone. Absence of either token key means "logged out".

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::net::types::Credential;

pub const DEFAULT_ACCESS_KEY: &str = "access_token";
pub const DEFAULT_REFRESH_KEY: &str = "refresh_token";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("credential storage I/O failed at {path}: {message}")]
    Io { path: String, message: String },
    #[error("credential storage at {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },
}

/// Key names the two tokens are stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub access: String,
    pub refresh: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self { access: DEFAULT_ACCESS_KEY.to_owned(), refresh: DEFAULT_REFRESH_KEY.to_owned() }
    }
}

impl StorageKeys {
    fn read(&self, entries: &BTreeMap<String, String>) -> Option<Credential> {
        let access = entries.get(&self.access).filter(|v| !v.is_empty())?;
        let refresh = entries.get(&self.refresh).filter(|v| !v.is_empty())?;
        Some(Credential::new(access.clone(), refresh.clone()))
    }

    fn write(&self, entries: &mut BTreeMap<String, String>, credential: &Credential) {
        entries.insert(self.access.clone(), credential.access_token.clone());
        entries.insert(self.refresh.clone(), credential.refresh_token.clone());
    }

    fn remove(&self, entries: &mut BTreeMap<String, String>) {
        entries.remove(&self.access);
        entries.remove(&self.refresh);
    }
}

/// Where the session store keeps the credential between runs.
pub trait CredentialStorage: Send + Sync {
    /// Current persisted credential, `None` when logged out.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the backing store cannot be read.
    fn load(&self) -> Result<Option<Credential>, StorageError>;

    /// Persist both tokens, replacing any previous credential.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the backing store cannot be written.
    fn save(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Remove both tokens. Clearing an empty store is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the backing store cannot be written.
    fn clear(&self) -> Result<(), StorageError>;
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// JSON string map on disk. Writes go through a temp file and a rename so a
/// concurrent reader never sees a half-written file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    keys: StorageKeys,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>, keys: StorageKeys) -> Self {
        Self { path: path.into(), keys }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(&e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(self.io_error(&e)),
            };
        }
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|e| self.io_error(&e))?;
        let rendered = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        // Each write gets its own temp file in the target directory, so
        // concurrent writers never share a staging path and rename stays atomic.
        let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(&e))?;
        staged.write_all(rendered.as_bytes()).map_err(|e| self.io_error(&e))?;
        staged.persist(&self.path).map_err(|e| self.io_error(&e.error))?;
        Ok(())
    }

    fn io_error(&self, error: &std::io::Error) -> StorageError {
        StorageError::Io { path: self.path.display().to_string(), message: error.to_string() }
    }
}

impl CredentialStorage for FileStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.keys.read(&self.read_entries()?))
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        // A corrupt file is replaced rather than blocking login.
        let mut entries = self.read_entries().unwrap_or_default();
        self.keys.write(&mut entries, credential);
        self.write_entries(&entries)?;
        debug!(path = %self.path.display(), "credential persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.read_entries().unwrap_or_default();
        self.keys.remove(&mut entries);
        self.write_entries(&entries)?;
        debug!(path = %self.path.display(), "credential cleared");
        Ok(())
    }
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

/// In-process storage. Clones share the same entries, so two stores built on
/// clones behave like two browser tabs on one local storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    keys: StorageKeys,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_keys(keys: StorageKeys) -> Self {
        Self { entries: Arc::default(), keys }
    }

    /// Write a raw entry, as unrelated code sharing the storage would.
    pub fn set_item(&self, key: &str, value: &str) {
        self.lock().insert(key.to_owned(), value.to_owned());
    }

    /// Remove a raw entry.
    pub fn remove_item(&self, key: &str) {
        self.lock().remove(key);
    }

    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.keys.read(&self.lock()))
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.keys.write(&mut self.lock(), credential);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.keys.remove(&mut self.lock());
        Ok(())
    }
}
