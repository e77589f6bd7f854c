//! Client configuration parsed from environment variables.
//!
//! Every knob has a default matching the stock SIGES Django deployment, so an
//! empty environment yields a working local setup against `localhost:8000`.

use std::path::PathBuf;
use std::str::FromStr;

use crate::state::storage::StorageKeys;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TOKEN_PATH: &str = "/api/token/";
pub const DEFAULT_REFRESH_PATH: &str = "/api/token/refresh/";
pub const DEFAULT_IDENTITY_PATH: &str = "/api/users/me/";
pub const DEFAULT_REGISTER_PATH: &str = "/api/users/register/";
pub const DEFAULT_RESOURCE_PREFIX: &str = "/api/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

/// Errors produced while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set to a value that cannot be parsed.
    #[error("invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// What the session does when an authorized request comes back 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnauthorizedPolicy {
    /// The first 401 ends the session.
    #[default]
    Logout,
    /// Exchange the refresh token once, reissue the request, and end the
    /// session only if that also fails.
    RefreshThenLogout,
}

impl FromStr for UnauthorizedPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "logout" => Ok(Self::Logout),
            "refresh" | "refresh_then_logout" => Ok(Self::RefreshThenLogout),
            other => Err(format!("unknown unauthorized policy '{other}' (expected 'logout' or 'refresh')")),
        }
    }
}

/// How protected views decide whether to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardMode {
    /// Wait for the identity fetch and redirect only once the session is
    /// known to be anonymous.
    #[default]
    VerifiedIdentity,
    /// Allow whenever a credential is stored; redirect instantly otherwise.
    TokenPresence,
}

impl FromStr for GuardMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "verified" | "verified_identity" => Ok(Self::VerifiedIdentity),
            "token" | "token_presence" => Ok(Self::TokenPresence),
            other => Err(format!("unknown guard mode '{other}' (expected 'verified' or 'token')")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

/// Backend paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub token: String,
    pub refresh: String,
    pub identity: String,
    pub register: String,
    pub resource_prefix: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            token: DEFAULT_TOKEN_PATH.to_owned(),
            refresh: DEFAULT_REFRESH_PATH.to_owned(),
            identity: DEFAULT_IDENTITY_PATH.to_owned(),
            register: DEFAULT_REGISTER_PATH.to_owned(),
            resource_prefix: DEFAULT_RESOURCE_PREFIX.to_owned(),
        }
    }
}

/// Subset of the configuration the session store needs at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionOptions {
    pub endpoints: Endpoints,
    pub unauthorized_policy: UnauthorizedPolicy,
    pub guard_mode: GuardMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    pub timeouts: Timeouts,
    pub unauthorized_policy: UnauthorizedPolicy,
    pub guard_mode: GuardMode,
    pub credentials_path: PathBuf,
    pub storage_keys: StorageKeys,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            endpoints: Endpoints::default(),
            timeouts: Timeouts::default(),
            unauthorized_policy: UnauthorizedPolicy::default(),
            guard_mode: GuardMode::default(),
            credentials_path: default_credentials_path(std::env::var("HOME").ok()),
            storage_keys: StorageKeys::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `SIGES_BASE_URL`: default `http://localhost:8000`
    /// - `SIGES_TOKEN_PATH`, `SIGES_REFRESH_PATH`, `SIGES_IDENTITY_PATH`,
    ///   `SIGES_REGISTER_PATH`, `SIGES_RESOURCE_PREFIX`: backend routes
    /// - `SIGES_REQUEST_TIMEOUT_SECS`: default 30
    /// - `SIGES_CONNECT_TIMEOUT_SECS`: default 10
    /// - `SIGES_UNAUTHORIZED_POLICY`: `logout` (default) or `refresh`
    /// - `SIGES_GUARD_MODE`: `verified` (default) or `token`
    /// - `SIGES_CREDENTIALS_PATH`: default `$HOME/.siges/credentials.json`
    /// - `SIGES_ACCESS_TOKEN_KEY`, `SIGES_REFRESH_TOKEN_KEY`: storage key names
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a numeric or enum variable does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a numeric or enum variable does
    /// not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let path_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_owned());

        let base_url = path_or("SIGES_BASE_URL", DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_owned();
        let endpoints = Endpoints {
            token: path_or("SIGES_TOKEN_PATH", DEFAULT_TOKEN_PATH),
            refresh: path_or("SIGES_REFRESH_PATH", DEFAULT_REFRESH_PATH),
            identity: path_or("SIGES_IDENTITY_PATH", DEFAULT_IDENTITY_PATH),
            register: path_or("SIGES_REGISTER_PATH", DEFAULT_REGISTER_PATH),
            resource_prefix: path_or("SIGES_RESOURCE_PREFIX", DEFAULT_RESOURCE_PREFIX),
        };
        let timeouts = Timeouts {
            request_secs: parse_var(
                "SIGES_REQUEST_TIMEOUT_SECS",
                var("SIGES_REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            connect_secs: parse_var(
                "SIGES_CONNECT_TIMEOUT_SECS",
                var("SIGES_CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
        };
        let unauthorized_policy =
            parse_var("SIGES_UNAUTHORIZED_POLICY", var("SIGES_UNAUTHORIZED_POLICY"), UnauthorizedPolicy::default())?;
        let guard_mode = parse_var("SIGES_GUARD_MODE", var("SIGES_GUARD_MODE"), GuardMode::default())?;
        let credentials_path = var("SIGES_CREDENTIALS_PATH")
            .map_or_else(|| default_credentials_path(var("HOME")), PathBuf::from);
        let defaults = StorageKeys::default();
        let storage_keys = StorageKeys {
            access: var("SIGES_ACCESS_TOKEN_KEY").unwrap_or(defaults.access),
            refresh: var("SIGES_REFRESH_TOKEN_KEY").unwrap_or(defaults.refresh),
        };

        Ok(Self { base_url, endpoints, timeouts, unauthorized_policy, guard_mode, credentials_path, storage_keys })
    }

    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            endpoints: self.endpoints.clone(),
            unauthorized_policy: self.unauthorized_policy,
            guard_mode: self.guard_mode,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var: name, value }),
    }
}

fn default_credentials_path(home: Option<String>) -> PathBuf {
    match home {
        Some(home) => PathBuf::from(home).join(".siges").join(DEFAULT_CREDENTIALS_FILE),
        None => PathBuf::from(DEFAULT_CREDENTIALS_FILE),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
