//! # siges-client
//!
//! Session-aware client for the SIGES school-management REST backend.
//!
//! The crate owns the authentication lifecycle (credential persistence,
//! identity resolution, expiry handling) and the single authenticated request
//! path every resource screen goes through. School, level, class and student
//! records stay opaque JSON; only the session layer is typed.
//!
//! - [`net`]: the request gateway, wire types and resource helpers.
//! - [`state`]: credential storage and the [`SessionStore`].
//! - [`util`]: route-guard decisions derived from session state.

pub mod config;
pub mod net;
pub mod state;
pub mod util;

#[cfg(test)]
mod test_helpers;

pub use config::{ClientConfig, ConfigError, Endpoints, GuardMode, SessionOptions, Timeouts, UnauthorizedPolicy};
pub use net::error::{FieldErrors, GatewayError, SessionError};
pub use net::gateway::Gateway;
pub use net::resources::{Resource, ResourceClient};
pub use net::types::{Credential, Identity};
pub use state::auth::SessionState;
pub use state::session::SessionStore;
pub use state::storage::{CredentialStorage, FileStorage, MemoryStorage, StorageError, StorageKeys};
pub use util::auth::RouteDecision;
