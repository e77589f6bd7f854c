//! Networking modules for the authenticated REST boundary.
//!
//! SYSTEM CONTEXT
//! ==============
//! `gateway` is the single chokepoint for backend calls, `transport` is the
//! mockable HTTP seam underneath it, `api` holds auth endpoint payloads,
//! `resources` wraps the CRUD collections, and `types`/`error` define the
//! shared wire schema and failure taxonomy.

pub mod api;
pub mod error;
pub mod gateway;
pub mod resources;
pub mod transport;
pub mod types;
