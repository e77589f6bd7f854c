//! Helpers derived from session state for view layers.

pub mod auth;
