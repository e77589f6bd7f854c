//! Client-side session state.
//!
//! DESIGN
//! ======
//! `auth` is the observable session state, `storage` persists the credential,
//! and `session` is the store that drives transitions between them.

pub mod auth;
pub mod session;
pub mod storage;
