//! HTTP handler modules.
//!
//! Handlers are thin: they parse the request, take the store lock or start a
//! session, and return JSON.

pub mod sheets;
pub mod terminal;
