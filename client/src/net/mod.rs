//! Networking modules for the REST gateway.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` is the only channel to the backend, `error` normalizes failures
//! into displayable messages, and `types` defines the wire schema.

pub mod api;
pub mod error;
pub mod types;
