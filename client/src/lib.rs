//! # pms-client
//!
//! Client core for the project management backend: the persisted auth
//! session, the REST gateway that every request flows through, client-side
//! form validation, and the `App` coordinator that ties them together.
//!
//! SYSTEM CONTEXT
//! ==============
//! Front ends (the `pms-cli` binary today) construct one `App` at start and
//! drop it at exit. Nothing in this crate is ambient global state: the
//! session store and the HTTP client are owned by the `App` and handed to
//! collaborators explicitly.

pub mod app;
pub mod config;
pub mod net;
pub mod state;
pub mod util;

#[cfg(test)]
mod test_support;

pub use app::{App, AppError, ConnectionReport, Route};
pub use config::{ClientConfig, ConfigError, RestorePolicy};
pub use net::api::ApiClient;
pub use net::error::ApiError;
pub use state::session::{AuthState, Session, SessionStore};
