//! Application coordinator: owns the session and the gateway for one run.
//!
//! ARCHITECTURE
//! ============
//! `App::start` is the one place the session store, the durable storage and
//! the HTTP client are created; `App::shutdown` is where they go away. Front
//! ends talk to the `App`, never to ambient globals.
//!
//! The gateway reports a rejected token as `ApiError::Unauthorized` (after
//! clearing the session). Turning that into navigation happens here, in
//! `guard`, so no lower layer touches the current route.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::config::{ClientConfig, ConfigError, RestorePolicy};
use crate::net::api::ApiClient;
use crate::net::error::ApiError;
use crate::net::types::{ArchiveResult, Board, BoardDetail, BoardList, BoardPatch, Id, ProfileUpdate, User};
use crate::state::session::{AuthState, RestoreOutcome, SessionStore};
use crate::state::storage::{FileStorage, SessionStorage, StorageError};
use crate::util::validation::{BoardForm, LoginForm, RegisterForm, ValidationErrors, validate_board_patch};

/// Where the front end should be: the login entry point or the signed-in area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_unauthorized())
    }
}

/// Outcome of the backend and database checks.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionReport {
    pub backend: Result<Value, String>,
    pub database: Result<Value, String>,
}

impl ConnectionReport {
    pub fn is_healthy(&self) -> bool {
        self.backend.is_ok() && self.database.is_ok()
    }
}

pub struct App {
    config: ClientConfig,
    session: Arc<SessionStore>,
    api: ApiClient,
    route: watch::Sender<Route>,
    restore: RestoreOutcome,
}

impl App {
    /// Open the session file named by `config`, then build and restore.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the session file cannot be read or the HTTP client cannot be built.
    pub async fn start(config: ClientConfig) -> Result<Self, AppError> {
        let storage = Arc::new(FileStorage::new(config.session_file.clone()));
        Self::start_with_storage(config, storage).await
    }

    /// Build the app over an explicit storage backend and validate any stored session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if storage fails or the HTTP client cannot be built.
    pub async fn start_with_storage(config: ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self, AppError> {
        let session = Arc::new(SessionStore::open(storage)?);
        let api = ApiClient::new(&config, session.clone())?;
        let restore = session.restore(&api, config.restore_policy).await?;
        let initial = if session.is_authenticated() { Route::Dashboard } else { Route::Login };
        let (route, _) = watch::channel(initial);
        tracing::debug!(?restore, route = ?initial, api_url = %config.api_url, "app started");
        Ok(Self { config, session, api, route, restore })
    }

    /// End the run. Durable state is already written through, so this only drops handles.
    pub fn shutdown(self) {
        tracing::debug!("app shut down");
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.current()
    }

    pub fn subscribe_auth(&self) -> watch::Receiver<AuthState> {
        self.session.subscribe()
    }

    pub fn restore_outcome(&self) -> RestoreOutcome {
        self.restore
    }

    pub fn restore_policy(&self) -> RestorePolicy {
        self.config.restore_policy
    }

    pub fn route(&self) -> Route {
        *self.route.borrow()
    }

    pub fn subscribe_route(&self) -> watch::Receiver<Route> {
        self.route.subscribe()
    }

    pub fn navigate(&self, route: Route) {
        self.route.send_if_modified(|current| {
            let changed = *current != route;
            *current = route;
            changed
        });
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// Validate, register, start the session and go to the dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] before any request when the form is invalid,
    /// otherwise the gateway or storage error.
    pub async fn register(&self, form: &RegisterForm) -> Result<User, AppError> {
        let request = form.validate()?;
        let payload = self.guard(self.api.register(&request).await)?;
        self.session.login(payload.token, payload.user.clone())?;
        self.navigate(Route::Dashboard);
        Ok(payload.user)
    }

    /// Validate, log in, start the session and go to the dashboard.
    ///
    /// # Errors
    ///
    /// Same as [`App::register`].
    pub async fn login(&self, form: &LoginForm) -> Result<User, AppError> {
        let request = form.validate()?;
        let payload = self.guard(self.api.login(&request).await)?;
        self.session.login(payload.token, payload.user.clone())?;
        self.navigate(Route::Dashboard);
        Ok(payload.user)
    }

    /// End the session and go to the login screen.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the stored keys cannot be removed.
    pub fn logout(&self) -> Result<(), AppError> {
        let result = self.session.logout();
        self.navigate(Route::Login);
        Ok(result?)
    }

    /// Merge profile fields into the current session; `false` when logged out.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the profile cannot be persisted.
    pub fn update_profile(&self, update: &ProfileUpdate) -> Result<bool, AppError> {
        Ok(self.session.update_profile(update)?)
    }

    // =========================================================================
    // BOARDS
    // =========================================================================

    /// # Errors
    ///
    /// Returns the normalized gateway error; on 401 the route is already `Login`.
    pub async fn list_boards(&self) -> Result<BoardList, AppError> {
        self.guard(self.api.list_boards().await)
    }

    /// # Errors
    ///
    /// Returns the normalized gateway error; on 401 the route is already `Login`.
    pub async fn board(&self, id: Id) -> Result<BoardDetail, AppError> {
        self.guard(self.api.board(id).await)
    }

    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a blank name, otherwise the gateway error.
    pub async fn create_board(&self, form: &BoardForm) -> Result<Board, AppError> {
        let input = form.validate()?;
        self.guard(self.api.create_board(&input).await)
    }

    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when `patch.name` is present but blank,
    /// otherwise the gateway error.
    pub async fn update_board(&self, id: Id, patch: &BoardPatch) -> Result<Board, AppError> {
        validate_board_patch(patch)?;
        self.guard(self.api.update_board(id, patch).await)
    }

    /// # Errors
    ///
    /// Returns the normalized gateway error; on 401 the route is already `Login`.
    pub async fn delete_board(&self, id: Id, archive: bool) -> Result<ArchiveResult, AppError> {
        self.guard(self.api.delete_board(id, archive).await)
    }

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    /// Probe `/health` and `/api/test/db` concurrently.
    pub async fn check_connection(&self) -> ConnectionReport {
        let (backend, database) = tokio::join!(self.api.health(), self.api.db_check());
        ConnectionReport {
            backend: backend.map_err(|e| e.to_string()),
            database: database.map_err(|e| e.to_string()),
        }
    }

    /// Send the user to the login screen when the gateway reported a rejected token.
    fn guard<T>(&self, result: Result<T, ApiError>) -> Result<T, AppError> {
        if let Err(err) = &result
            && err.is_unauthorized()
        {
            self.navigate(Route::Login);
        }
        Ok(result?)
    }
}
