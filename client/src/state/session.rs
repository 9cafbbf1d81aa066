//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! The single source of truth for "is someone logged in, and who". The API
//! gateway reads the token from here for every request and clears it on a
//! 401; the `App` coordinator writes it on login/register and watches it to
//! decide navigation.
//!
//! DESIGN
//! ======
//! Token and profile live in one `Session` value, so memory can never hold a
//! token without a profile. Every mutation writes through to durable storage
//! first and publishes to subscribers second, both under one lock, so the
//! two never diverge after a completed call.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::storage::{SessionStorage, StorageError, TOKEN_KEY, USER_KEY};
use crate::config::RestorePolicy;
use crate::net::error::ApiError;
use crate::net::types::{ProfileUpdate, User};

/// An authenticated session: the bearer token and the profile it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Snapshot published to subscribers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthState {
    pub session: Option<Session>,
    /// True until the startup restore has finished.
    pub loading: bool,
}

impl AuthState {
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.token.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Where `restore` fetches the current profile from.
#[async_trait::async_trait]
pub trait ProfileSource: Send + Sync {
    async fn current_user(&self) -> Result<User, ApiError>;
}

/// Result of the startup restore.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing was stored; no request was made.
    NoSession,
    /// The server confirmed the token and the stored profile was refreshed.
    Restored,
    /// The fetch failed transiently and the lenient policy kept the stored session.
    Kept,
    /// The fetch failed and the session was torn down.
    LoggedOut,
}

pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    write_lock: Mutex<()>,
    state: watch::Sender<AuthState>,
}

impl SessionStore {
    /// Load whatever session durable storage holds.
    ///
    /// A token without a readable profile (or the reverse) is treated as
    /// corrupt: both keys are removed and the store starts logged out. So is
    /// storage whose contents cannot be parsed at all; it is wiped.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backing storage cannot be read or cleaned.
    pub fn open(storage: Arc<dyn SessionStorage>) -> Result<Self, StorageError> {
        let session = match load_session(storage.as_ref()) {
            Ok(session) => session,
            Err(StorageError::Json(err)) => {
                tracing::warn!(error = %err, "session storage is corrupt; clearing it");
                storage.clear()?;
                None
            }
            Err(err) => return Err(err),
        };
        let (state, _) = watch::channel(AuthState { session, loading: true });
        Ok(Self { storage, write_lock: Mutex::new(()), state })
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(ToOwned::to_owned)
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Persist and publish a new session. The token is trusted as-is.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if either key cannot be written; memory is
    /// left unchanged and the previously stored profile is put back.
    pub fn login(&self, token: String, user: User) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let raw_user = serde_json::to_string(&user)?;
        let previous_user = self.storage.get(USER_KEY)?;
        self.storage.set(USER_KEY, &raw_user)?;
        if let Err(err) = self.storage.set(TOKEN_KEY, &token) {
            let rollback = match &previous_user {
                Some(raw) => self.storage.set(USER_KEY, raw),
                None => self.storage.remove(USER_KEY),
            };
            if let Err(rollback_err) = rollback {
                tracing::error!(error = %rollback_err, "failed to restore stored profile after token write failed");
            }
            return Err(err);
        }
        tracing::info!(user_id = user.id, "session started");
        self.state.send_modify(|s| s.session = Some(Session { token, user }));
        Ok(())
    }

    /// Remove the session from storage and memory. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the keys cannot be removed; memory is still cleared.
    pub fn logout(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = self.storage.remove(TOKEN_KEY).and(self.storage.remove(USER_KEY));
        let cleared = self.state.send_if_modified(|s| s.session.take().is_some());
        if cleared {
            tracing::info!("session cleared");
        }
        removed
    }

    /// Merge `update` into the current profile and write it through.
    ///
    /// Returns `Ok(false)` without touching anything when no session is active.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the merged profile cannot be persisted.
    pub fn update_profile(&self, update: &ProfileUpdate) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mut user) = self.user() else {
            return Ok(false);
        };
        update.apply_to(&mut user);
        self.storage.set(USER_KEY, &serde_json::to_string(&user)?)?;
        self.state.send_modify(|s| {
            if let Some(session) = s.session.as_mut() {
                session.user = user;
            }
        });
        Ok(true)
    }

    /// Validate a stored session against the server once at startup.
    ///
    /// With no stored token nothing is fetched. On success the stored profile
    /// is replaced with the server's. On failure the session is torn down,
    /// except that [`RestorePolicy::Lenient`] keeps it through transport
    /// faults and 5xx responses. No retries either way.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if refreshing or clearing storage fails.
    pub async fn restore(
        &self,
        source: &dyn ProfileSource,
        policy: RestorePolicy,
    ) -> Result<RestoreOutcome, StorageError> {
        if !self.is_authenticated() {
            self.finish_loading();
            return Ok(RestoreOutcome::NoSession);
        }

        let outcome = match source.current_user().await {
            Ok(user) => {
                self.refresh_user(user)?;
                RestoreOutcome::Restored
            }
            Err(err) if policy == RestorePolicy::Lenient && err.is_transient() => {
                tracing::warn!(error = %err, "profile fetch failed at startup; keeping stored session");
                RestoreOutcome::Kept
            }
            Err(err) => {
                tracing::warn!(error = %err, "stored session rejected at startup; logging out");
                self.logout()?;
                RestoreOutcome::LoggedOut
            }
        };
        self.finish_loading();
        Ok(outcome)
    }

    fn refresh_user(&self, user: User) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // A concurrent 401 may have ended the session while the fetch was in flight.
        if !self.is_authenticated() {
            return Ok(());
        }
        self.storage.set(USER_KEY, &serde_json::to_string(&user)?)?;
        self.state.send_modify(|s| {
            if let Some(session) = s.session.as_mut() {
                session.user = user;
            }
        });
        Ok(())
    }

    fn finish_loading(&self) {
        self.state.send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }
}

fn load_session(storage: &dyn SessionStorage) -> Result<Option<Session>, StorageError> {
    let token = storage.get(TOKEN_KEY)?.filter(|t| !t.is_empty());
    let user = match storage.get(USER_KEY)? {
        Some(raw) => match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(error = %err, "stored profile is unreadable");
                None
            }
        },
        None => None,
    };

    match (token, user) {
        (Some(token), Some(user)) => Ok(Some(Session { token, user })),
        (None, None) => {
            // Clear a stray empty token or unreadable profile left behind.
            storage.remove(TOKEN_KEY)?;
            storage.remove(USER_KEY)?;
            Ok(None)
        }
        (token, _) => {
            tracing::warn!(has_token = token.is_some(), "stored session is incomplete; clearing it");
            storage.remove(TOKEN_KEY)?;
            storage.remove(USER_KEY)?;
            Ok(None)
        }
    }
}
