//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const SESSION_DIR: &str = ".pms";
pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// What `SessionStore::restore` does when the startup profile fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestorePolicy {
    /// Any failure ends the session, including network blips.
    #[default]
    Strict,
    /// Transport faults and 5xx keep the stored session; everything else ends it.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub session_file: PathBuf,
    pub restore_policy: RestorePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session_file: default_session_file(std::env::var_os("HOME").map(PathBuf::from)),
            restore_policy: RestorePolicy::Strict,
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `PMS_API_URL`: default `http://localhost:8000`
    /// - `PMS_REQUEST_TIMEOUT_SECS`: default 10
    /// - `PMS_SESSION_FILE`: default `$HOME/.pms/session.json`
    /// - `PMS_RESTORE_POLICY`: `strict` (default) or `lenient`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = std::env::var("PMS_API_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or(defaults.api_url, |v| normalize_base_url(&v));

        let request_timeout = match std::env::var("PMS_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(parse_timeout_secs(&raw)?),
            Err(_) => defaults.request_timeout,
        };

        let session_file = std::env::var_os("PMS_SESSION_FILE")
            .filter(|v| !v.is_empty())
            .map_or(defaults.session_file, PathBuf::from);

        let restore_policy = parse_restore_policy(std::env::var("PMS_RESTORE_POLICY").ok().as_deref())?;

        Ok(Self { api_url, request_timeout, session_file, restore_policy })
    }

    /// Override the base URL, trimming any trailing slash.
    #[must_use]
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = normalize_base_url(api_url);
        self
    }

    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn default_session_file(home: Option<PathBuf>) -> PathBuf {
    home.unwrap_or_else(|| PathBuf::from("."))
        .join(SESSION_DIR)
        .join(SESSION_FILE)
}

fn parse_timeout_secs(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::Invalid { var: "PMS_REQUEST_TIMEOUT_SECS", value: raw.to_owned() }),
    }
}

pub(crate) fn parse_restore_policy(raw: Option<&str>) -> Result<RestorePolicy, ConfigError> {
    match raw.map(str::trim).unwrap_or("strict") {
        "" | "strict" => Ok(RestorePolicy::Strict),
        "lenient" => Ok(RestorePolicy::Lenient),
        other => Err(ConfigError::Invalid { var: "PMS_RESTORE_POLICY", value: other.to_owned() }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
