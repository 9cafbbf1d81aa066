//! Gateway error taxonomy and human-readable message normalization.
//!
//! ERROR HANDLING
//! ==============
//! Every failed request collapses into one [`ApiError`] whose `Display` is
//! the message a front end shows verbatim. A 401 gets its own variant so the
//! coordinator can react to it without string matching.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use serde_json::Value;

use crate::state::storage::StorageError;

/// Shown when neither the server nor the transport produced a message.
pub const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server rejected the bearer token. The session has already been cleared.
    #[error("{message}")]
    Unauthorized { message: String },

    /// Any other non-success HTTP status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (connect failure, timeout, broken body).
    #[error("{message}")]
    Transport { message: String, timed_out: bool },

    /// A 2xx response whose body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),

    /// The session could not be written through to durable storage.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// HTTP status carried by the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether the failure says nothing about the validity of the session.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { status: 500..=599, .. })
    }

    /// Build the error for a non-success response from its status and (possibly empty) body.
    pub(crate) fn from_response(status: u16, body: Option<&Value>) -> Self {
        let message = extract_error_message(body, Some(&status_failed_message(status)));
        if status == 401 {
            Self::Unauthorized { message }
        } else {
            Self::Status { status, message }
        }
    }

    pub(crate) fn from_transport(err: &reqwest::Error, timeout_ms: u128) -> Self {
        let timed_out = err.is_timeout();
        let transport = if timed_out { timeout_message(timeout_ms) } else { err.to_string() };
        Self::Transport { message: extract_error_message(None, Some(&transport)), timed_out }
    }
}

/// Pick the message to surface for a failed request.
///
/// Order: `body.error.message`, then `body.message`, then the transport-level
/// message, then [`DEFAULT_ERROR_MESSAGE`]. Blank strings count as absent.
pub fn extract_error_message(body: Option<&Value>, transport: Option<&str>) -> String {
    body.and_then(|b| b.pointer("/error/message"))
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            body.and_then(|b| b.get("message"))
                .and_then(Value::as_str)
                .filter(|m| !m.trim().is_empty())
        })
        .or_else(|| transport.filter(|m| !m.trim().is_empty()))
        .unwrap_or(DEFAULT_ERROR_MESSAGE)
        .to_owned()
}

pub(crate) fn status_failed_message(status: u16) -> String {
    format!("request failed with status code {status}")
}

pub(crate) fn timeout_message(timeout_ms: u128) -> String {
    format!("timeout of {timeout_ms}ms exceeded")
}
