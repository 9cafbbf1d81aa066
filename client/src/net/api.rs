//! REST gateway for the project management backend.
//!
//! Every request goes through [`ApiClient::send`], which enforces the two
//! cross-cutting rules:
//!
//! - the current bearer token (if any) is attached to every request;
//! - a 401 from any endpoint clears the session store before the error is
//!   returned as [`ApiError::Unauthorized`].
//!
//! ERROR HANDLING
//! ==============
//! Failures are normalized once here (see [`super::error`]) and logged once
//! here. Navigation on 401 is left to the caller; this layer only reports it.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;
use super::types::{
    ArchiveResult, AuthPayload, Board, BoardDetail, BoardInput, BoardList, BoardPatch, Envelope, Id, LoginRequest,
    RegisterRequest, User,
};
use crate::config::ClientConfig;
use crate::state::session::{ProfileSource, SessionStore};

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Build the gateway for `config.api_url`, reading tokens from `session`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            base_url: crate::config::normalize_base_url(&config.api_url),
            timeout: config.request_timeout,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// `POST /api/auth/register`
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload, ApiError> {
        Ok(self.call(Method::POST, "/api/auth/register", Some(request)).await?.data)
    }

    /// `POST /api/auth/login`
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, ApiError> {
        Ok(self.call(Method::POST, "/api/auth/login", Some(request)).await?.data)
    }

    /// `GET /api/auth/me`
    pub async fn current_user(&self) -> Result<User, ApiError> {
        Ok(self.call(Method::GET, "/api/auth/me", None::<&()>).await?.data)
    }

    // =========================================================================
    // BOARDS
    // =========================================================================

    /// `GET /api/boards`
    pub async fn list_boards(&self) -> Result<BoardList, ApiError> {
        let envelope: Envelope<Vec<Board>> = self.call(Method::GET, "/api/boards", None::<&()>).await?;
        let count = envelope.count.unwrap_or(envelope.data.len() as u64);
        Ok(BoardList { boards: envelope.data, count })
    }

    /// `GET /api/boards/:id`
    pub async fn board(&self, id: Id) -> Result<BoardDetail, ApiError> {
        Ok(self.call(Method::GET, &board_path(id), None::<&()>).await?.data)
    }

    /// `POST /api/boards`
    pub async fn create_board(&self, input: &BoardInput) -> Result<Board, ApiError> {
        Ok(self.call(Method::POST, "/api/boards", Some(input)).await?.data)
    }

    /// `PUT /api/boards/:id`
    pub async fn update_board(&self, id: Id, patch: &BoardPatch) -> Result<Board, ApiError> {
        Ok(self.call(Method::PUT, &board_path(id), Some(patch)).await?.data)
    }

    /// `DELETE /api/boards/:id?archive={archive}`; archiving keeps the row with status `archived`.
    pub async fn delete_board(&self, id: Id, archive: bool) -> Result<ArchiveResult, ApiError> {
        Ok(self.call(Method::DELETE, &delete_board_path(id, archive), None::<&()>).await?.data)
    }

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    /// `GET /health`
    pub async fn health(&self) -> Result<Value, ApiError> {
        self.send(Method::GET, "/health", None::<&()>).await
    }

    /// `GET /api/test`
    pub async fn api_test(&self) -> Result<Value, ApiError> {
        self.send(Method::GET, "/api/test", None::<&()>).await
    }

    /// `GET /api/test/db`
    pub async fn db_check(&self) -> Result<Value, ApiError> {
        self.send(Method::GET, "/api/test/db", None::<&()>).await
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    async fn call<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path);
        let value = self.send(method.clone(), path, body).await?;
        serde_json::from_value(value).map_err(|e| log_failure(&method, &url, ApiError::Decode(e.to_string())))
    }

    /// Send one request and return the decoded JSON body of a 2xx response.
    ///
    /// Empty success bodies come back as `Value::Null`, non-JSON ones as a string.
    async fn send<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }
        // `json` also sets `Content-Type`, so bodiless requests go out without one.
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(%method, %url, "api request");
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return Err(log_failure(&method, &url, ApiError::from_transport(&err, self.timeout.as_millis()))),
        };

        let status = response.status().as_u16();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return Err(log_failure(&method, &url, ApiError::from_transport(&err, self.timeout.as_millis()))),
        };
        let parsed = parse_body(&bytes);

        if (200..300).contains(&status) {
            return Ok(parsed.unwrap_or_else(|| success_fallback(&bytes)));
        }

        let err = ApiError::from_response(status, parsed.as_ref());
        if err.is_unauthorized() {
            tracing::warn!(%url, "credentials rejected; clearing session");
            if let Err(storage_err) = self.session.logout() {
                tracing::error!(error = %storage_err, "failed to clear session after 401");
            }
        }
        Err(log_failure(&method, &url, err))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl ProfileSource for ApiClient {
    async fn current_user(&self) -> Result<User, ApiError> {
        ApiClient::current_user(self).await
    }
}

fn board_path(id: Id) -> String {
    format!("/api/boards/{id}")
}

fn delete_board_path(id: Id, archive: bool) -> String {
    format!("/api/boards/{id}?archive={archive}")
}

fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}

fn success_fallback(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        Value::String(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn log_failure(method: &Method, url: &str, err: ApiError) -> ApiError {
    tracing::error!(%method, %url, status = ?err.status(), message = %err, "api error");
    err
}
