//! In-process fake of the project management backend for tests.
//!
//! Serves the same routes and envelopes as the real server from an axum
//! router bound to an ephemeral localhost port.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::routing::post;
use serde_json::{Value, json};

use crate::net::types::{AccessState, Board, BoardStatus, Role, User};

type Reply = (StatusCode, Json<Value>);

#[derive(Default)]
pub(crate) struct FakeBackend {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<(User, String)>,
    tokens: HashMap<String, i64>,
    boards: Vec<Board>,
    auth_headers: Vec<Option<String>>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_token(&mut self, user_id: i64) -> String {
        let token = format!("tok-{user_id}-{}", self.tokens.len() + 1);
        self.tokens.insert(token.clone(), user_id);
        token
    }

    fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().map(|(u, _)| u).find(|u| u.id == id)
    }
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create an account directly and return it with a valid token.
    pub(crate) fn seed_user(&self, email: &str, password: &str, name: &str) -> (User, String) {
        let mut inner = self.inner.lock().unwrap();
        let user = make_user(inner.next_id(), email, name);
        inner.users.push((user.clone(), password.to_owned()));
        let token = inner.issue_token(user.id);
        (user, token)
    }

    pub(crate) fn seed_board(&self, owner_id: i64, name: &str) -> Board {
        let mut inner = self.inner.lock().unwrap();
        let board = Board {
            id: inner.next_id(),
            name: name.to_owned(),
            description: None,
            owner_id,
            is_public: false,
            status: BoardStatus::Active,
            created_at: "2024-11-02T10:00:00.000Z".to_owned(),
            owner_email: None,
            owner_name: None,
            user_role: None,
        };
        inner.boards.push(board.clone());
        board
    }

    /// `Authorization` header values seen so far, in arrival order.
    pub(crate) fn auth_headers(&self) -> Vec<Option<String>> {
        self.inner.lock().unwrap().auth_headers.clone()
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<User, Reply> {
        let mut inner = self.inner.lock().unwrap();
        let raw = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        inner.auth_headers.push(raw.clone());
        let user = raw
            .as_deref()
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| inner.tokens.get(token).copied())
            .and_then(|id| inner.user(id).cloned());
        user.ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Invalid or expired token"))
    }

    fn record(&self, headers: &HeaderMap) {
        let raw = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        self.inner.lock().unwrap().auth_headers.push(raw);
    }
}

pub(crate) fn make_user(id: i64, email: &str, name: &str) -> User {
    User {
        id,
        email: email.to_owned(),
        name: name.to_owned(),
        role: Role::User,
        access_state: AccessState::Active,
        created_at: "2024-11-02T10:00:00.000Z".to_owned(),
    }
}

fn ok(status: StatusCode, data: Value) -> Reply {
    (status, Json(json!({ "success": true, "data": data })))
}

fn fail(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "success": false, "error": { "message": message } })))
}

fn auth_data(user: &User, token: &str) -> Value {
    let mut data = serde_json::to_value(user).unwrap();
    data["token"] = json!(token);
    data
}

fn str_field<'a>(body: &'a Value, key: &str) -> &'a str {
    body.get(key).and_then(Value::as_str).unwrap_or_default()
}

// =============================================================================
// ROUTES
// =============================================================================

pub(crate) fn router(backend: Arc<FakeBackend>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .route("/api/test", get(|| async { Json(json!({ "success": true, "message": "API is working" })) }))
        .route("/api/test/db", get(|| async { Json(json!({ "success": true, "database": "connected" })) }))
        .route("/api/test/fail", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/boards", get(list_boards).post(create_board))
        .route("/api/boards/{id}", get(get_board).put(update_board).delete(delete_board))
        .with_state(backend)
}

async fn register(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    backend.record(&headers);
    let email = str_field(&body, "email");
    let mut inner = backend.inner.lock().unwrap();
    if inner.users.iter().any(|(u, _)| u.email == email) {
        return fail(StatusCode::CONFLICT, "User with this email already exists");
    }
    let user = make_user(inner.next_id(), email, str_field(&body, "name"));
    inner.users.push((user.clone(), str_field(&body, "password").to_owned()));
    let token = inner.issue_token(user.id);
    let (status, Json(mut reply)) = ok(StatusCode::CREATED, auth_data(&user, &token));
    reply["message"] = json!("User registered");
    (status, Json(reply))
}

async fn login(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    backend.record(&headers);
    let mut inner = backend.inner.lock().unwrap();
    let found = inner
        .users
        .iter()
        .find(|(u, pw)| u.email == str_field(&body, "email") && pw == str_field(&body, "password"))
        .map(|(u, _)| u.clone());
    let Some(user) = found else {
        return fail(StatusCode::UNAUTHORIZED, "Invalid email or password");
    };
    let token = inner.issue_token(user.id);
    ok(StatusCode::OK, auth_data(&user, &token))
}

async fn me(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> Reply {
    match backend.authenticate(&headers) {
        Ok(user) => ok(StatusCode::OK, serde_json::to_value(user).unwrap()),
        Err(reply) => reply,
    }
}

async fn list_boards(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap) -> Reply {
    let user = match backend.authenticate(&headers) {
        Ok(user) => user,
        Err(reply) => return reply,
    };
    let inner = backend.inner.lock().unwrap();
    let boards: Vec<&Board> = inner.boards.iter().filter(|b| b.owner_id == user.id).collect();
    (
        StatusCode::OK,
        Json(json!({ "success": true, "data": boards, "count": boards.len() })),
    )
}

async fn get_board(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    if let Err(reply) = backend.authenticate(&headers) {
        return reply;
    }
    let inner = backend.inner.lock().unwrap();
    let Some(board) = inner.boards.iter().find(|b| b.id == id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "success": false, "message": "Board not found" })));
    };
    let mut data = serde_json::to_value(board).unwrap();
    data["columns"] = json!([
        { "id": 1, "name": "To do", "boardId": id, "orderIndex": 0, "createdAt": board.created_at },
        { "id": 2, "name": "Done", "boardId": id, "orderIndex": 1, "createdAt": board.created_at }
    ]);
    ok(StatusCode::OK, data)
}

async fn create_board(State(backend): State<Arc<FakeBackend>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let user = match backend.authenticate(&headers) {
        Ok(user) => user,
        Err(reply) => return reply,
    };
    let board = backend.seed_board(user.id, str_field(&body, "name"));
    let mut inner = backend.inner.lock().unwrap();
    let Some(stored) = inner.boards.iter_mut().find(|b| b.id == board.id) else {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "lost board");
    };
    stored.description = body.get("description").and_then(Value::as_str).map(ToOwned::to_owned);
    stored.is_public = body.get("isPublic").and_then(Value::as_bool).unwrap_or(false);
    let data = serde_json::to_value(&*stored).unwrap();
    ok(StatusCode::CREATED, data)
}

async fn update_board(
    State(backend): State<Arc<FakeBackend>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    if let Err(reply) = backend.authenticate(&headers) {
        return reply;
    }
    let mut inner = backend.inner.lock().unwrap();
    let Some(board) = inner.boards.iter_mut().find(|b| b.id == id) else {
        return fail(StatusCode::NOT_FOUND, "Board not found");
    };
    if let Some(name) = body.get("name").and_then(Value::as_str) {
        name.clone_into(&mut board.name);
    }
    if let Some(description) = body.get("description").and_then(Value::as_str) {
        board.description = Some(description.to_owned());
    }
    if let Some(is_public) = body.get("isPublic").and_then(Value::as_bool) {
        board.is_public = is_public;
    }
    let data = serde_json::to_value(&*board).unwrap();
    ok(StatusCode::OK, data)
}

async fn delete_board(
    State(backend): State<Arc<FakeBackend>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if let Err(reply) = backend.authenticate(&headers) {
        return reply;
    }
    let archive = query.get("archive").is_none_or(|v| v == "true");
    let mut inner = backend.inner.lock().unwrap();
    let Some(pos) = inner.boards.iter().position(|b| b.id == id) else {
        return fail(StatusCode::NOT_FOUND, "Board not found");
    };
    let status = if archive {
        inner.boards[pos].status = BoardStatus::Archived;
        "archived"
    } else {
        inner.boards.remove(pos);
        "deleted"
    };
    ok(StatusCode::OK, json!({ "boardId": id.to_string(), "status": status }))
}

// =============================================================================
// SERVERS
// =============================================================================

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub(crate) async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Start a fresh fake backend and return it with its base URL.
pub(crate) async fn spawn_backend() -> (Arc<FakeBackend>, String) {
    let backend = FakeBackend::new();
    let url = spawn(router(backend.clone())).await;
    (backend, url)
}

pub(crate) fn temp_session_file() -> PathBuf {
    std::env::temp_dir()
        .join(format!("pms-session-{}", uuid::Uuid::new_v4()))
        .join("session.json")
}
