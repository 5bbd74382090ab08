//! In-memory stand-in for the user-management backend
//!
//! Serves the same routes, status codes and messages as the real service so
//! the suites can run inside `cargo test`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const SESSION_TTL_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Default)]
struct StubState {
    users: RwLock<Vec<Map<String, Value>>>,
    sessions: RwLock<HashMap<String, Session>>,
    accounts: HashMap<String, Account>,
    sequence: AtomicU64,
}

struct Account {
    password: String,
    role: String,
}

#[derive(Clone)]
struct Session {
    username: String,
    role: String,
    expires_at: i64,
}

/// A running stub, stopped on drop
pub struct StubSut {
    pub addr: SocketAddr,
    state: Arc<StubState>,
    server: JoinHandle<()>,
}

impl StubSut {
    pub async fn start() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(
            "admin".to_string(),
            Account {
                password: "password123".to_string(),
                role: "admin".to_string(),
            },
        );
        let state = Arc::new(StubState {
            accounts,
            ..Default::default()
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        let app = router(state.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state, server }
    }

    pub fn base_url(&self) -> &'static str {
        "http://127.0.0.1"
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn user_count(&self) -> usize {
        self.state.users.read().await.len()
    }

    pub async fn session_count(&self) -> usize {
        self.state.sessions.read().await.len()
    }
}

impl Drop for StubSut {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn router(state: Arc<StubState>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/auth/verify", get(verify_handler))
        .route("/api/users", get(list_users_handler).post(create_user_handler))
        .route(
            "/api/users/:id",
            get(get_user_handler).put(update_user_handler).delete(delete_user_handler),
        )
        .route("/api/health", get(health_handler))
        .with_state(state)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Request body as a JSON object; anything else reads as empty
fn body_object(body: &Bytes) -> Map<String, Value> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Second word of the Authorization header, like `header.split(' ')[1]`
fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(' ').nth(1))
        .filter(|t| !t.is_empty())
        .map(String::from)
}

async fn authorize(state: &StubState, headers: &HeaderMap) -> Result<Session, Response> {
    let Some(token) = bearer(headers) else {
        return Err(error(StatusCode::UNAUTHORIZED, "Access token required"));
    };
    match state.sessions.read().await.get(&token) {
        Some(session) if session.expires_at >= Utc::now().timestamp_millis() => Ok(session.clone()),
        _ => Err(error(StatusCode::FORBIDDEN, "Invalid or expired token")),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(_) => true,
    }
}

/// `^[^\s@]+@[^\s@]+\.[^\s@]+$`
fn valid_email(value: Option<&Value>) -> bool {
    let Some(email) = value.and_then(Value::as_str) else {
        return false;
    };
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// Number the age coerces to, if it is a valid age at all
fn numeric_age(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.is_empty() => return None,
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    (number.fract() == 0.0 && (0.0..=150.0).contains(&number)).then_some(number)
}

/// Shared create/update validation
fn validate(body: &Map<String, Value>) -> Result<Option<Value>, Response> {
    if !truthy(body.get("name")) || !truthy(body.get("email")) {
        return Err(error(StatusCode::BAD_REQUEST, "Name and email are required"));
    }
    if !valid_email(body.get("email")) {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "Email must contain @ symbol and be in valid format",
        ));
    }
    match body.get("age") {
        None => Ok(None),
        Some(age) => match numeric_age(age) {
            Some(n) => Ok(Some(json!(n as i64))),
            None => Err(error(
                StatusCode::BAD_REQUEST,
                "Age must be a valid number between 0 and 150, or omitted entirely",
            )),
        },
    }
}

async fn login_handler(State(state): State<Arc<StubState>>, body: Bytes) -> Response {
    let body = body_object(&body);
    if !truthy(body.get("username")) || !truthy(body.get("password")) {
        return error(StatusCode::BAD_REQUEST, "Username and password are required");
    }
    let username = body.get("username").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();

    let account = match state.accounts.get(username) {
        Some(account) if account.password == password => account,
        _ => return error(StatusCode::UNAUTHORIZED, "Invalid username or password"),
    };

    let seq = state.sequence.fetch_add(1, Ordering::SeqCst);
    let token = hex::encode(Sha256::digest(format!("{}:{}:{}", username, seq, now_iso())));
    let expires_at = Utc::now().timestamp_millis() + SESSION_TTL_MS;
    state.sessions.write().await.insert(
        token.clone(),
        Session {
            username: username.to_string(),
            role: account.role.clone(),
            expires_at,
        },
    );

    Json(json!({
        "token": token,
        "user": { "username": username, "role": account.role },
        "expiresAt": expires_at,
    }))
    .into_response()
}

async fn logout_handler(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    if let Some(token) = bearer(&headers) {
        state.sessions.write().await.remove(&token);
    }
    Json(json!({ "message": "Logged out successfully" })).into_response()
}

async fn verify_handler(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    match authorize(&state, &headers).await {
        Ok(session) => Json(json!({
            "user": { "username": session.username, "role": session.role }
        }))
        .into_response(),
        Err(rejection) => rejection,
    }
}

async fn list_users_handler(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorize(&state, &headers).await {
        return rejection;
    }
    let users = state.users.read().await.clone();
    Json(Value::Array(users.into_iter().map(Value::Object).collect())).into_response()
}

async fn get_user_handler(
    State(state): State<Arc<StubState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers).await {
        return rejection;
    }
    let users = state.users.read().await;
    match users.iter().find(|u| u.get("id").and_then(Value::as_str) == Some(id.as_str())) {
        Some(user) => Json(Value::Object(user.clone())).into_response(),
        None => error(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn create_user_handler(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers).await {
        return rejection;
    }
    let body = body_object(&body);
    let age = match validate(&body) {
        Ok(age) => age,
        Err(rejection) => return rejection,
    };

    let mut users = state.users.write().await;
    if users.iter().any(|u| u.get("email") == body.get("email")) {
        return error(StatusCode::BAD_REQUEST, "Email already exists");
    }

    let seq = state.sequence.fetch_add(1, Ordering::SeqCst);
    let now = now_iso();
    let mut user = Map::new();
    user.insert("id".into(), json!(format!("{}{}", Utc::now().timestamp_millis(), seq)));
    user.insert("name".into(), body.get("name").cloned().unwrap_or(Value::Null));
    user.insert("email".into(), body.get("email").cloned().unwrap_or(Value::Null));
    if let Some(age) = age {
        user.insert("age".into(), age);
    }
    user.insert("createdAt".into(), json!(now));
    user.insert("updatedAt".into(), json!(now));
    users.push(user.clone());

    (StatusCode::CREATED, Json(Value::Object(user))).into_response()
}

async fn update_user_handler(
    State(state): State<Arc<StubState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers).await {
        return rejection;
    }
    let body = body_object(&body);
    let mut users = state.users.write().await;
    let Some(index) = users
        .iter()
        .position(|u| u.get("id").and_then(Value::as_str) == Some(id.as_str()))
    else {
        return error(StatusCode::NOT_FOUND, "User not found");
    };

    let age = match validate(&body) {
        Ok(age) => age,
        Err(rejection) => return rejection,
    };
    let taken = users.iter().any(|u| {
        u.get("email") == body.get("email") && u.get("id").and_then(Value::as_str) != Some(id.as_str())
    });
    if taken {
        return error(StatusCode::BAD_REQUEST, "Email already exists");
    }

    let user = &mut users[index];
    user.insert("name".into(), body.get("name").cloned().unwrap_or(Value::Null));
    user.insert("email".into(), body.get("email").cloned().unwrap_or(Value::Null));
    match age {
        Some(age) => {
            user.insert("age".into(), age);
        }
        None => {
            user.remove("age");
        }
    }
    user.insert("updatedAt".into(), json!(now_iso()));

    Json(Value::Object(user.clone())).into_response()
}

async fn delete_user_handler(
    State(state): State<Arc<StubState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers).await {
        return rejection;
    }
    let mut users = state.users.write().await;
    match users
        .iter()
        .position(|u| u.get("id").and_then(Value::as_str) == Some(id.as_str()))
    {
        Some(index) => {
            let deleted = users.remove(index);
            Json(json!({ "message": "User deleted successfully", "user": deleted })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "OK", "timestamp": now_iso() }))
}
