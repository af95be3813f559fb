//! In-process mock of the LMS backend for integration tests.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use lms_client::{
    ApiClient, Claims, ClientConfig, CredentialPair, MemoryStore, RefreshPolicy, SessionManager,
    StorageExpiry,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const JWT_SECRET: &[u8] = b"test_secret_key_for_testing_only";

pub const EMAIL: &str = "student@example.com";
pub const PASSWORD: &str = "StrongPass123!";

/// Mint an access token issued `issued_ago` in the past with `lifetime`
pub fn access_token(issued_ago: Duration, lifetime: Duration) -> String {
    let issued = Utc::now() - issued_ago;
    let claims = Claims {
        exp: (issued + lifetime).timestamp(),
        iat: issued.timestamp(),
        user_id: Some(1),
        full_name: Some("Test Student".to_string()),
        email: Some(EMAIL.to_string()),
        username: Some("student".to_string()),
        jti: Some(format!("{}", rand::random::<u64>())),
        token_type: Some("access".to_string()),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET)).unwrap()
}

/// Token that is still valid for five minutes
pub fn fresh_access_token() -> String {
    access_token(Duration::zero(), Duration::minutes(5))
}

/// Token issued ten minutes ago with a five minute lifetime
pub fn expired_access_token() -> String {
    access_token(Duration::minutes(10), Duration::minutes(5))
}

/// Backend state observable by tests
#[derive(Default)]
pub struct MockBackend {
    /// Refresh tokens the backend will accept, each exactly once
    pub valid_refresh: Mutex<HashSet<String>>,
    /// Number of calls to the refresh endpoint
    pub refresh_calls: AtomicUsize,
    /// Authorization header of every resource request, in arrival order
    pub seen_auth: Mutex<Vec<Option<String>>>,
    /// Artificial latency of the refresh endpoint, in milliseconds
    pub refresh_delay_ms: AtomicUsize,
    /// Whether the refresh endpoint answers 500 regardless of the token
    pub refresh_broken: Mutex<bool>,
}

impl MockBackend {
    pub fn accept_refresh(&self, token: &str) {
        self.valid_refresh.lock().unwrap().insert(token.to_string());
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen_auth(&self) -> Vec<Option<String>> {
        self.seen_auth.lock().unwrap().clone()
    }

    fn issue_pair(&self) -> CredentialPair {
        let refresh = format!("refresh-{}", rand::random::<u64>());
        self.accept_refresh(&refresh);
        CredentialPair {
            access_token: fresh_access_token(),
            refresh_token: refresh,
        }
    }
}

fn record_auth(backend: &MockBackend, headers: &HeaderMap) -> Option<String> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    backend.seen_auth.lock().unwrap().push(auth.clone());
    auth
}

async fn refresh(
    State(backend): State<Arc<MockBackend>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let token = body["refresh"].as_str().unwrap_or_default().to_string();
    let accepted = backend.valid_refresh.lock().unwrap().remove(&token);

    let delay = backend.refresh_delay_ms.load(Ordering::SeqCst) as u64;
    if delay > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
    }

    if *backend.refresh_broken.lock().unwrap() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Server error" })),
        );
    }

    if !accepted {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" })),
        );
    }

    let pair = backend.issue_pair();
    (StatusCode::OK, Json(serde_json::to_value(pair).unwrap()))
}

async fn login(
    State(backend): State<Arc<MockBackend>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        let pair = backend.issue_pair();
        (StatusCode::OK, Json(serde_json::to_value(pair).unwrap()))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
    }
}

async fn register(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] != body["password2"] {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "password": ["Password fields didn't match."] })),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({ "full_name": body["full_name"], "email": body["email"] })),
    )
}

async fn courses(State(backend): State<Arc<MockBackend>>, headers: HeaderMap) -> Json<Value> {
    record_auth(&backend, &headers);
    Json(json!([{ "slug": "rust-101", "title": "Rust 101" }]))
}

/// Record the header and answer with `body` only for a currently valid bearer
fn authorized(backend: &MockBackend, headers: &HeaderMap, body: Value) -> (StatusCode, Json<Value>) {
    let auth = record_auth(backend, headers);
    let valid = auth
        .as_deref()
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| !lms_client::is_access_token_expired(token, Utc::now()));

    if valid {
        (StatusCode::OK, Json(body))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Given token not valid for any token type" })),
        )
    }
}

async fn enrollments(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    authorized(&backend, &headers, json!([{ "course": "rust-101" }]))
}

async fn instructor_dashboard(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    authorized(
        &backend,
        &headers,
        json!({
            "total_courses": 2,
            "total_students": 40,
            "total_reviews": 9,
            "total_earnings": 1250.0
        }),
    )
}

async fn mark_all_read(
    State(backend): State<Arc<MockBackend>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    authorized(&backend, &headers, json!({ "marked": "all" }))
}

async fn mark_one_read(
    State(backend): State<Arc<MockBackend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    authorized(&backend, &headers, json!({ "marked": id }))
}

async fn create_review(
    State(backend): State<Arc<MockBackend>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let (status, _) = authorized(&backend, &headers, Value::Null);
    if status != StatusCode::OK {
        return (status, Json(json!({ "detail": "Authentication required" })));
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "course": slug,
            "rating": body["rating"],
            "review_text": body["review_text"]
        })),
    )
}

/// Start the mock backend; returns its API base URL
pub async fn spawn_backend() -> (String, Arc<MockBackend>) {
    let backend = Arc::new(MockBackend::default());
    let app = Router::new()
        .route("/api/v1/user/token/", post(login))
        .route("/api/v1/user/token/refresh/", post(refresh))
        .route("/api/v1/user/register/", post(register))
        .route("/api/v1/courses/", get(courses))
        .route("/api/v1/student/enrollments/", get(enrollments))
        .route("/api/v1/instructor/dashboard/", get(instructor_dashboard))
        .route("/api/v1/notifications/mark-read/", post(mark_all_read))
        .route("/api/v1/notifications/mark-read/{id}/", post(mark_one_read))
        .route("/api/v1/courses/{slug}/reviews/create/", post(create_review))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/api/v1/"), backend)
}

/// API base URL on a port nothing listens on
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/v1/")
}

/// Session manager over a fresh in-memory store
pub fn session(policy: RefreshPolicy) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        Arc::new(MemoryStore::new(StorageExpiry::default())),
        policy,
    ))
}

/// Client for `base_url` after storing `pair` (if any) in `session`
pub fn client_with(
    base_url: &str,
    session: Arc<SessionManager>,
    pair: Option<CredentialPair>,
) -> ApiClient {
    if let Some(pair) = pair {
        session.set_tokens(&pair).unwrap();
    }
    ApiClient::new(ClientConfig::with_base_url(base_url), session).unwrap()
}
