//! In-process mock registry for integration tests.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use registry_console_lib::services::registry_client::{RegistryClient, RegistryClientConfig};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Observable and scriptable state of the mock registry.
#[derive(Default)]
pub struct MockState {
    /// Current valid token is `token-{generation}`.
    pub csrf_generation: AtomicUsize,
    pub csrf_fetches: AtomicUsize,
    pub mutating_requests: AtomicUsize,
    pub reject_all_csrf: AtomicBool,
    pub unauthorized: AtomicBool,

    pub tags: Mutex<Vec<String>>,
    pub tag_requests: AtomicUsize,

    /// Tag listing answers 503.
    pub fail_tags: AtomicBool,
    pub robots: Mutex<Vec<String>>,
    pub notifications: Mutex<Vec<Value>>,
    pub notification_requests: AtomicUsize,

    /// Phases served for build `b-1`; the last one repeats.
    pub build_phases: Mutex<VecDeque<String>>,
    pub build_requests: AtomicUsize,

    pub deleted: Mutex<Vec<String>>,
}

impl MockState {
    /// Invalidate the token the client has cached.
    pub fn rotate_csrf(&self) {
        self.csrf_generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn seed_tags(&self, count: usize) {
        *self.tags.lock().unwrap() = (0..count).map(|i| format!("tag-{:03}", i)).collect();
    }

    pub fn push_notification(&self, id: &str, created: &str) {
        self.push_notification_of_kind(id, created, "build_failure");
    }

    pub fn push_notification_of_kind(&self, id: &str, created: &str, kind: &str) {
        self.notifications.lock().unwrap().push(json!({
            "id": id,
            "organization": "acme",
            "kind": kind,
            "created": created,
            "metadata": {},
            "dismissed": false,
        }));
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn current_token(&self) -> String {
        format!("token-{}", self.csrf_generation.load(Ordering::SeqCst))
    }
}

type Shared = Arc<MockState>;

pub struct MockRegistry {
    pub base_url: String,
    pub state: Shared,
}

impl MockRegistry {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(MockState::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn client(&self) -> RegistryClient {
        RegistryClient::new(RegistryClientConfig {
            base_url: self.base_url.clone(),
            token: Some("test-token".to_string()),
            timeout_secs: 5,
        })
        .unwrap()
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/csrf_token", get(csrf_token))
        .route("/api/v1/organization/{org}", get(organization))
        .route("/api/v1/organization/{org}/robots", get(robots))
        .route("/api/v1/organization/{org}/robots/{robot}", delete(delete_robot))
        .route("/api/v1/repository", get(repositories))
        .route("/api/v1/repository/{ns}/{repo}", delete(delete_repository))
        .route("/api/v1/repository/{ns}/{repo}/tag/", get(tags))
        .route("/api/v1/repository/{ns}/{repo}/tag/{tag}", delete(delete_tag))
        .route("/api/v1/repository/{ns}/{repo}/build/{id}", get(build))
        .route("/api/v1/user/notifications", get(notifications))
        .route("/api/v1/user/notifications/{uuid}", put(update_notification))
        .with_state(state)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response()
}

/// Validate the CSRF header of a mutating request.
fn check_csrf(state: &MockState, headers: &HeaderMap) -> Result<(), Response> {
    state.mutating_requests.fetch_add(1, Ordering::SeqCst);

    let sent = headers
        .get("X-CSRF-Token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if state.reject_all_csrf.load(Ordering::SeqCst) || sent != state.current_token() {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"message": "CSRF token was invalid or missing."})),
        )
            .into_response());
    }
    Ok(())
}

async fn csrf_token(State(state): State<Shared>) -> Json<Value> {
    state.csrf_fetches.fetch_add(1, Ordering::SeqCst);
    state.rotate_csrf();
    Json(json!({"csrf_token": state.current_token()}))
}

async fn organization(Path(org): Path<String>) -> Response {
    if org != "acme" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error_message": "Not Found", "detail": "Not Found"})),
        )
            .into_response();
    }

    Json(json!({
        "name": "acme",
        "email": "ops@acme.test",
        "is_admin": true,
        "is_member": true,
        "ordered_teams": ["owners", "builders"],
        "tag_expiration_s": 1209600,
    }))
    .into_response()
}

async fn robots(State(state): State<Shared>, Path(org): Path<String>) -> Response {
    if state.unauthorized.load(Ordering::SeqCst) {
        return unauthorized();
    }

    let robots: Vec<Value> = state
        .robots
        .lock()
        .unwrap()
        .iter()
        .map(|short| json!({"name": format!("{}+{}", org, short), "description": ""}))
        .collect();
    Json(json!({ "robots": robots })).into_response()
}

async fn delete_robot(
    State(state): State<Shared>,
    Path((org, robot)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }

    state.robots.lock().unwrap().retain(|r| *r != robot);
    state
        .deleted
        .lock()
        .unwrap()
        .push(format!("robot:{}+{}", org, robot));
    StatusCode::NO_CONTENT.into_response()
}

async fn repositories(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let namespace = query.get("namespace").cloned().unwrap_or_default();
    let repo = |name: &str| json!({"namespace": namespace, "name": name, "is_public": true});

    match query.get("next_page").map(String::as_str) {
        None => Json(json!({
            "repositories": [repo("api"), repo("web")],
            "next_page": "page-2",
        })),
        Some("page-2") => Json(json!({ "repositories": [repo("worker")] })),
        Some(_) => Json(json!({ "repositories": [] })),
    }
}

async fn delete_repository(
    State(state): State<Shared>,
    Path((ns, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }

    state
        .deleted
        .lock()
        .unwrap()
        .push(format!("repository:{}/{}", ns, repo));
    StatusCode::NO_CONTENT.into_response()
}

async fn tags(State(state): State<Shared>, Query(query): Query<HashMap<String, String>>) -> Response {
    state.tag_requests.fetch_add(1, Ordering::SeqCst);

    if state.fail_tags.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error_message": "tag index unavailable"})),
        )
            .into_response();
    }

    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(50);
    let all = state.tags.lock().unwrap().clone();

    let start = (page - 1) * limit;
    let batch: Vec<Value> = all
        .iter()
        .skip(start)
        .take(limit)
        .map(|name| {
            json!({
                "name": name,
                "manifest_digest": format!("sha256:{}", name.replace('-', "")),
                "size": 1024,
                "last_modified": "Tue, 14 May 2024 10:00:00 -0000",
            })
        })
        .collect();

    Json(json!({
        "page": page,
        "has_additional": start + limit < all.len(),
        "tags": batch,
    }))
    .into_response()
}

async fn delete_tag(
    State(state): State<Shared>,
    Path((ns, repo, tag)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }

    state.tags.lock().unwrap().retain(|t| *t != tag);
    state
        .deleted
        .lock()
        .unwrap()
        .push(format!("tag:{}/{}:{}", ns, repo, tag));
    StatusCode::NO_CONTENT.into_response()
}

async fn build(
    State(state): State<Shared>,
    Path((ns, repo, id)): Path<(String, String, String)>,
) -> Response {
    state.build_requests.fetch_add(1, Ordering::SeqCst);

    if id != "b-1" {
        return (StatusCode::NOT_FOUND, Json(json!({"error_message": "Not Found"}))).into_response();
    }

    let phase = {
        let mut phases = state.build_phases.lock().unwrap();
        if phases.len() > 1 {
            phases.pop_front()
        } else {
            phases.front().cloned()
        }
    }
    .unwrap_or_else(|| "waiting".to_string());

    Json(json!({
        "id": id,
        "phase": phase,
        "started": "Tue, 14 May 2024 10:00:00 -0000",
        "display_name": "abc123",
        "repository": {"namespace": ns, "name": repo},
    }))
    .into_response()
}

async fn notifications(State(state): State<Shared>) -> Response {
    state.notification_requests.fetch_add(1, Ordering::SeqCst);

    if state.unauthorized.load(Ordering::SeqCst) {
        return unauthorized();
    }

    let notifications = state.notifications.lock().unwrap().clone();
    Json(json!({ "notifications": notifications, "additional": false })).into_response()
}

async fn update_notification(
    State(state): State<Shared>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = check_csrf(&state, &headers) {
        return rejection;
    }

    let dismissed = body["dismissed"].as_bool().unwrap_or(false);
    let mut notifications = state.notifications.lock().unwrap();
    match notifications.iter_mut().find(|n| n["id"] == uuid.as_str()) {
        Some(notification) => {
            notification["dismissed"] = json!(dismissed);
            drop(notifications);
            state.deleted.lock().unwrap().push(format!("notification:{}", uuid));
            StatusCode::NO_CONTENT.into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"error_message": "Not Found"}))).into_response(),
    }
}
