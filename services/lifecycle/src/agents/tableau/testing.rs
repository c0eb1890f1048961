//! Local Tableau REST endpoint for exercising the client and store.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::TableauConfig;

pub const API_VERSION: &str = "3.19";
pub const SITE_ID: &str = "site-1";
pub const TOKEN: &str = "session-token";

/// LUID the server answers 404 for
pub const MISSING_USER: &str = "luid-gone";
/// LUID the server refuses to remove
pub const LOCKED_USER: &str = "luid-locked";

#[derive(Default)]
pub struct Counters {
    pub sign_ins: AtomicUsize,
    pub sign_outs: AtomicUsize,
}

/// Running fake server plus a client configuration pointing at it
pub struct FakeTableau {
    pub config: TableauConfig,
    pub counters: Arc<Counters>,
}

impl FakeTableau {
    pub async fn start() -> Self {
        let counters = Arc::new(Counters::default());
        let base = format!("/api/{API_VERSION}");

        let router = Router::new()
            .route(&format!("{base}/auth/signin"), post(sign_in))
            .route(&format!("{base}/auth/signout"), post(sign_out))
            .route(&format!("{base}/sites/{SITE_ID}/users"), get(list_users))
            .route(
                &format!("{base}/sites/{SITE_ID}/users/:id"),
                put(update_user).delete(remove_user),
            )
            .with_state(counters.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            config: TableauConfig {
                server_url: format!("http://{addr}"),
                token_name: "lifecycle".to_string(),
                token_value: "secret".to_string(),
                site: String::new(),
                verify_tls: true,
                api_version: Some(API_VERSION.to_string()),
            },
            counters,
        }
    }

    pub fn sign_ins(&self) -> usize {
        self.counters.sign_ins.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.counters.sign_outs.load(Ordering::SeqCst)
    }
}

fn api_error(status: StatusCode, code: &str, summary: &str, detail: &str) -> Response {
    let body = json!({"error": {"code": code, "summary": summary, "detail": detail}});
    (status, Json(body)).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("X-Tableau-Auth")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == TOKEN)
}

async fn sign_in(State(counters): State<Arc<Counters>>, Json(body): Json<Value>) -> Response {
    if body["credentials"]["personalAccessTokenName"] != "lifecycle" {
        return api_error(StatusCode::UNAUTHORIZED, "401001", "Signin Error", "bad token");
    }
    counters.sign_ins.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "credentials": {
            "token": TOKEN,
            "site": {"id": SITE_ID, "contentUrl": ""},
            "user": {"id": "luid-admin"}
        }
    }))
    .into_response()
}

async fn sign_out(State(counters): State<Arc<Counters>>, headers: HeaderMap) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    counters.sign_outs.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT
}

async fn list_users(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return api_error(StatusCode::UNAUTHORIZED, "401002", "Unauthorized Access", "no token");
    }
    Json(json!({
        "pagination": {"pageNumber": "1", "pageSize": "100", "totalAvailable": "3"},
        "users": {"user": [
            {"id": "luid-alice", "name": "alice", "siteRole": "Creator",
             "lastLogin": "2020-01-01T09:00:00Z", "email": "alice@example.com"},
            {"id": "luid-bob", "name": "bob@example.com", "siteRole": "Viewer",
             "lastLogin": "2099-01-01T09:00:00Z"},
            {"id": "luid-carol", "name": "carol", "siteRole": "Explorer"}
        ]}
    }))
    .into_response()
}

async fn update_user(headers: HeaderMap, Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return api_error(StatusCode::UNAUTHORIZED, "401002", "Unauthorized Access", "no token");
    }
    if id == MISSING_USER {
        return api_error(StatusCode::NOT_FOUND, "404002", "Resource Not Found", "user not found");
    }
    Json(json!({"user": {"id": id, "name": id, "siteRole": body["user"]["siteRole"]}})).into_response()
}

async fn remove_user(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !authorized(&headers) {
        return api_error(StatusCode::UNAUTHORIZED, "401002", "Unauthorized Access", "no token");
    }
    match id.as_str() {
        MISSING_USER => {
            api_error(StatusCode::NOT_FOUND, "404002", "Resource Not Found", "user not found")
        }
        LOCKED_USER => api_error(StatusCode::CONFLICT, "409003", "Conflict", "user owns content"),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}
