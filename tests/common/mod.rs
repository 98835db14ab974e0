//! Shared test utilities for integration tests.
//!
//! `TestClient` drives the full router in-process. `FakeUpstream` stands in
//! for the data platform: a real HTTP server on an OS-assigned port that
//! answers the object API from in-memory rows and records every request.

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use agf_dash::config::Config;
use agf_dash::server;
use agf_dash::services::category::{CategoryIdTable, CategoryNormalizer};
use agf_dash::state::AppState;

pub const API_KEY: &str = "test-key";

pub struct TestClient {
    state: AppState,
}

impl TestClient {
    /// Client with default configuration (no upstream credentials).
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let normalizer = CategoryNormalizer::new(CategoryIdTable::builtin());
        Self {
            state: AppState::new(config, normalizer),
        }
    }

    /// Client whose upstream is `upstream`.
    pub fn for_upstream(upstream: &FakeUpstream) -> Self {
        Self::with_config(upstream.config())
    }

    /// Full router with the production middleware stack.
    pub fn router(&self) -> Router {
        server::router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = self.router().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8_lossy(&body).to_string())
    }

    /// Make a GET request and return status and body.
    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        let (status, _, body) = self
            .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;
        (status, body)
    }

    /// Make a GET request and parse the body as JSON.
    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        let value = serde_json::from_str(&body)
            .unwrap_or_else(|e| panic!("invalid JSON from {uri}: {e}\n{body}"));
        (status, value)
    }

    /// Make a POST request with a JSON body and return status and body.
    pub async fn post_json(&self, uri: &str, body: &str) -> (StatusCode, String) {
        let (status, _, body) = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;
        (status, body)
    }
}

/// A request the fake platform received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub params: HashMap<String, String>,
    pub authorization: Option<String>,
}

impl RecordedRequest {
    pub fn object_type(&self) -> &str {
        self.path
            .trim_start_matches("/api/1.1/obj/")
            .split('/')
            .next()
            .unwrap_or("")
    }

    pub fn constraints(&self) -> Vec<Value> {
        self.params
            .get("constraints")
            .map(|c| serde_json::from_str(c).unwrap())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, Vec<Value>>,
    page_size: Option<usize>,
    fail_status: Option<u16>,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub struct FakeUpstream {
    pub base_url: String,
    inner: Arc<Inner>,
}

pub struct FakeUpstreamBuilder {
    inner: Inner,
}

impl FakeUpstreamBuilder {
    pub fn objects(mut self, object_type: &str, rows: Vec<Value>) -> Self {
        self.inner.objects.insert(object_type.to_string(), rows);
        self
    }

    /// Cap every page at `size` rows regardless of the requested limit.
    pub fn page_size(mut self, size: usize) -> Self {
        self.inner.page_size = Some(size);
        self
    }

    /// Answer every request with `status`.
    pub fn failing(mut self, status: u16) -> Self {
        self.inner.fail_status = Some(status);
        self
    }

    pub async fn start(self) -> FakeUpstream {
        let inner = Arc::new(self.inner);
        let app = Router::new()
            .route("/api/1.1/obj/:object_type", get(list_objects))
            .route("/api/1.1/obj/:object_type/:id", get(get_object))
            .with_state(inner.clone());

        let (port, _handle) = server::serve(app, "127.0.0.1", 0).await.unwrap();

        FakeUpstream {
            base_url: format!("http://127.0.0.1:{port}"),
            inner,
        }
    }
}

impl FakeUpstream {
    pub fn builder() -> FakeUpstreamBuilder {
        FakeUpstreamBuilder {
            inner: Inner::default(),
        }
    }

    pub fn config(&self) -> Config {
        Config {
            bubble_base_url: Some(format!("{}/", self.base_url)),
            bubble_api_key: Some(API_KEY.into()),
            ..Config::default()
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, object_type: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.object_type() == object_type)
            .collect()
    }
}

fn record(
    inner: &Inner,
    path: String,
    params: HashMap<String, String>,
    headers: &HeaderMap,
) -> Option<Response> {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    inner.requests.lock().unwrap().push(RecordedRequest {
        path,
        params,
        authorization,
    });

    inner
        .fail_status
        .map(|status| (StatusCode::from_u16(status).unwrap(), "boom").into_response())
}

fn matches(row: &Value, constraint: &Value) -> bool {
    let key = constraint["key"].as_str().unwrap_or_default();
    let field = &row[key];
    match constraint["constraint_type"].as_str() {
        Some("equals") => *field == constraint["value"],
        Some("in") => constraint["value"]
            .as_array()
            .is_some_and(|values| values.contains(field)),
        _ => false,
    }
}

async fn list_objects(
    State(inner): State<Arc<Inner>>,
    Path(object_type): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/api/1.1/obj/{object_type}");
    if let Some(failure) = record(&inner, path, params.clone(), &headers) {
        return failure;
    }

    let constraints: Vec<Value> = params
        .get("constraints")
        .map(|c| serde_json::from_str(c).unwrap())
        .unwrap_or_default();
    let rows: Vec<&Value> = inner
        .objects
        .get(&object_type)
        .map(|rows| {
            rows.iter()
                .filter(|row| constraints.iter().all(|c| matches(row, c)))
                .collect()
        })
        .unwrap_or_default();

    let limit: usize = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(100);
    let limit = inner.page_size.map_or(limit, |size| size.min(limit));
    let cursor: usize = params
        .get("cursor")
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);

    let page: Vec<&Value> = rows.iter().skip(cursor).take(limit).copied().collect();
    let remaining = rows.len().saturating_sub(cursor + page.len());

    Json(json!({
        "response": {
            "cursor": cursor,
            "count": page.len(),
            "remaining": remaining,
            "results": page,
        }
    }))
    .into_response()
}

async fn get_object(
    State(inner): State<Arc<Inner>>,
    Path((object_type, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let path = format!("/api/1.1/obj/{object_type}/{id}");
    if let Some(failure) = record(&inner, path, HashMap::new(), &headers) {
        return failure;
    }

    let found = inner
        .objects
        .get(&object_type)
        .and_then(|rows| rows.iter().find(|row| row["_id"] == id.as_str()));
    match found {
        Some(row) => Json(json!({ "response": row })).into_response(),
        None => (StatusCode::NOT_FOUND, "missing").into_response(),
    }
}
