#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use immich_slideshow::config::{ApiKey, Configuration, QueryMode};
use immich_slideshow::immich::client::ImmichClient;

pub const API_KEY: &str = "test-key";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub query: HashMap<String, String>,
    pub api_key: Option<String>,
    pub accept: Option<String>,
    pub body: Option<Value>,
}

/// What the fake server answers with. Tests mutate this between calls.
pub struct Behaviour {
    pub random: Value,
    pub assets: Value,
    pub albums: HashMap<String, Value>,
    pub album_list: Value,
    pub search: Value,
    /// When set, every JSON endpoint answers with this status.
    pub json_failure: Option<StatusCode>,
    /// When set, JSON endpoints answer 200 with a body that is not JSON.
    pub malformed_json: bool,
    pub thumbnail_status: StatusCode,
    /// Delay before a thumbnail is served.
    pub thumbnail_delay: Option<Duration>,
    pub ping_status: StatusCode,
    pub requests: Vec<RecordedRequest>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            random: json!([]),
            assets: json!([]),
            albums: HashMap::new(),
            album_list: json!([]),
            search: json!({"assets": {"items": []}}),
            json_failure: None,
            malformed_json: false,
            thumbnail_status: StatusCode::OK,
            thumbnail_delay: None,
            ping_status: StatusCode::OK,
            requests: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeImmich {
    inner: Arc<Mutex<Behaviour>>,
}

impl FakeImmich {
    pub fn update(&self, f: impl FnOnce(&mut Behaviour)) {
        f(&mut self.inner.lock().unwrap());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.starts_with(prefix))
            .collect()
    }

    fn record(
        &self,
        method: &'static str,
        path: String,
        query: HashMap<String, String>,
        headers: &HeaderMap,
        body: Option<Value>,
    ) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let api_key = header("x-api-key");
        let accept = header("accept");
        self.inner.lock().unwrap().requests.push(RecordedRequest {
            method,
            path,
            query,
            api_key,
            accept,
            body,
        });
    }

    fn json_reply(&self, pick: impl FnOnce(&Behaviour) -> Option<Value>) -> Response {
        let behaviour = self.inner.lock().unwrap();
        if let Some(status) = behaviour.json_failure {
            return (status, "failure").into_response();
        }
        if behaviour.malformed_json {
            return (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                "{\"assets\": [",
            )
                .into_response();
        }
        match pick(&behaviour) {
            Some(body) => Json(body).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }
}

pub struct Server {
    pub base_url: String,
    pub fake: FakeImmich,
    handle: JoinHandle<()>,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn() -> Server {
    let fake = FakeImmich::default();
    let app = Router::new()
        .route("/api/assets/random", get(random))
        .route("/api/assets", get(assets))
        .route("/api/assets/{id}/thumbnail", get(thumbnail))
        .route("/api/albums", get(album_list))
        .route("/api/albums/{id}", get(album))
        .route("/api/search/metadata", post(search))
        .route("/api/server/ping", get(ping))
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        base_url: format!("http://{addr}"),
        fake,
        handle,
    }
}

async fn random(
    State(fake): State<FakeImmich>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    fake.record("GET", "/api/assets/random".into(), query, &headers, None);
    fake.json_reply(|b| Some(b.random.clone()))
}

async fn assets(
    State(fake): State<FakeImmich>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    fake.record("GET", "/api/assets".into(), query, &headers, None);
    fake.json_reply(|b| Some(b.assets.clone()))
}

async fn album_list(State(fake): State<FakeImmich>, headers: HeaderMap) -> Response {
    fake.record("GET", "/api/albums".into(), HashMap::new(), &headers, None);
    fake.json_reply(|b| Some(b.album_list.clone()))
}

async fn album(
    State(fake): State<FakeImmich>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    fake.record("GET", format!("/api/albums/{id}"), HashMap::new(), &headers, None);
    fake.json_reply(|b| b.albums.get(&id).cloned())
}

async fn search(
    State(fake): State<FakeImmich>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.record(
        "POST",
        "/api/search/metadata".into(),
        HashMap::new(),
        &headers,
        Some(body),
    );
    fake.json_reply(|b| Some(b.search.clone()))
}

async fn thumbnail(
    State(fake): State<FakeImmich>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    fake.record("GET", format!("/api/assets/{id}/thumbnail"), query, &headers, None);
    let (status, delay) = {
        let behaviour = fake.inner.lock().unwrap();
        (behaviour.thumbnail_status, behaviour.thumbnail_delay)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if status != StatusCode::OK {
        return (status, "thumbnail failure").into_response();
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/jpeg")],
        preview_bytes(&id),
    )
        .into_response()
}

async fn ping(State(fake): State<FakeImmich>, headers: HeaderMap) -> Response {
    fake.record("GET", "/api/server/ping".into(), HashMap::new(), &headers, None);
    let status = fake.inner.lock().unwrap().ping_status;
    if status == StatusCode::OK {
        Json(json!({"res": "pong"})).into_response()
    } else {
        status.into_response()
    }
}

/// Bytes the fake serves as the preview of `id`.
pub fn preview_bytes(id: &str) -> Vec<u8> {
    format!("preview:{id}").into_bytes()
}

pub fn image(id: &str) -> Value {
    json!({
        "id": id,
        "type": "IMAGE",
        "originalFileName": format!("{id}.jpg"),
        "fileCreatedAt": "2024-05-01T08:00:00.000Z",
    })
}

pub fn video(id: &str) -> Value {
    json!({"id": id, "type": "VIDEO", "originalFileName": format!("{id}.mp4")})
}

pub fn images(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| image(id)).collect())
}

pub fn client(base_url: &str) -> ImmichClient {
    ImmichClient::new(
        reqwest::Client::new(),
        base_url,
        ApiKey::new(API_KEY),
        Duration::from_secs(5),
    )
    .unwrap()
}

pub fn config(base_url: &str, query: QueryMode) -> Configuration {
    Configuration {
        host: base_url.to_string(),
        api_key: ApiKey::new(API_KEY),
        query,
        ..Configuration::default()
    }
}
