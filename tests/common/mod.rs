#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use rorsync::remote::StorageConfig;
use rorsync::sync::SyncObserver;

pub const TEST_KEY: &str = "test-key";

// In-memory stand-in for the remote blob store and its ledger table.
// Counters let tests assert on traffic (or the absence of it).
#[derive(Default)]
pub struct StubState {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    blocks: Mutex<HashMap<String, Vec<u8>>>,
    ledger: Mutex<Vec<serde_json::Value>>,
    // (blob id, committed byte length) per blocklist commit.
    commit_log: Mutex<Vec<(String, usize)>>,
    stage_calls: Mutex<usize>,
    requests: Mutex<usize>,
    background: Mutex<Option<Vec<u8>>>,
}

pub struct StubServer {
    pub base_url: String,
    pub state: Arc<StubState>,
}

impl StubServer {
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            base_url: self.base_url.clone(),
            account_key: TEST_KEY.to_string(),
            environment: "prod".to_string(),
        }
    }

    pub fn put_blob(&self, container: &str, key: &str, bytes: Vec<u8>) {
        self.state
            .blobs
            .lock()
            .unwrap()
            .insert(format!("{}/{}", container, key), bytes);
    }

    pub fn blob(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .blobs
            .lock()
            .unwrap()
            .get(&format!("{}/{}", container, key))
            .cloned()
    }

    pub fn set_background(&self, bytes: Vec<u8>) {
        *self.state.background.lock().unwrap() = Some(bytes);
    }

    pub fn ledger_rows(&self) -> Vec<serde_json::Value> {
        self.state.ledger.lock().unwrap().clone()
    }

    pub fn commit_log(&self, container: &str, key: &str) -> Vec<usize> {
        let id = format!("{}/{}", container, key);
        self.state
            .commit_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == id)
            .map(|(_, len)| *len)
            .collect()
    }

    pub fn stage_calls(&self) -> usize {
        *self.state.stage_calls.lock().unwrap()
    }

    pub fn request_count(&self) -> usize {
        *self.state.requests.lock().unwrap()
    }
}

pub fn spawn_store() -> StubServer {
    let state = Arc::new(StubState::default());
    let app_state = state.clone();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
    let addr = listener.local_addr().expect("stub local addr");
    listener.set_nonblocking(true).expect("set nonblocking");

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build stub runtime");
        rt.block_on(async move {
            let app = Router::new()
                .route(
                    "/containers/:container/blobs/*rest",
                    get(get_blob).put(put_blob),
                )
                .route("/tables/uploads/:partition", get(get_ledger))
                .route("/tables/uploads", post(post_ledger))
                .route("/background/*rest", get(get_background))
                .layer(DefaultBodyLimit::disable())
                .with_state(app_state);
            let listener =
                tokio::net::TcpListener::from_std(listener).expect("tokio listener");
            axum::serve(listener, app).await.expect("serve stub");
        });
    });

    StubServer {
        base_url: format!("http://{}", addr),
        state,
    }
}

fn key_ok(headers: &HeaderMap) -> bool {
    headers
        .get("x-storage-key")
        .map(|v| v == TEST_KEY)
        .unwrap_or(false)
}

async fn get_blob(
    State(state): State<Arc<StubState>>,
    Path((container, rest)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    *state.requests.lock().unwrap() += 1;
    if !key_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state
        .blobs
        .lock()
        .unwrap()
        .get(&format!("{}/{}", container, rest))
    {
        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn put_blob(
    State(state): State<Arc<StubState>>,
    Path((container, rest)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    *state.requests.lock().unwrap() += 1;
    if !key_ok(&headers) {
        return StatusCode::UNAUTHORIZED;
    }

    if let Some((key, block_id)) = rest.rsplit_once("/blocks/") {
        state
            .blocks
            .lock()
            .unwrap()
            .insert(format!("{}/{}#{}", container, key, block_id), body.to_vec());
        *state.stage_calls.lock().unwrap() += 1;
        return StatusCode::CREATED;
    }

    if let Some(key) = rest.strip_suffix("/blocklist") {
        let commit: serde_json::Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(_) => return StatusCode::BAD_REQUEST,
        };
        let Some(ids) = commit["block_ids"].as_array() else {
            return StatusCode::BAD_REQUEST;
        };
        let mut assembled = Vec::new();
        {
            let blocks = state.blocks.lock().unwrap();
            for id in ids {
                let Some(id) = id.as_str() else {
                    return StatusCode::BAD_REQUEST;
                };
                match blocks.get(&format!("{}/{}#{}", container, key, id)) {
                    Some(bytes) => assembled.extend_from_slice(bytes),
                    None => return StatusCode::BAD_REQUEST,
                }
            }
        }
        let blob_id = format!("{}/{}", container, key);
        state
            .commit_log
            .lock()
            .unwrap()
            .push((blob_id.clone(), assembled.len()));
        state.blobs.lock().unwrap().insert(blob_id, assembled);
        return StatusCode::OK;
    }

    StatusCode::NOT_FOUND
}

async fn get_ledger(
    State(state): State<Arc<StubState>>,
    Path(partition): Path<String>,
    headers: HeaderMap,
) -> Response {
    *state.requests.lock().unwrap() += 1;
    if !key_ok(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let rows: Vec<serde_json::Value> = state
        .ledger
        .lock()
        .unwrap()
        .iter()
        .filter(|r| r["partition_key"] == partition.as_str())
        .cloned()
        .collect();
    Json(serde_json::json!({ "rows": rows })).into_response()
}

async fn post_ledger(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(row): Json<serde_json::Value>,
) -> StatusCode {
    *state.requests.lock().unwrap() += 1;
    if !key_ok(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    state.ledger.lock().unwrap().push(row);
    StatusCode::CREATED
}

async fn get_background(
    State(state): State<Arc<StubState>>,
    Path(_rest): Path<String>,
) -> Response {
    *state.requests.lock().unwrap() += 1;
    match state.background.lock().unwrap().clone() {
        Some(bytes) => (StatusCode::OK, bytes).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub progress: Vec<u8>,
    pub process_names: Vec<String>,
    pub infos: Vec<String>,
    pub warnings: Vec<String>,
}

impl SyncObserver for RecordingObserver {
    fn on_progress(&mut self, pct: u8) {
        self.progress.push(pct);
    }

    fn on_process_name(&mut self, name: &str) {
        self.process_names.push(name.to_string());
    }

    fn on_info(&mut self, msg: &str) {
        self.infos.push(msg.to_string());
    }

    fn on_warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }
}

// Serializes a dataset document the way `Dataset` stores it on disk.
pub fn dataset_bytes(tables: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec_pretty(&serde_json::json!({
        "version": 1,
        "tables": tables,
    }))
    .expect("serialize dataset fixture")
}
