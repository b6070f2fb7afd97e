//! Mock documentation backend for integration tests.
//!
//! Serves the project directory, raw documents, the ingestion endpoint and
//! per-session log streams on an ephemeral port. Log frames for a session
//! are only sent once the matching `POST /api/ingest` has arrived, the way
//! a real backend starts emitting after it accepted the job.

#![allow(dead_code)]

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use docview::config::BackendConfig;

#[derive(Clone)]
pub struct MockBackend {
    /// `None` makes `/api/projects` answer 500.
    pub dynamic: Option<Value>,
    /// `None` makes `/projects.json` answer 404.
    pub manifest: Option<Value>,
    /// Keyed by `{project}/{file}`.
    pub documents: HashMap<String, String>,
    /// `Some(reason)` makes `/api/ingest` answer 500 with that body.
    pub reject_ingest: Option<String>,
    /// Frames sent on every log stream after its job was submitted.
    pub frames: Vec<Value>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            dynamic: Some(demo_projects()),
            manifest: Some(json!([])),
            documents: HashMap::from([
                (
                    "demo/01_intro.md".to_string(),
                    "# Intro\n\nWelcome to *Demo*.\n".to_string(),
                ),
                (
                    "demo/02_usage.md".to_string(),
                    "# Usage\n\nRun `demo --help`.\n".to_string(),
                ),
            ]),
            reject_ingest: None,
            frames: Vec::new(),
        }
    }
}

pub fn demo_projects() -> Value {
    json!([
        {
            "id": "demo",
            "name": "Demo",
            "files": [
                {"name": "01_intro.md", "path": "/output/demo/01_intro.md"},
                {"name": "02_usage.md", "path": "/output/demo/02_usage.md"}
            ]
        }
    ])
}

/// What the backend observed.
#[derive(Clone)]
pub struct Recorder {
    pub submissions: Arc<Mutex<Vec<Value>>>,
    pub client_closed: Arc<AtomicBool>,
    submitted_ids: watch::Sender<Vec<String>>,
}

impl Recorder {
    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn client_closed(&self) -> bool {
        self.client_closed.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct AppState {
    backend: Arc<MockBackend>,
    recorder: Recorder,
}

pub struct RunningBackend {
    pub base_url: String,
    pub recorder: Recorder,
}

impl RunningBackend {
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.base_url.clone(),
            timeout_secs: 5,
            ..BackendConfig::default()
        }
    }
}

pub async fn start(backend: MockBackend) -> RunningBackend {
    let (submitted_ids, _) = watch::channel(Vec::new());
    let recorder = Recorder {
        submissions: Arc::new(Mutex::new(Vec::new())),
        client_closed: Arc::new(AtomicBool::new(false)),
        submitted_ids,
    };
    let state = AppState {
        backend: Arc::new(backend),
        recorder: recorder.clone(),
    };

    let app = Router::new()
        .route("/api/projects", get(dynamic_projects))
        .route("/projects.json", get(manifest))
        .route("/output/{project}/{file}", get(document))
        .route("/api/ingest", post(ingest))
        .route("/ws/logs/{id}", get(logs))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    RunningBackend {
        base_url: format!("http://{}", addr),
        recorder,
    }
}

async fn dynamic_projects(State(state): State<AppState>) -> Response {
    match &state.backend.dynamic {
        Some(projects) => Json(projects.clone()).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "directory offline").into_response(),
    }
}

async fn manifest(State(state): State<AppState>) -> Response {
    match &state.backend.manifest {
        Some(projects) => Json(projects.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn document(
    State(state): State<AppState>,
    Path((project, file)): Path<(String, String)>,
) -> Response {
    match state.backend.documents.get(&format!("{}/{}", project, file)) {
        Some(content) => content.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn ingest(State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    state
        .recorder
        .submissions
        .lock()
        .unwrap()
        .push(payload.clone());

    if let Some(reason) = &state.backend.reject_ingest {
        return (StatusCode::INTERNAL_SERVER_ERROR, reason.clone()).into_response();
    }

    if let Some(id) = payload["client_id"].as_str() {
        let id = id.to_string();
        state.recorder.submitted_ids.send_modify(|ids| ids.push(id));
    }
    Json(json!({"message": "Ingestion started", "source": payload["source"]})).into_response()
}

async fn logs(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| stream_logs(socket, id, state))
}

async fn stream_logs(mut socket: WebSocket, id: String, state: AppState) {
    let mut submitted = state.recorder.submitted_ids.subscribe();
    if submitted.wait_for(|ids| ids.contains(&id)).await.is_err() {
        return;
    }

    for frame in &state.backend.frames {
        if socket
            .send(Message::Text(frame.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
    }

    // Stay open until the client hangs up.
    while let Some(Ok(msg)) = socket.recv().await {
        if let Message::Close(_) = msg {
            break;
        }
    }
    state.recorder.client_closed.store(true, Ordering::SeqCst);
}

/// A backend script for a successful run.
pub fn successful_run() -> Vec<Value> {
    vec![
        json!({"type": "status", "status": "processing", "message": "Job started"}),
        json!({"type": "log", "channel": "stdout", "message": "Cloning repository..."}),
        json!({"type": "progress", "percent": 40}),
        json!({"type": "log", "channel": "stdout", "message": "Generating docs..."}),
        json!({"type": "status", "status": "complete", "message": "Done"}),
    ]
}

/// A backend script for a run that fails after starting.
pub fn failed_run() -> Vec<Value> {
    vec![
        json!({"type": "log", "message": "Cloning repository..."}),
        json!({"type": "log", "channel": "stderr", "message": "fatal: repository not found"}),
        json!({"type": "status", "status": "error", "message": "Clone failed"}),
    ]
}
