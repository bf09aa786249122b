//! End-to-end workflow harness for the video studio.
//!
//! Every test context runs the whole chain in-process: a fake inference
//! service, the real relay listening on an ephemeral port, and a
//! [`GenerationSession`] talking to the relay over HTTP.

use anyhow::{anyhow, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use relay_service::config::{default_allowed_endpoints, ServerSettings, Settings, UpstreamSettings};
use relay_service::startup::Application;
use serde_json::{json, Value};
use service_core::config::TelemetrySettings;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use studio_client::{
    GenerationSession, MemoryStore, ProgressConfig, RelayClient, SessionStateStore,
};
use tokio::net::TcpListener;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workflow_tests=debug,relay_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[derive(Default)]
struct Library {
    videos: Vec<Value>,
    /// When set, generation answers with this status and `detail`.
    failure: Option<(StatusCode, String)>,
    generate_calls: usize,
}

/// In-memory stand-in for the inference service behind the relay.
#[derive(Clone)]
pub struct FakeInference {
    pub base_url: String,
    library: Arc<Mutex<Library>>,
}

async fn generate(State(library): State<Arc<Mutex<Library>>>, Json(body): Json<Value>) -> Response {
    let mut library = library.lock().unwrap();
    library.generate_calls += 1;

    if let Some((status, detail)) = library.failure.clone() {
        return (status, Json(json!({ "detail": detail }))).into_response();
    }

    let text = body.get("text").and_then(Value::as_str).unwrap_or_default();
    let has_audio = body
        .get("enableAudio")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let count = library.videos.len();
    let id = format!("v{}", count + 1);
    let url = format!("https://cdn.example.test/{}.mp4", id);
    let video = json!({
        "id": id,
        "title": text,
        "url": url,
        "createdAt": format!("2024-05-01T10:00:{:02}", count),
    });
    library.videos.push(video);

    Json(json!({ "videoUrl": url, "id": id, "title": text, "hasAudio": has_audio })).into_response()
}

async fn list_videos(State(library): State<Arc<Mutex<Library>>>) -> Json<Value> {
    Json(Value::Array(library.lock().unwrap().videos.clone()))
}

async fn get_video(State(library): State<Arc<Mutex<Library>>>, Path(id): Path<String>) -> Response {
    let library = library.lock().unwrap();
    match library.videos.iter().find(|v| v["id"] == id.as_str()) {
        Some(video) => Json(video.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Video not found" })),
        )
            .into_response(),
    }
}

impl FakeInference {
    pub async fn spawn() -> Result<Self> {
        let library = Arc::new(Mutex::new(Library::default()));
        let app = Router::new()
            .route("/api/videos", get(list_videos))
            .route("/api/videos/generate", post(generate))
            .route("/api/videos/:id", get(get_video))
            .with_state(library.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}/api", port),
            library,
        })
    }

    /// Make every following generation fail with `status` and `detail`.
    pub fn fail_generation(&self, status: StatusCode, detail: &str) {
        self.library.lock().unwrap().failure = Some((status, detail.to_string()));
    }

    pub fn generate_calls(&self) -> usize {
        self.library.lock().unwrap().generate_calls
    }

    pub fn video_count(&self) -> usize {
        self.library.lock().unwrap().videos.len()
    }
}

/// Fast progress so workflows finish in milliseconds.
pub fn test_progress() -> ProgressConfig {
    ProgressConfig {
        tick: Duration::from_millis(5),
        max_step: 10,
    }
}

/// One studio user wired through a live relay to the fake inference service.
pub struct WorkflowTestContext {
    pub inference: FakeInference,
    /// Base address of the relay, e.g. `http://127.0.0.1:40123`.
    pub relay_address: String,
    pub store: Arc<dyn SessionStateStore>,
    pub session: GenerationSession,
}

impl WorkflowTestContext {
    /// Start a fresh stack with an in-memory session store.
    pub async fn new() -> Result<Self> {
        Self::with_store(Arc::new(MemoryStore::new())).await
    }

    pub async fn with_store(store: Arc<dyn SessionStateStore>) -> Result<Self> {
        init_tracing();

        let inference = FakeInference::spawn().await?;

        let settings = Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_allowed_origins: vec![],
            },
            upstream: UpstreamSettings {
                base_url: inference.base_url.clone(),
                allowed_endpoints: default_allowed_endpoints(),
            },
            telemetry: TelemetrySettings::default(),
        };

        let app = Application::build(settings)
            .await
            .map_err(|e| anyhow!("Failed to build relay: {}", e))?;
        let relay_address = format!("http://127.0.0.1:{}", app.port());
        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        wait_for_relay(&relay_address, Duration::from_secs(10)).await?;

        let session = open_session(&relay_address, store.clone()).await?;

        Ok(Self {
            inference,
            relay_address,
            store,
            session,
        })
    }

    /// A second session over the same store, as after a client restart.
    pub async fn reopen_session(&self) -> Result<GenerationSession> {
        open_session(&self.relay_address, self.store.clone()).await
    }
}

async fn open_session(
    relay_address: &str,
    store: Arc<dyn SessionStateStore>,
) -> Result<GenerationSession> {
    let api = RelayClient::new(format!("{}/relay", relay_address));
    Ok(GenerationSession::restore(Arc::new(api), store, test_progress()).await?)
}

/// Poll the relay's health endpoint until it answers 200 OK.
pub async fn wait_for_relay(relay_address: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/health", relay_address);
    let start = std::time::Instant::now();

    loop {
        match client.get(&url).timeout(Duration::from_secs(2)).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => tracing::debug!("Relay not ready (status: {})", resp.status()),
            Err(e) => tracing::debug!("Relay not ready (error: {})", e),
        }

        if start.elapsed() > timeout {
            return Err(anyhow!("Timeout waiting for relay at {}", url));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
