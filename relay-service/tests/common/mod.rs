use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use relay_service::config::{default_allowed_endpoints, ServerSettings, Settings, UpstreamSettings};
use relay_service::startup::Application;
use service_core::config::TelemetrySettings;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// A call the mock upstream received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub request_id: Option<String>,
    pub body: Bytes,
}

#[derive(Clone, Default)]
struct MockState {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    responses: Arc<Mutex<HashMap<String, (StatusCode, String)>>>,
}

/// Stand-in for the inference service. Answers scripted responses by path
/// and records every call.
pub struct MockUpstream {
    pub base_url: String,
    state: MockState,
}

async fn mock_handler(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.calls.lock().unwrap().push(RecordedCall {
        method,
        path: path.clone(),
        content_type: header("content-type"),
        request_id: header("x-request-id"),
        body,
    });

    let scripted = state.responses.lock().unwrap().get(&path).cloned();
    match scripted {
        Some((status, body)) => (status, [("content-type", "application/json")], body).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            [("content-type", "application/json")],
            r#"{"detail":"Not Found"}"#.to_string(),
        )
            .into_response(),
    }
}

impl MockUpstream {
    pub async fn spawn() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .fallback(mock_handler)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://127.0.0.1:{}/api", port),
            state,
        }
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: &str) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }
}

pub struct TestApp {
    pub address: String,
}

impl TestApp {
    pub async fn spawn(upstream_base_url: &str) -> Self {
        let settings = Settings {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_allowed_origins: vec![],
            },
            upstream: UpstreamSettings {
                base_url: upstream_base_url.to_string(),
                allowed_endpoints: default_allowed_endpoints(),
            },
            telemetry: TelemetrySettings::default(),
        };

        let app = Application::build(settings)
            .await
            .expect("Failed to build test application");
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp { address }
    }

    pub fn relay_url(&self, endpoint: &str) -> String {
        format!("{}/relay?endpoint={}", self.address, endpoint)
    }
}
