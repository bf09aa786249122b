use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use studio_client::{ClientError, GenerationRequest, RelayClient, VideoApi};

type Script = Arc<Mutex<HashMap<String, (StatusCode, Value)>>>;

/// Stand-in for the relay: answers by `endpoint` query value and records
/// `(method, endpoint, body)` for each call.
struct FakeRelay {
    url: String,
    script: Script,
    seen: Arc<Mutex<Vec<(Method, String, Value)>>>,
}

impl FakeRelay {
    async fn spawn() -> Self {
        let script: Script = Arc::default();
        let seen: Arc<Mutex<Vec<(Method, String, Value)>>> = Arc::default();

        let app = Router::new()
            .route("/relay", any(relay))
            .with_state((script.clone(), seen.clone()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://127.0.0.1:{}/relay", port),
            script,
            seen,
        }
    }

    fn respond(&self, endpoint: &str, status: StatusCode, body: Value) {
        self.script
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), (status, body));
    }

    fn client(&self) -> RelayClient {
        RelayClient::new(self.url.clone())
    }
}

async fn relay(
    State((script, seen)): State<(Script, Arc<Mutex<Vec<(Method, String, Value)>>>)>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    let endpoint = params.get("endpoint").cloned().unwrap_or_default();
    let body = serde_json::from_str(&body).unwrap_or(Value::Null);
    seen.lock().unwrap().push((method, endpoint.clone(), body));

    match script.lock().unwrap().get(&endpoint) {
        Some((status, body)) => (*status, Json(body.clone())).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" }))).into_response(),
    }
}

#[tokio::test]
async fn generation_posts_prompt_and_returns_url() {
    let relay = FakeRelay::spawn().await;
    relay.respond(
        "videos/generate",
        StatusCode::OK,
        json!({ "videoUrl": "https://x/v1.mp4", "id": "v1", "title": "a cat", "hasAudio": true }),
    );

    let request = GenerationRequest::new("a cat playing piano", true).unwrap();
    let url = relay.client().request_generation(&request).await.unwrap();

    assert_eq!(url, "https://x/v1.mp4");
    let seen = relay.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, Method::POST);
    assert_eq!(seen[0].1, "videos/generate");
    assert_eq!(
        seen[0].2,
        json!({ "text": "a cat playing piano", "enableAudio": true })
    );
}

#[tokio::test]
async fn generation_failure_carries_relay_message() {
    let relay = FakeRelay::spawn().await;
    relay.respond(
        "videos/generate",
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "quota exceeded" }),
    );

    let request = GenerationRequest::new("a cat playing piano", true).unwrap();
    let err = relay
        .client()
        .request_generation(&request)
        .await
        .unwrap_err();

    match err {
        ClientError::GenerationFailed { status, message } => {
            assert_eq!(status, Some(500));
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn success_without_video_url_is_a_failure() {
    let relay = FakeRelay::spawn().await;
    relay.respond("videos/generate", StatusCode::OK, json!({ "id": "v1" }));

    let request = GenerationRequest::new("a cat playing piano", false).unwrap();
    let err = relay
        .client()
        .request_generation(&request)
        .await
        .unwrap_err();

    assert_eq!(
        err.user_message(),
        "Invalid response from the video generation service"
    );
}

#[tokio::test]
async fn unreachable_relay_is_reported_as_connection_failure() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = RelayClient::new(format!("http://127.0.0.1:{}/relay", port));
    let request = GenerationRequest::new("a cat playing piano", true).unwrap();

    let err = client.request_generation(&request).await.unwrap_err();
    assert!(matches!(err, ClientError::GenerationFailed { status: None, .. }));
    assert_eq!(
        err.user_message(),
        "Failed to connect to the video generation service"
    );

    let err = client.list_videos().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn empty_library_lists_no_videos() {
    let relay = FakeRelay::spawn().await;
    relay.respond("videos", StatusCode::OK, json!([]));

    let videos = relay.client().list_videos().await.unwrap();

    assert!(videos.is_empty());
}

#[tokio::test]
async fn listing_reads_video_records() {
    let relay = FakeRelay::spawn().await;
    relay.respond(
        "videos",
        StatusCode::OK,
        json!([
            { "id": "v1", "title": "a cat", "url": "https://x/v1.mp4", "createdAt": "2024-05-01T10:00:00" },
            { "id": "v2", "title": "a dog", "url": "https://x/v2.mp4", "createdAt": "2024-05-02T10:00:00" }
        ]),
    );

    let videos = relay.client().list_videos().await.unwrap();

    assert_eq!(videos.len(), 2);
    assert_eq!(videos[1].id, "v2");
    assert_eq!(videos[1].created_at, "2024-05-02T10:00:00");
}

#[tokio::test]
async fn missing_video_is_not_found() {
    let relay = FakeRelay::spawn().await;

    let err = relay.client().get_video("nope").await.unwrap_err();

    assert!(matches!(err, ClientError::NotFound(ref id) if id == "nope"));
    let seen = relay.seen.lock().unwrap().clone();
    assert_eq!(seen[0].0, Method::GET);
    assert_eq!(seen[0].1, "videos/nope");
}

#[tokio::test]
async fn list_failure_falls_back_to_generic_message() {
    let relay = FakeRelay::spawn().await;
    relay.respond("videos", StatusCode::BAD_GATEWAY, json!({ "unexpected": true }));

    let err = relay.client().list_videos().await.unwrap_err();

    match err {
        ClientError::Upstream { status, message } => {
            assert_eq!(status, 502);
            assert_eq!(message, "Failed to load videos");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
