use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use relay_service::config::{default_allowed_endpoints, ServerSettings, UpstreamSettings};
use relay_service::startup::build_router;
use relay_service::AppState;
use tower::util::ServiceExt;

fn router(cors_allowed_origins: Vec<String>) -> axum::Router {
    let state = AppState::from_settings(&UpstreamSettings {
        base_url: "http://127.0.0.1:9/api".to_string(),
        allowed_endpoints: default_allowed_endpoints(),
    });
    build_router(
        state,
        &ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_allowed_origins,
        },
    )
}

#[tokio::test]
async fn missing_endpoint_is_rejected_without_network() {
    let response = router(vec![])
        .oneshot(Request::builder().uri("/relay").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Missing endpoint query parameter");
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let response = router(vec!["http://localhost:5173".to_string()])
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/relay?endpoint=videos/generate")
                .header("origin", "http://localhost:5173")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let response = router(vec![])
        .oneshot(Request::builder().uri("/api/videos").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
