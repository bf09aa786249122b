use crate::AppState;
use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, Method},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use service_core::error::AppError;
use service_core::observability::extract_request_id;

pub const MISSING_ENDPOINT: &str = "Missing endpoint query parameter";
pub const ENDPOINT_NOT_ALLOWED: &str = "Endpoint not allowed";

#[derive(Debug, Deserialize)]
pub struct RelayParams {
    pub endpoint: Option<String>,
}

/// Pull a non-empty `endpoint` out of the raw query string.
fn endpoint_param(query: Option<&str>) -> Option<String> {
    serde_urlencoded::from_str::<RelayParams>(query.unwrap_or_default())
        .ok()
        .and_then(|params| params.endpoint)
        .filter(|endpoint| !endpoint.trim().is_empty())
}

/// `/relay?endpoint=<path>`: forward GET/POST to the upstream service.
///
/// Checks run in order: endpoint present (400), method supported (405),
/// endpoint allowed (403). Only then is the upstream called.
#[tracing::instrument(name = "relay", skip_all, fields(method = %method, endpoint = tracing::field::Empty))]
pub async fn relay(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let endpoint = endpoint_param(query.as_deref())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!(MISSING_ENDPOINT)))?;
    tracing::Span::current().record("endpoint", endpoint.as_str());

    let body = match method {
        Method::GET => None,
        Method::POST => Some(body),
        _ => return Err(AppError::MethodNotAllowed),
    };

    let (endpoint, pattern) = state.allow_list.resolve(&endpoint).ok_or_else(|| {
        tracing::warn!(endpoint = %endpoint, "Rejected endpoint outside the allow-list");
        AppError::Forbidden(anyhow::anyhow!(ENDPOINT_NOT_ALLOWED))
    })?;

    let request_id = extract_request_id(&headers);
    let result = state
        .upstream
        .forward(method, &endpoint, body, request_id.as_deref())
        .await;

    let status = match &result {
        Ok(_) => "200".to_string(),
        Err(e) => e.status().as_u16().to_string(),
    };
    metrics::counter!(
        "relay_upstream_requests_total",
        "endpoint" => pattern.to_string(),
        "status" => status
    )
    .increment(1);

    result.map(Json)
}
