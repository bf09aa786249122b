//! Client for the upstream inference service.
//!
//! One attempt per call: no retries and no timeout beyond reqwest's defaults.

use crate::config::UpstreamSettings;
use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use reqwest::Client;
use serde_json::Value;
use service_core::error::AppError;
use service_core::observability::TracedClientExt;

/// Message used when the upstream gives no usable error text.
pub const GENERIC_UPSTREAM_ERROR: &str = "Failed to call upstream API";

pub const INVALID_UPSTREAM_RESPONSE: &str = "Invalid response from upstream service";

pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(settings: &UpstreamSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Forward a call to `<base>/<endpoint>` and return the upstream JSON body.
    ///
    /// `body` is sent verbatim as `application/json` when present. Non-2xx
    /// responses become [`AppError::Upstream`] with the upstream status.
    pub async fn forward(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Bytes>,
        request_id: Option<&str>,
    ) -> Result<Value, AppError> {
        let url = self.url_for(endpoint);

        let mut request = self.client.traced_request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json_bytes(body);
        }

        let response = request.send_with_request_id(request_id).await.map_err(|e| {
            tracing::error!(method = %method, url = %url, error = %e, "Upstream request failed");
            AppError::upstream(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_UPSTREAM_ERROR)
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "Failed to read upstream response body");
            AppError::upstream(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_UPSTREAM_ERROR)
        })?;

        if status.is_success() {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes).map_err(|e| {
                tracing::error!(url = %url, error = %e, "Upstream returned non-JSON body");
                AppError::upstream(StatusCode::INTERNAL_SERVER_ERROR, INVALID_UPSTREAM_RESPONSE)
            });
        }

        let message = upstream_error_message(&bytes);
        tracing::warn!(
            url = %url,
            status = status.as_u16(),
            message = %message,
            "Upstream returned an error"
        );

        Err(AppError::upstream(status, message))
    }
}

/// Best available error text from an upstream error body: `error`, then
/// `detail`, then a generic message.
pub fn upstream_error_message(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "detail"].iter().find_map(|key| {
                value
                    .get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| GENERIC_UPSTREAM_ERROR.to_string())
}
