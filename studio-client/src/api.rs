//! HTTP access to the relay service.

use crate::error::{
    ClientError, CONNECT_FAILED, GENERATION_FAILED, INVALID_RESPONSE, LIST_FAILED,
};
use crate::models::{GenerationRequest, GenerationResponse, VideoRecord};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const ROUTE_GENERATE: &str = "videos/generate";
pub const ROUTE_VIDEOS: &str = "videos";

/// Operations the studio needs from the video backend.
#[async_trait]
pub trait VideoApi: Send + Sync {
    /// Submit a prompt and wait for the finished video's URL.
    ///
    /// Never returns an empty URL: a success without one is a
    /// [`ClientError::GenerationFailed`].
    async fn request_generation(&self, request: &GenerationRequest) -> Result<String, ClientError>;

    /// Snapshot of previously generated videos.
    async fn list_videos(&self) -> Result<Vec<VideoRecord>, ClientError>;

    async fn get_video(&self, id: &str) -> Result<VideoRecord, ClientError>;
}

/// [`VideoApi`] backed by the relay's `/relay?endpoint=` contract.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    relay_url: String,
}

impl RelayClient {
    /// `relay_url` is the full relay route, e.g. `http://localhost:8080/relay`.
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), relay_url)
    }

    pub fn with_client(client: Client, relay_url: impl Into<String>) -> Self {
        Self {
            client,
            relay_url: relay_url.into(),
        }
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    fn request(&self, method: Method, endpoint: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, &self.relay_url)
            .query(&[("endpoint", endpoint)])
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(StatusCode, Vec<u8>), ClientError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(relay = %self.relay_url, error = %e, "Relay request failed");
            ClientError::Transport(CONNECT_FAILED.to_string())
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            tracing::error!(relay = %self.relay_url, error = %e, "Failed to read relay response");
            ClientError::Transport(CONNECT_FAILED.to_string())
        })?;

        Ok((status, body.to_vec()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        fallback: &str,
    ) -> Result<T, ClientError> {
        let (status, body) = self.send(self.request(Method::GET, endpoint)).await?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| fallback.to_string());
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(endpoint = %endpoint, error = %e, "Unexpected relay response body");
            ClientError::Upstream {
                status: status.as_u16(),
                message: INVALID_RESPONSE.to_string(),
            }
        })
    }
}

/// `error` (relay envelope) or `detail` string from an error body.
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["error", "detail"].iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}

/// Whether `id` can travel as one `videos/{id}` segment through the relay,
/// which only forwards `[A-Za-z0-9_.-]` segments other than `.` and `..`.
fn is_routable_id(id: &str) -> bool {
    !matches!(id, "." | "..")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[async_trait]
impl VideoApi for RelayClient {
    #[tracing::instrument(skip_all, fields(enable_audio = request.enable_audio))]
    async fn request_generation(&self, request: &GenerationRequest) -> Result<String, ClientError> {
        let (status, body) = self
            .send(self.request(Method::POST, ROUTE_GENERATE).json(request))
            .await
            .map_err(|_| ClientError::GenerationFailed {
                status: None,
                message: CONNECT_FAILED.to_string(),
            })?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| GENERATION_FAILED.to_string());
            tracing::warn!(status = status.as_u16(), message = %message, "Video generation failed");
            return Err(ClientError::GenerationFailed {
                status: Some(status.as_u16()),
                message,
            });
        }

        let response: GenerationResponse = serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(error = %e, "Unexpected generation response body");
            ClientError::GenerationFailed {
                status: Some(status.as_u16()),
                message: INVALID_RESPONSE.to_string(),
            }
        })?;

        let video_url = response.video_url.trim();
        if video_url.is_empty() {
            return Err(ClientError::GenerationFailed {
                status: Some(status.as_u16()),
                message: INVALID_RESPONSE.to_string(),
            });
        }

        tracing::info!(video_id = ?response.id, "Video generated");
        Ok(video_url.to_string())
    }

    async fn list_videos(&self) -> Result<Vec<VideoRecord>, ClientError> {
        self.get_json(ROUTE_VIDEOS, LIST_FAILED).await
    }

    async fn get_video(&self, id: &str) -> Result<VideoRecord, ClientError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ClientError::Validation("Video id cannot be empty".to_string()));
        }

        if !is_routable_id(id) {
            return Err(ClientError::Validation(format!("Invalid video id: {}", id)));
        }

        let endpoint = format!("{}/{}", ROUTE_VIDEOS, id);
        self.get_json(&endpoint, "Failed to load video")
            .await
            .map_err(|e| match e {
                ClientError::Upstream { status: 404, .. } => ClientError::NotFound(id.to_string()),
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_error_then_detail() {
        assert_eq!(
            error_message(br#"{"error":"quota exceeded","detail":"x"}"#).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            error_message(br#"{"detail":"Video not found"}"#).as_deref(),
            Some("Video not found")
        );
        assert_eq!(error_message(br#"{"error":"  "}"#), None);
        assert_eq!(error_message(b"<html>"), None);
    }

    #[test]
    fn routable_ids_match_relay_segments() {
        for id in ["v1", "2024-05-01_clip.v2", "ABC"] {
            assert!(is_routable_id(id), "{id}");
        }
        for id in ["my video", "a/b", "..", ".", "café", "50%"] {
            assert!(!is_routable_id(id), "{id}");
        }
    }

    #[tokio::test]
    async fn unroutable_id_is_rejected_without_a_call() {
        // Nothing listens here; a network attempt would surface as Transport.
        let client = RelayClient::new("http://127.0.0.1:9/relay");

        let err = client.get_video("my video").await.unwrap_err();

        match err {
            ClientError::Validation(message) => assert_eq!(message, "Invalid video id: my video"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
