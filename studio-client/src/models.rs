use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Longest prompt the inference service accepts.
pub const MAX_PROMPT_CHARS: u64 = 5000;

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Please enter some text to generate a video".into());
        return Err(err);
    }
    Ok(())
}

/// Body of `videos/generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[validate(
        custom(function = "not_blank"),
        length(max = 5000, message = "Text is too long (maximum 5000 characters)")
    )]
    pub text: String,
    pub enable_audio: bool,
}

impl GenerationRequest {
    /// Trim and validate a prompt.
    pub fn new(text: &str, enable_audio: bool) -> Result<Self, ClientError> {
        let request = Self {
            text: text.trim().to_string(),
            enable_audio,
        };

        request.validate().map_err(|errors| {
            let message = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "Invalid prompt".to_string());
            ClientError::Validation(message)
        })?;

        Ok(request)
    }
}

/// Answer of `videos/generate`. Only `videoUrl` is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub video_url: String,
    pub id: Option<String>,
    pub title: Option<String>,
    pub has_audio: Option<bool>,
}

/// A previously generated video, as listed by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Submitting,
}

/// Everything the studio shows about the current generation, persisted
/// key-by-key so a restart resumes where the user left off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSessionState {
    pub prompt_text: String,
    pub enable_audio: bool,
    pub video_url: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    /// Estimated completion, 0..=100. Simulated; the upstream reports none.
    pub progress: u8,
}

impl Default for ClientSessionState {
    fn default() -> Self {
        Self {
            prompt_text: String::new(),
            enable_audio: true,
            video_url: None,
            loading: false,
            error: None,
            progress: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_in_camel_case() {
        let request = GenerationRequest::new("  a cat playing piano ", true).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "text": "a cat playing piano", "enableAudio": true })
        );
    }

    #[test]
    fn blank_prompt_is_rejected() {
        for text in ["", "   ", "\n\t"] {
            match GenerationRequest::new(text, true) {
                Err(ClientError::Validation(message)) => {
                    assert_eq!(message, "Please enter some text to generate a video")
                }
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn overlong_prompt_is_rejected() {
        let text = "a".repeat(MAX_PROMPT_CHARS as usize + 1);
        assert!(matches!(
            GenerationRequest::new(&text, false),
            Err(ClientError::Validation(_))
        ));
        assert!(GenerationRequest::new(&text[1..], false).is_ok());
    }

    #[test]
    fn generation_response_tolerates_missing_extras() {
        let response: GenerationResponse =
            serde_json::from_str(r#"{"videoUrl":"https://x/v1.mp4"}"#).unwrap();
        assert_eq!(response.video_url, "https://x/v1.mp4");
        assert!(response.id.is_none());
    }

    #[test]
    fn video_record_reads_created_at() {
        let record: VideoRecord = serde_json::from_str(
            r#"{"id":"v1","title":"t","url":"https://x/v1.mp4","createdAt":"2024-05-01T10:00:00"}"#,
        )
        .unwrap();
        assert_eq!(record.created_at, "2024-05-01T10:00:00");
    }
}
