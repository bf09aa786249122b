use thiserror::Error;

/// Shown when the relay (or the upstream behind it) cannot be reached.
pub const CONNECT_FAILED: &str = "Failed to connect to the video generation service";

/// Shown when generation fails without a usable upstream message.
pub const GENERATION_FAILED: &str = "Failed to generate video";

/// Shown when the video list cannot be loaded and the upstream gave no reason.
pub const LIST_FAILED: &str = "Failed to load videos";

/// A 2xx answer whose body is not what the route promises.
pub const INVALID_RESPONSE: &str = "Invalid response from the video generation service";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// Prompt rejected before any network call.
    #[error("{0}")]
    Validation(String),

    /// A generation attempt failed upstream or in transit.
    #[error("{message}")]
    GenerationFailed {
        status: Option<u16>,
        message: String,
    },

    /// Non-2xx answer to a read call.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    Transport(String),

    #[error("Video not found: {0}")]
    NotFound(String),

    /// A generation is already in flight for this session.
    #[error("A video is already being generated")]
    Busy,

    #[error("Failed to persist session state: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    /// Text for the session error slot.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
