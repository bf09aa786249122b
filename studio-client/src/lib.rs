//! Client side of the video studio: talks to the relay service, tracks the
//! generation workflow, and persists session state between runs.

pub mod api;
pub mod error;
pub mod models;
pub mod progress;
pub mod render;
pub mod session;
pub mod store;

pub use api::{RelayClient, VideoApi};
pub use error::{ClientError, StoreError};
pub use models::{ClientSessionState, GenerationRequest, SubmissionPhase, VideoRecord};
pub use progress::ProgressConfig;
pub use session::GenerationSession;
pub use store::{FileStore, MemoryStore, SessionStateStore};
