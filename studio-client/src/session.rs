//! Generation workflow for one studio session.
//!
//! `Idle -> Submitting -> (Succeeded | Failed) -> Idle`. At most one
//! generation is in flight; a second submit while `Submitting` is rejected
//! with [`ClientError::Busy`]. Every state change is written to the injected
//! [`SessionStateStore`].

use crate::api::VideoApi;
use crate::error::ClientError;
use crate::models::{ClientSessionState, GenerationRequest, SubmissionPhase, VideoRecord};
use crate::progress::{ProgressConfig, COMPLETE};
use crate::store::{self, SessionStateStore, KEY_ERROR, KEY_PROGRESS};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::{CancellationToken, DropGuard};

struct Inner {
    state: ClientSessionState,
    phase: SubmissionPhase,
}

struct Shared {
    inner: Mutex<Inner>,
    store: Arc<dyn SessionStateStore>,
    progress_tx: watch::Sender<u8>,
}

impl Shared {
    async fn persist(&self, state: &ClientSessionState) -> Result<(), ClientError> {
        store::save_state(self.store.as_ref(), state).await?;
        self.progress_tx.send_replace(state.progress);
        Ok(())
    }

    /// Put a submission that ended without a terminal response back to idle.
    async fn reset_abandoned(&self) {
        let mut inner = self.inner.lock().await;
        if inner.phase != SubmissionPhase::Submitting {
            return;
        }

        tracing::warn!("Generation abandoned before a response arrived");
        inner.phase = SubmissionPhase::Idle;
        inner.state.loading = false;
        inner.state.progress = 0;

        if let Err(e) = self.persist(&inner.state).await {
            tracing::warn!(error = %e, "Failed to persist abandoned generation state");
        }
    }

    async fn tick_progress(&self, config: ProgressConfig, token: CancellationToken) {
        let mut interval = tokio::time::interval(config.tick);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    let mut inner = self.inner.lock().await;
                    if token.is_cancelled() || inner.phase != SubmissionPhase::Submitting {
                        break;
                    }

                    let step = config.random_step(&mut rand::thread_rng());
                    let next = config.advance(inner.state.progress, step);
                    if next == inner.state.progress {
                        continue;
                    }

                    inner.state.progress = next;
                    if let Err(e) = self.store.set(KEY_PROGRESS, &next.to_string()).await {
                        tracing::warn!(error = %e, "Failed to persist progress");
                    }
                    self.progress_tx.send_replace(next);
                }
            }
        }
    }
}

/// Resets the session if a submission future is dropped mid-flight. Dropping
/// it also cancels the progress ticker.
struct AbandonGuard {
    shared: Option<Arc<Shared>>,
    _ticker: DropGuard,
}

impl AbandonGuard {
    fn disarm(mut self) {
        self.shared = None;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { shared.reset_abandoned().await });
            }
            // Without a runtime the stale `loading` flag is repaired by the
            // next `restore`.
            Err(_) => tracing::warn!("No runtime to reset abandoned generation"),
        }
    }
}

pub struct GenerationSession {
    api: Arc<dyn VideoApi>,
    progress: ProgressConfig,
    shared: Arc<Shared>,
}

impl GenerationSession {
    /// Load persisted state and start a session on top of it.
    ///
    /// A persisted `loading=true` belongs to a submission that never
    /// finished; it is cleared and progress goes back to 0.
    pub async fn restore(
        api: Arc<dyn VideoApi>,
        store: Arc<dyn SessionStateStore>,
        progress: ProgressConfig,
    ) -> Result<Self, ClientError> {
        let mut state = store::load_state(store.as_ref()).await?;

        if state.loading {
            tracing::info!(
                progress = state.progress,
                "Clearing generation left unfinished by a previous run"
            );
            state.loading = false;
            state.progress = 0;
            store::save_state(store.as_ref(), &state).await?;
        }

        let (progress_tx, _) = watch::channel(state.progress);

        Ok(Self {
            api,
            progress,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state,
                    phase: SubmissionPhase::Idle,
                }),
                store,
                progress_tx,
            }),
        })
    }

    pub async fn state(&self) -> ClientSessionState {
        self.shared.inner.lock().await.state.clone()
    }

    pub async fn phase(&self) -> SubmissionPhase {
        self.shared.inner.lock().await.phase
    }

    /// Progress values as they change. Only the latest value is retained.
    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.shared.progress_tx.subscribe()
    }

    /// Generate a video for `text` and return its URL.
    ///
    /// On success the URL is stored and progress jumps to 100. On failure the
    /// error slot holds the message, progress returns to 0, and the previous
    /// video URL is kept.
    pub async fn submit(&self, text: &str, enable_audio: bool) -> Result<String, ClientError> {
        let request = match GenerationRequest::new(text, enable_audio) {
            Ok(request) => request,
            Err(e) => {
                self.record_error(&e).await;
                return Err(e);
            }
        };

        {
            let mut inner = self.shared.inner.lock().await;
            if inner.phase == SubmissionPhase::Submitting {
                return Err(ClientError::Busy);
            }

            let mut next = inner.state.clone();
            next.prompt_text = request.text.clone();
            next.enable_audio = request.enable_audio;
            next.loading = true;
            next.error = None;
            next.progress = 0;

            self.shared.persist(&next).await?;
            inner.state = next;
            inner.phase = SubmissionPhase::Submitting;
        }

        tracing::info!(
            prompt_len = request.text.chars().count(),
            enable_audio = request.enable_audio,
            "Submitting generation"
        );

        let token = CancellationToken::new();
        let guard = AbandonGuard {
            shared: Some(self.shared.clone()),
            _ticker: token.clone().drop_guard(),
        };

        let ticker = {
            let shared = self.shared.clone();
            let config = self.progress.clone();
            let token = token.clone();
            tokio::spawn(async move { shared.tick_progress(config, token).await })
        };

        let result = self.api.request_generation(&request).await;

        token.cancel();
        if let Err(e) = ticker.await {
            tracing::warn!(error = %e, "Progress ticker ended abnormally");
        }

        // The guard stays armed until the phase is back to Idle; a drop while
        // waiting for the lock must still reset the session.
        let mut inner = self.shared.inner.lock().await;
        inner.phase = SubmissionPhase::Idle;
        guard.disarm();

        inner.state.loading = false;
        match &result {
            Ok(url) => {
                inner.state.video_url = Some(url.clone());
                inner.state.error = None;
                inner.state.progress = COMPLETE;
            }
            Err(e) => {
                inner.state.error = Some(e.user_message());
                inner.state.progress = 0;
            }
        }

        if let Err(e) = self.shared.persist(&inner.state).await {
            tracing::warn!(error = %e, "Failed to persist generation result");
            inner.state.error = Some(e.user_message());
        }

        result
    }

    /// Fetch the current list of videos.
    pub async fn list_videos(&self) -> Result<Vec<VideoRecord>, ClientError> {
        match self.api.list_videos().await {
            Ok(videos) => Ok(videos),
            Err(e) => {
                self.record_error(&e).await;
                Err(e)
            }
        }
    }

    pub async fn get_video(&self, id: &str) -> Result<VideoRecord, ClientError> {
        match self.api.get_video(id).await {
            Ok(video) => Ok(video),
            Err(e) => {
                self.record_error(&e).await;
                Err(e)
            }
        }
    }

    /// Clear the error banner.
    pub async fn dismiss_error(&self) -> Result<(), ClientError> {
        let mut inner = self.shared.inner.lock().await;
        inner.state.error = None;
        self.shared.store.clear(KEY_ERROR).await?;
        Ok(())
    }

    /// Forget everything persisted for this session. Refused while a
    /// generation is in flight.
    pub async fn reset(&self) -> Result<(), ClientError> {
        let mut inner = self.shared.inner.lock().await;
        if inner.phase == SubmissionPhase::Submitting {
            return Err(ClientError::Busy);
        }

        store::clear_state(self.shared.store.as_ref()).await?;
        inner.state = ClientSessionState::default();
        self.shared.progress_tx.send_replace(0);
        Ok(())
    }

    /// Write `err` into the error slot. Store failures are only logged.
    async fn record_error(&self, err: &ClientError) {
        let mut inner = self.shared.inner.lock().await;
        let message = err.user_message();
        inner.state.error = Some(message.clone());

        if let Err(e) = self.shared.store.set(KEY_ERROR, &message).await {
            tracing::warn!(error = %e, "Failed to persist error message");
        }
    }
}
