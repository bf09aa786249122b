//! Flat key/value persistence for session state.
//!
//! Each key is an independent string entry; there is no transactional
//! grouping across keys and the last writer wins.

use crate::error::StoreError;
use crate::models::ClientSessionState;
use async_trait::async_trait;
use dashmap::DashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const KEY_PROMPT_TEXT: &str = "studio.prompt_text";
pub const KEY_ENABLE_AUDIO: &str = "studio.enable_audio";
pub const KEY_VIDEO_URL: &str = "studio.video_url";
pub const KEY_LOADING: &str = "studio.loading";
pub const KEY_ERROR: &str = "studio.error";
pub const KEY_PROGRESS: &str = "studio.progress";

pub const ALL_KEYS: [&str; 6] = [
    KEY_PROMPT_TEXT,
    KEY_ENABLE_AUDIO,
    KEY_VIDEO_URL,
    KEY_LOADING,
    KEY_ERROR,
    KEY_PROGRESS,
];

#[async_trait]
pub trait SessionStateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Clearing an absent key is not an error.
    async fn clear(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One file per key under a profile directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the store directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl SessionStateStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let root = self.root.clone();
        let value = value.to_owned();

        // Each write gets its own temp file, renamed over the key when complete.
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = NamedTempFile::new_in(&root)?;
            tmp.write_all(value.as_bytes())?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read the whole session state, falling back to defaults for missing or
/// unparseable entries.
pub async fn load_state(store: &dyn SessionStateStore) -> Result<ClientSessionState, StoreError> {
    let defaults = ClientSessionState::default();

    let prompt_text = store.get(KEY_PROMPT_TEXT).await?.unwrap_or_default();
    let enable_audio = parse_bool(store.get(KEY_ENABLE_AUDIO).await?, defaults.enable_audio);
    let video_url = store
        .get(KEY_VIDEO_URL)
        .await?
        .filter(|url| !url.trim().is_empty());
    let loading = parse_bool(store.get(KEY_LOADING).await?, defaults.loading);
    let error = store
        .get(KEY_ERROR)
        .await?
        .filter(|message| !message.trim().is_empty());
    let progress = store
        .get(KEY_PROGRESS)
        .await?
        .and_then(|value| value.trim().parse::<u8>().ok())
        .map(|value| value.min(100))
        .unwrap_or(defaults.progress);

    Ok(ClientSessionState {
        prompt_text,
        enable_audio,
        video_url,
        loading,
        error,
        progress,
    })
}

/// Write every entry of `state`; absent optional values clear their key.
pub async fn save_state(
    store: &dyn SessionStateStore,
    state: &ClientSessionState,
) -> Result<(), StoreError> {
    store.set(KEY_PROMPT_TEXT, &state.prompt_text).await?;
    store
        .set(KEY_ENABLE_AUDIO, bool_str(state.enable_audio))
        .await?;
    set_or_clear(store, KEY_VIDEO_URL, state.video_url.as_deref()).await?;
    store.set(KEY_LOADING, bool_str(state.loading)).await?;
    set_or_clear(store, KEY_ERROR, state.error.as_deref()).await?;
    store
        .set(KEY_PROGRESS, &state.progress.to_string())
        .await?;
    Ok(())
}

/// Remove every session key.
pub async fn clear_state(store: &dyn SessionStateStore) -> Result<(), StoreError> {
    for key in ALL_KEYS {
        store.clear(key).await?;
    }
    Ok(())
}

pub(crate) async fn set_or_clear(
    store: &dyn SessionStateStore,
    key: &str,
    value: Option<&str>,
) -> Result<(), StoreError> {
    match value {
        Some(value) => store.set(key, value).await,
        None => store.clear(key).await,
    }
}

pub(crate) fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some("true") => true,
        Some("false") => false,
        _ => default,
    }
}
