// Session persistence - best-effort restore across restarts
// One JSON blob under one key; anything that doesn't parse cleanly is treated as "no prior session"

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{PlayerError, Result};
use crate::media::{Episode, MediaKind, Track};
use crate::queue::RepeatMode;

/// Bump whenever the blob layout changes; older blobs are discarded, not migrated
pub const SESSION_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub version: u32,
    pub current_track: Option<Track>,
    pub current_episode: Option<Episode>,
    pub current_media_type: Option<MediaKind>,
    pub volume: f32,
    pub track_queue: Vec<Track>,
    pub episode_queue: Vec<Episode>,
    pub current_index: usize,
    #[serde(default)]
    pub repeat: RepeatMode,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Why a persisted blob was thrown away instead of restored
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionRejection {
    #[error("malformed blob: {0}")]
    Malformed(String),

    #[error("schema version {0} (expected {})", SESSION_SCHEMA_VERSION)]
    Version(u32),

    #[error("both a track and an episode are active")]
    BothItemsActive,

    #[error("media type does not match the active item")]
    KindMismatch,

    #[error("volume is not a finite number")]
    BadVolume,

    #[error("queue index {index} out of range for {len} items")]
    IndexOutOfRange { index: usize, len: usize },
}

impl PersistedSession {
    /// Strict parse: shape, version and cross-field consistency all have to hold
    pub fn parse(raw: &str) -> std::result::Result<Self, SessionRejection> {
        let session: PersistedSession =
            serde_json::from_str(raw).map_err(|e| SessionRejection::Malformed(e.to_string()))?;
        session.validate()?;
        Ok(session)
    }

    fn validate(&self) -> std::result::Result<(), SessionRejection> {
        if self.version != SESSION_SCHEMA_VERSION {
            return Err(SessionRejection::Version(self.version));
        }
        if self.current_track.is_some() && self.current_episode.is_some() {
            return Err(SessionRejection::BothItemsActive);
        }
        let kind_ok = match self.current_media_type {
            Some(MediaKind::Track) => self.current_track.is_some(),
            Some(MediaKind::Episode) => self.current_episode.is_some(),
            None => self.current_track.is_none() && self.current_episode.is_none(),
        };
        if !kind_ok {
            return Err(SessionRejection::KindMismatch);
        }
        if !self.volume.is_finite() {
            return Err(SessionRejection::BadVolume);
        }

        let len = match self.current_media_type {
            Some(MediaKind::Episode) => self.episode_queue.len(),
            _ => self.track_queue.len(),
        };
        if len > 0 && self.current_index >= len {
            return Err(SessionRejection::IndexOutOfRange {
                index: self.current_index,
                len,
            });
        }
        Ok(())
    }

    /// Best-effort restore: any rejection is logged and swallowed
    pub fn restore(raw: &str) -> Option<Self> {
        match Self::parse(raw) {
            Ok(session) => Some(session),
            Err(reason) => {
                warn!("Discarding persisted session: {}", reason);
                None
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Somewhere to keep the session blob
pub trait SessionStore: Send {
    fn load(&self) -> Result<Option<String>>;
    fn save(&mut self, blob: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// Blob stored as a single JSON file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/dualdeck/session.json`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::data_dir()
            .ok_or_else(|| PlayerError::Persist("could not find data directory".to_string()))?
            .join("dualdeck");
        Ok(dir.join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn save(&mut self, blob: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, blob)?;
        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-process store; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(blob.into()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.contents())
    }

    fn save(&mut self, blob: &str) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(blob.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
