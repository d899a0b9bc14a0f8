// Read-only view of the controller's live state, handed to whatever renders it

use serde::{Deserialize, Serialize};

use crate::media::{Episode, MediaItem, MediaKind, Track};
use crate::queue::RepeatMode;

/// Where the current playback session sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub active_kind: Option<MediaKind>,
    pub current_track: Option<Track>,
    pub current_episode: Option<Episode>,
    pub phase: PlaybackPhase,
    pub is_playing: bool,
    pub position: f64,
    pub duration: f64,
    pub volume: f32,
    pub muted: bool,
    pub track_queue: Vec<Track>,
    pub episode_queue: Vec<Episode>,
    /// Cursor into whichever queue matches `active_kind`; None when that queue is
    /// empty or the active item isn't in it
    pub current_index: Option<usize>,
    pub repeat: RepeatMode,
    pub shuffle: bool,
    pub last_error: Option<String>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            active_kind: None,
            current_track: None,
            current_episode: None,
            phase: PlaybackPhase::Idle,
            is_playing: false,
            position: 0.0,
            duration: 0.0,
            volume: 1.0,
            muted: false,
            track_queue: Vec::new(),
            episode_queue: Vec::new(),
            current_index: None,
            repeat: RepeatMode::Off,
            shuffle: false,
            last_error: None,
        }
    }
}

impl PlaybackSession {
    pub fn active_item(&self) -> Option<MediaItem> {
        match self.active_kind {
            Some(MediaKind::Track) => self.current_track.clone().map(MediaItem::Track),
            Some(MediaKind::Episode) => self.current_episode.clone().map(MediaItem::Episode),
            None => None,
        }
    }

    /// Playback progress in [0, 1]; 0 while the duration is unknown
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
