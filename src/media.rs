// Playable items - tracks and podcast episodes behind one tagged union
// Field names follow the REST payloads so descriptors deserialize as-is

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Track,
    Episode,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Track => write!(f, "track"),
            MediaKind::Episode => write!(f, "episode"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    pub audio_file: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Seconds; unknown until the output reports metadata
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub podcast_id: String,
    #[serde(default)]
    pub episode_number: u32,
    pub audio_file: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, audio_file: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: String::new(),
            audio_file: audio_file.into(),
            cover_image: None,
            duration: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn display_artist(&self) -> &str {
        if self.artist.is_empty() {
            "Unknown Artist"
        } else {
            &self.artist
        }
    }
}

impl Episode {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        podcast_id: impl Into<String>,
        episode_number: u32,
        audio_file: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            podcast_id: podcast_id.into(),
            episode_number,
            audio_file: audio_file.into(),
            cover_image: None,
            duration: None,
        }
    }
}

/// Identity of a playable item. Two items are "the same" when their keys match,
/// regardless of metadata drift between REST fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaKey {
    pub kind: MediaKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MediaItem {
    Track(Track),
    Episode(Episode),
}

impl MediaItem {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaItem::Track(_) => MediaKind::Track,
            MediaItem::Episode(_) => MediaKind::Episode,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            MediaItem::Track(t) => &t.id,
            MediaItem::Episode(e) => &e.id,
        }
    }

    pub fn key(&self) -> MediaKey {
        MediaKey {
            kind: self.kind(),
            id: self.id().to_string(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            MediaItem::Track(t) => &t.title,
            MediaItem::Episode(e) => &e.title,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            MediaItem::Track(t) => &t.audio_file,
            MediaItem::Episode(e) => &e.audio_file,
        }
    }

    pub fn duration_hint(&self) -> Option<f64> {
        match self {
            MediaItem::Track(t) => t.duration,
            MediaItem::Episode(e) => e.duration,
        }
    }
}

impl From<Track> for MediaItem {
    fn from(track: Track) -> Self {
        MediaItem::Track(track)
    }
}

impl From<Episode> for MediaItem {
    fn from(episode: Episode) -> Self {
        MediaItem::Episode(episode)
    }
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaItem::Track(t) => write!(f, "{} - {}", t.display_artist(), t.title),
            MediaItem::Episode(e) => write!(f, "#{} {}", e.episode_number, e.title),
        }
    }
}

/// Format seconds as m:ss or h:mm:ss
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_distinguish_kinds_with_same_id() {
        let track: MediaItem = Track::new("42", "Song", "a.mp3").into();
        let episode: MediaItem = Episode::new("42", "Ep", "p1", 1, "e.mp3").into();
        assert_ne!(track.key(), episode.key());
        assert_eq!(track.key(), MediaItem::from(Track::new("42", "Renamed", "b.mp3")).key());
    }

    #[test]
    fn track_deserializes_from_rest_payload() {
        let json = r#"{"id":"t1","title":"Intro","artist":"Band","audio_file":"a.mp3","cover_image":null}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.audio_file, "a.mp3");
        assert_eq!(track.duration, None);
    }

    #[test]
    fn format_time_handles_hours_and_garbage() {
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(3725.0), "1:02:05");
        assert_eq!(format_time(f64::NAN), "0:00");
    }
}
