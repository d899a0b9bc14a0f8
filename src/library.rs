// Local library - turns audio files on disk into Track/Episode descriptors
// The streaming front-end gets these from its REST layer; the CLI builds them from folders instead

use anyhow::Result;
use id3::TagLike;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::media::{Episode, Track};

const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "oga", "mp4", "m4a", "aac", "wav"];

// Anything bigger than this is almost certainly not a single track
const MAX_FILE_SIZE: u64 = 1_000_000_000;

#[derive(Debug, Clone, Default)]
struct Tags {
    title: Option<String>,
    artist: Option<String>,
    track_number: Option<u32>,
    duration: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct LibraryScanner;

impl LibraryScanner {
    pub fn new() -> Self {
        Self
    }

    /// Every supported file under `root` (or `root` itself if it is a file), sorted by path
    pub fn audio_files<P: AsRef<Path>>(&self, root: P) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_candidate(path))
            .collect();
        files.sort();
        files
    }

    pub fn scan_tracks<P: AsRef<Path>>(&self, root: P) -> Result<Vec<Track>> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(anyhow::anyhow!("Path does not exist: {}", root.display()));
        }

        let tracks: Vec<Track> = self
            .audio_files(root)
            .into_iter()
            .map(|path| self.track_from_file(&path))
            .collect();
        debug!("Found {} tracks under {}", tracks.len(), root.display());
        Ok(tracks)
    }

    /// Episodes of one podcast folder. Numbered from tags when present, otherwise by file order.
    pub fn scan_episodes<P: AsRef<Path>>(&self, root: P) -> Result<Vec<Episode>> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(anyhow::anyhow!("Path does not exist: {}", root.display()));
        }
        let podcast_id = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("podcast")
            .to_string();

        let mut episodes: Vec<Episode> = self
            .audio_files(root)
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let tags = read_tags(&path);
                let number = tags.track_number.unwrap_or(i as u32 + 1);
                let mut episode = Episode::new(
                    path.display().to_string(),
                    tags.title.clone().unwrap_or_else(|| file_stem(&path)),
                    podcast_id.clone(),
                    number,
                    path.display().to_string(),
                );
                episode.duration = tags.duration;
                episode
            })
            .collect();
        episodes.sort_by_key(|e| e.episode_number);
        Ok(episodes)
    }

    pub fn track_from_file(&self, path: &Path) -> Track {
        let tags = read_tags(path);
        let mut track = Track::new(
            path.display().to_string(),
            tags.title.unwrap_or_else(|| file_stem(path)),
            path.display().to_string(),
        );
        if let Some(artist) = tags.artist {
            track = track.with_artist(artist);
        }
        track.duration = tags.duration;
        track
    }
}

fn is_candidate(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'));
    if hidden {
        return false;
    }

    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !supported {
        return false;
    }

    match fs::metadata(path) {
        Ok(meta) => meta.len() > 0 && meta.len() <= MAX_FILE_SIZE,
        Err(_) => false,
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Unknown")
        .to_string()
}

// Only MP3s carry ID3; everything else falls back to the file name
fn read_tags(path: &Path) -> Tags {
    let is_mp3 = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mp3"))
        .unwrap_or(false);
    if !is_mp3 {
        return Tags::default();
    }

    match id3::Tag::read_from_path(path) {
        Ok(tag) => Tags {
            title: tag.title().map(|s| s.to_string()),
            artist: tag.artist().map(|s| s.to_string()),
            track_number: tag.track(),
            duration: tag.duration().map(|ms| ms as f64 / 1000.0),
        },
        Err(e) => {
            warn!("Could not read tags from {}: {}", path.display(), e);
            Tags::default()
        }
    }
}
