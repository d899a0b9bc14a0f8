// Configuration management for dualdeck
// Handles loading/saving settings, with sensible defaults when config is missing

use anyhow::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::controller::ControllerOptions;
use crate::queue::RepeatMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub player: PlayerConfig,
    pub persistence: PersistenceConfig,
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub initial_volume: f32,
    /// Keep going through the queue when an item finishes
    pub advance_on_end: bool,
    pub repeat: RepeatMode,
    pub previous_restart_threshold_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub enabled: bool,
    /// Defaults to <data dir>/dualdeck/session.json
    pub session_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub music_directories: Vec<PathBuf>,
    pub podcast_directories: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player: PlayerConfig {
                initial_volume: 0.7,
                advance_on_end: false,
                repeat: RepeatMode::Off,
                previous_restart_threshold_secs: 3.0,
            },
            persistence: PersistenceConfig {
                enabled: true,
                session_path: None,
            },
            library: LibraryConfig {
                music_directories: vec![
                    dirs::audio_dir().unwrap_or_else(|| PathBuf::from("~/Music")),
                ],
                podcast_directories: Vec::new(),
            },
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults there on first run
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("dualdeck");

        Ok(config_dir.join("config.toml"))
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            initial_volume: self.player.initial_volume,
            advance_on_end: self.player.advance_on_end,
            restart_threshold: self.player.previous_restart_threshold_secs,
        }
    }
}
