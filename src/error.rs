// Error types for the player core
// Library code returns these; the binary wraps them in anyhow at the edge

use thiserror::Error;

/// Failures reported by the audio output resource.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutputError {
    /// The output refused to start playback (autoplay-style policy, no gesture, busy device)
    #[error("playback rejected: {0}")]
    Rejected(String),

    /// Network, decode, or unsupported-format failure on the current source
    #[error("source error: {0}")]
    Source(String),

    /// No output device could be opened
    #[error("audio output unavailable")]
    Unavailable,
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("session store error: {0}")]
    Persist(String),

    #[error("player service has shut down")]
    ServiceClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
