// dualdeck - unified playback controller for tracks and podcast episodes
// One audio output, two independent queues, one controller that owns both

pub mod config;     // settings and preferences
pub mod controller; // the playback state machine
pub mod error;      // library error types
pub mod library;    // local files -> descriptors
pub mod media;      // tracks, episodes, the tagged union
pub mod output;     // audio output trait + implementations
pub mod persist;    // session save/restore
pub mod queue;      // ordered queues with a cursor
pub mod service;    // controller on its own task
pub mod session;    // read-only snapshot for UIs

// Export the stuff other modules actually use
pub use config::Config;
pub use controller::{ControllerOptions, PendingPlay, PlayOutcome, PlaybackController};
pub use error::{OutputError, PlayerError};
pub use media::{Episode, MediaItem, MediaKind, Track};
pub use output::{AudioOutput, LoadId, OutputEvent, OutputEventKind};
pub use persist::{FileStore, MemoryStore, PersistedSession, SessionStore};
pub use queue::{PlayQueue, RepeatMode};
pub use service::{Command, PlayerHandle, PlayerService};
pub use session::{PlaybackPhase, PlaybackSession};
