// Audio output resource - the one thing that actually makes sound
// The controller is the only owner; everything else talks to the controller

pub mod null;
pub mod scripted;
#[cfg(feature = "audio")]
pub mod local;

pub use null::NullOutput;
pub use scripted::{OutputCall, ScriptHandle, ScriptedOutput};
#[cfg(feature = "audio")]
pub use local::RodioOutput;

use futures::future::BoxFuture;

use crate::error::OutputError;

/// Stamped on every source load. Events carrying an older id belong to a
/// source that has since been replaced and must be ignored.
pub type LoadId = u64;

/// Resolves once the output has actually started (or refused to start) playback
pub type PlayFuture = BoxFuture<'static, Result<(), OutputError>>;

#[derive(Debug, Clone, PartialEq)]
pub enum OutputEventKind {
    /// Total length became known
    LoadedMetadata { duration: f64 },
    /// Playback cursor moved
    TimeUpdate { position: f64 },
    Playing,
    Paused,
    Ended,
    Error(OutputError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputEvent {
    pub load: LoadId,
    pub kind: OutputEventKind,
}

impl OutputEvent {
    pub fn new(load: LoadId, kind: OutputEventKind) -> Self {
        Self { load, kind }
    }
}

/// Platform audio output.
///
/// Implementations report what happens to the loaded source through the
/// event channel they were built with; every event carries the `LoadId`
/// passed to the `load` that produced it.
pub trait AudioOutput: Send {
    /// Point the output at a new source. Aborts whatever was loaded before.
    fn load(&mut self, load: LoadId, source: &str);

    /// Ask the output to start or resume the loaded source
    fn play(&mut self) -> PlayFuture;

    fn pause(&mut self);

    /// Seconds from the start of the source
    fn seek(&mut self, position: f64);

    /// Linear gain in [0, 1]
    fn set_volume(&mut self, volume: f32);

    /// Pause, rewind and drop the current source
    fn unload(&mut self);
}

impl<O: AudioOutput + ?Sized> AudioOutput for Box<O> {
    fn load(&mut self, load: LoadId, source: &str) {
        (**self).load(load, source)
    }

    fn play(&mut self) -> PlayFuture {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn seek(&mut self, position: f64) {
        (**self).seek(position)
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume)
    }

    fn unload(&mut self) {
        (**self).unload()
    }
}
