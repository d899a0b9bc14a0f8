// Headless output - accepts everything, plays nothing
// Used when no audio device is available or the `audio` feature is off

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::debug;

use super::{AudioOutput, LoadId, OutputEvent, OutputEventKind, PlayFuture};
use crate::error::OutputError;

pub struct NullOutput {
    events: mpsc::UnboundedSender<OutputEvent>,
    load: Option<LoadId>,
}

impl NullOutput {
    pub fn new(events: mpsc::UnboundedSender<OutputEvent>) -> Self {
        Self {
            events,
            load: None,
        }
    }

    fn emit(&self, kind: OutputEventKind) {
        if let Some(load) = self.load {
            let _ = self.events.send(OutputEvent::new(load, kind));
        }
    }
}

impl AudioOutput for NullOutput {
    fn load(&mut self, load: LoadId, source: &str) {
        debug!("null output: load #{} {}", load, source);
        self.load = Some(load);
    }

    fn play(&mut self) -> PlayFuture {
        if self.load.is_none() {
            return async { Err(OutputError::Rejected("nothing loaded".to_string())) }.boxed();
        }
        self.emit(OutputEventKind::Playing);
        async { Ok(()) }.boxed()
    }

    fn pause(&mut self) {
        self.emit(OutputEventKind::Paused);
    }

    fn seek(&mut self, position: f64) {
        self.emit(OutputEventKind::TimeUpdate { position });
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn unload(&mut self) {
        self.load = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn play_without_source_is_rejected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut output = NullOutput::new(tx);
        assert!(output.play().await.is_err());

        output.load(3, "a.mp3");
        assert!(output.play().await.is_ok());
        let event = rx.recv().await.unwrap();
        assert_eq!(event, OutputEvent::new(3, OutputEventKind::Playing));
    }
}
