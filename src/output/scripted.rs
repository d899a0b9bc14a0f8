// Scripted output for driving the controller without a sound card
// Records every call and hands play results back to whoever holds the ScriptHandle

use futures::FutureExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

use super::{AudioOutput, LoadId, OutputEvent, OutputEventKind, PlayFuture};
use crate::error::OutputError;

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Load { load: LoadId, source: String },
    Play,
    Pause,
    Seek(f64),
    Volume(f32),
    Unload,
}

#[derive(Default)]
struct Script {
    calls: Vec<OutputCall>,
    current_load: Option<LoadId>,
    // One slot per play() call, in call order; taken when resolved
    pending: Vec<Option<oneshot::Sender<Result<(), OutputError>>>>,
    auto_resolve: Option<Result<(), OutputError>>,
}

pub struct ScriptedOutput {
    script: Arc<Mutex<Script>>,
}

/// Test-side view of a `ScriptedOutput`
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
    events: mpsc::UnboundedSender<OutputEvent>,
}

impl ScriptedOutput {
    pub fn new(events: mpsc::UnboundedSender<OutputEvent>) -> (Self, ScriptHandle) {
        let script = Arc::new(Mutex::new(Script::default()));
        let handle = ScriptHandle {
            script: script.clone(),
            events,
        };
        (Self { script }, handle)
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioOutput for ScriptedOutput {
    fn load(&mut self, load: LoadId, source: &str) {
        let mut script = self.script();
        script.current_load = Some(load);
        script.calls.push(OutputCall::Load {
            load,
            source: source.to_string(),
        });
    }

    fn play(&mut self) -> PlayFuture {
        let mut script = self.script();
        script.calls.push(OutputCall::Play);

        if let Some(result) = script.auto_resolve.clone() {
            script.pending.push(None);
            return async move { result }.boxed();
        }

        let (tx, rx) = oneshot::channel();
        script.pending.push(Some(tx));
        async move {
            rx.await
                .unwrap_or_else(|_| Err(OutputError::Rejected("play request abandoned".to_string())))
        }
        .boxed()
    }

    fn pause(&mut self) {
        self.script().calls.push(OutputCall::Pause);
    }

    fn seek(&mut self, position: f64) {
        self.script().calls.push(OutputCall::Seek(position));
    }

    fn set_volume(&mut self, volume: f32) {
        self.script().calls.push(OutputCall::Volume(volume));
    }

    fn unload(&mut self) {
        let mut script = self.script();
        script.current_load = None;
        script.calls.push(OutputCall::Unload);
    }
}

impl ScriptHandle {
    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<OutputCall> {
        self.script().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.script().calls.clear();
    }

    /// Resolve every future play() call immediately with `result`
    pub fn set_auto_resolve(&self, result: Option<Result<(), OutputError>>) {
        self.script().auto_resolve = result;
    }

    /// How many play() calls have been made so far
    pub fn play_requests(&self) -> usize {
        self.script().pending.len()
    }

    /// Resolve the `nth` play() call (0-based). Returns false if it was already resolved.
    pub fn resolve_play(&self, nth: usize, result: Result<(), OutputError>) -> bool {
        let sender = self.script().pending.get_mut(nth).and_then(Option::take);
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    pub fn current_load(&self) -> Option<LoadId> {
        self.script().current_load
    }

    /// Emit an event tagged with the currently loaded source
    pub fn emit(&self, kind: OutputEventKind) -> Option<OutputEvent> {
        let load = self.current_load()?;
        let event = OutputEvent::new(load, kind);
        let _ = self.events.send(event.clone());
        Some(event)
    }

    /// Emit an event for an arbitrary (possibly stale) load
    pub fn emit_for(&self, load: LoadId, kind: OutputEventKind) -> OutputEvent {
        let event = OutputEvent::new(load, kind);
        let _ = self.events.send(event.clone());
        event
    }
}
