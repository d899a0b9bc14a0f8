// Local-device output on top of rodio
// rodio's OutputStream can't leave the thread that opened it, so a dedicated
// audio thread owns the stream + sink and we talk to it over a channel

use futures::FutureExt;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::{AudioOutput, LoadId, OutputEvent, OutputEventKind, PlayFuture};
use crate::error::OutputError;

// How often the audio thread reports position while playing
const TICK: Duration = Duration::from_millis(250);

enum AudioCommand {
    Load { load: LoadId, source: String },
    Play(oneshot::Sender<Result<(), OutputError>>),
    Pause,
    Seek(f64),
    Volume(f32),
    Unload,
    Shutdown,
}

pub struct RodioOutput {
    commands: std_mpsc::Sender<AudioCommand>,
    worker: Option<JoinHandle<()>>,
}

impl RodioOutput {
    /// Open the default output device. Fails with `Unavailable` when there is none.
    pub fn new(volume: f32, events: mpsc::UnboundedSender<OutputEvent>) -> Result<Self, OutputError> {
        let (commands, command_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let worker = thread::Builder::new()
            .name("dualdeck-audio".to_string())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("Could not open audio output: {}", e);
                        let _ = ready_tx.send(Err(OutputError::Unavailable));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let worker = AudioWorker {
                    _stream: stream,
                    handle,
                    sink: None,
                    load: None,
                    load_error: None,
                    volume,
                    playing: false,
                    events,
                };
                worker.run(command_rx);
            })
            .map_err(|_| OutputError::Unavailable)?;

        ready_rx.recv().map_err(|_| OutputError::Unavailable)??;
        info!("Audio output ready");

        Ok(Self {
            commands,
            worker: Some(worker),
        })
    }

    fn send(&self, command: AudioCommand) {
        if self.commands.send(command).is_err() {
            warn!("Audio thread is gone, dropping command");
        }
    }
}

impl AudioOutput for RodioOutput {
    fn load(&mut self, load: LoadId, source: &str) {
        self.send(AudioCommand::Load {
            load,
            source: source.to_string(),
        });
    }

    fn play(&mut self) -> PlayFuture {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(AudioCommand::Play(tx)).is_err() {
            return async { Err(OutputError::Unavailable) }.boxed();
        }
        async move { rx.await.unwrap_or(Err(OutputError::Unavailable)) }.boxed()
    }

    fn pause(&mut self) {
        self.send(AudioCommand::Pause);
    }

    fn seek(&mut self, position: f64) {
        self.send(AudioCommand::Seek(position));
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(AudioCommand::Volume(volume));
    }

    fn unload(&mut self) {
        self.send(AudioCommand::Unload);
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.commands.send(AudioCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct AudioWorker {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    load: Option<LoadId>,
    // Why the last load failed; handed back to the next play request
    load_error: Option<OutputError>,
    volume: f32,
    playing: bool,
    events: mpsc::UnboundedSender<OutputEvent>,
}

impl AudioWorker {
    fn run(mut self, commands: std_mpsc::Receiver<AudioCommand>) {
        loop {
            match commands.recv_timeout(TICK) {
                Ok(AudioCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.tick();
        }

        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        debug!("Audio thread exiting");
    }

    fn emit(&self, kind: OutputEventKind) {
        if let Some(load) = self.load {
            let _ = self.events.send(OutputEvent::new(load, kind));
        }
    }

    fn handle(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::Load { load, source } => self.load_source(load, &source),
            AudioCommand::Play(reply) => {
                let result = self.start();
                let _ = reply.send(result);
            }
            AudioCommand::Pause => {
                if let Some(sink) = self.sink.as_ref() {
                    sink.pause();
                    self.playing = false;
                    self.emit(OutputEventKind::Paused);
                }
            }
            AudioCommand::Seek(position) => {
                if let Some(sink) = self.sink.as_ref() {
                    match seek_target(position) {
                        Some(target) => {
                            if let Err(e) = sink.try_seek(target) {
                                warn!("Seek to {:.1}s failed: {}", position, e);
                            }
                        }
                        None => warn!("Ignoring seek to unrepresentable position {}", position),
                    }
                    let position = sink.get_pos().as_secs_f64();
                    self.emit(OutputEventKind::TimeUpdate { position });
                }
            }
            AudioCommand::Volume(volume) => {
                self.volume = volume;
                if let Some(sink) = self.sink.as_ref() {
                    sink.set_volume(volume);
                }
            }
            AudioCommand::Unload => {
                if let Some(sink) = self.sink.take() {
                    sink.stop();
                }
                self.load = None;
                self.load_error = None;
                self.playing = false;
            }
            AudioCommand::Shutdown => {}
        }
    }

    fn load_source(&mut self, load: LoadId, source: &str) {
        // Replacing the sink aborts the previous source
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.load = Some(load);
        self.load_error = None;
        self.playing = false;

        match self.open(source) {
            Ok((sink, duration)) => {
                self.sink = Some(sink);
                if let Some(duration) = duration {
                    self.emit(OutputEventKind::LoadedMetadata {
                        duration: duration.as_secs_f64(),
                    });
                }
                debug!("Loaded source #{}: {}", load, source);
            }
            Err(e) => {
                warn!("Failed to load '{}': {}", source, e);
                self.emit(OutputEventKind::Error(e.clone()));
                self.load_error = Some(e);
            }
        }
    }

    fn open(&self, source: &str) -> Result<(Sink, Option<Duration>), OutputError> {
        let path = resolve_local_path(source)?;
        let file = File::open(&path)
            .map_err(|e| OutputError::Source(format!("failed to open {}: {}", path.display(), e)))?;
        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| OutputError::Source(format!("unsupported or corrupted audio: {}", e)))?;
        let duration = decoder.total_duration();

        let sink = Sink::try_new(&self.handle).map_err(|_| OutputError::Unavailable)?;
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(decoder);
        Ok((sink, duration))
    }

    fn start(&mut self) -> Result<(), OutputError> {
        if let Some(e) = self.load_error.clone() {
            return Err(e);
        }
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| OutputError::Rejected("no source loaded".to_string()))?;
        sink.play();
        self.playing = true;
        self.emit(OutputEventKind::Playing);
        Ok(())
    }

    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        if sink.empty() {
            self.playing = false;
            self.emit(OutputEventKind::Ended);
        } else {
            let position = sink.get_pos().as_secs_f64();
            self.emit(OutputEventKind::TimeUpdate { position });
        }
    }
}

// Negative targets clamp to the start; NaN, infinite and overflowing ones are refused
fn seek_target(position: f64) -> Option<Duration> {
    if position.is_nan() {
        return None;
    }
    Duration::try_from_secs_f64(position.max(0.0)).ok()
}

/// Local files only: plain paths or file:// URLs. Remote URLs need a streaming output.
fn resolve_local_path(source: &str) -> Result<PathBuf, OutputError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        return Err(OutputError::Source(format!(
            "remote source not supported by the local output: {}",
            source
        )));
    }
    let path = source.strip_prefix("file://").unwrap_or(source);
    if path.is_empty() {
        return Err(OutputError::Source("empty source".to_string()));
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_plain_paths_and_file_urls() {
        assert_eq!(resolve_local_path("/music/a.mp3").unwrap(), PathBuf::from("/music/a.mp3"));
        assert_eq!(resolve_local_path("file:///music/a.mp3").unwrap(), PathBuf::from("/music/a.mp3"));
    }

    #[test]
    fn seek_target_refuses_unrepresentable_positions() {
        assert_eq!(seek_target(1.5), Some(Duration::from_millis(1500)));
        assert_eq!(seek_target(-3.0), Some(Duration::ZERO));
        assert_eq!(seek_target(f64::INFINITY), None);
        assert_eq!(seek_target(1e300), None);
        assert_eq!(seek_target(f64::NAN), None);
    }

    #[test]
    fn rejects_remote_and_empty_sources() {
        assert!(matches!(resolve_local_path("https://cdn/a.mp3"), Err(OutputError::Source(_))));
        assert!(matches!(resolve_local_path("file://"), Err(OutputError::Source(_))));
    }
}
