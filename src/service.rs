// Player service - runs the controller on its own task
// Callers get a cloneable handle; every command, output event and play result is
// applied one at a time in the task's select loop

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::controller::{PendingPlay, PlayOutcome, PlaybackController};
use crate::error::{OutputError, PlayerError, Result};
use crate::media::{Episode, MediaKind, Track};
use crate::output::{AudioOutput, OutputEvent};
use crate::queue::RepeatMode;
use crate::session::PlaybackSession;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlayTrack(Track),
    PlayEpisode(Episode),
    PlayTrackQueue { tracks: Vec<Track>, start: usize },
    PlayEpisodeQueue { episodes: Vec<Episode>, start: usize },
    TogglePlayPause,
    Pause,
    Resume,
    Seek(f64),
    SetVolume(f32),
    ToggleMute,
    Stop,
    Next,
    Previous,
    EnqueueTrack(Track),
    EnqueueEpisode(Episode),
    RemoveFromQueue { kind: MediaKind, index: usize },
    ClearQueue(MediaKind),
    SetRepeat(RepeatMode),
    SetShuffle(bool),
    Shutdown,
}

type SettledPlay = BoxFuture<'static, (u64, std::result::Result<(), OutputError>)>;

/// Cheap to clone; every clone talks to the same controller
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<PlaybackSession>,
}

pub struct PlayerService;

impl PlayerService {
    /// Move the controller onto a task. `events` must be the receiving end of the
    /// channel the controller's output reports into.
    pub fn spawn<O>(
        controller: PlaybackController<O>,
        events: mpsc::UnboundedReceiver<OutputEvent>,
    ) -> (PlayerHandle, JoinHandle<()>)
    where
        O: AudioOutput + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

        let task = tokio::spawn(run(controller, command_rx, events, snapshot_tx));

        let handle = PlayerHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (handle, task)
    }
}

async fn run<O: AudioOutput>(
    mut controller: PlaybackController<O>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<OutputEvent>,
    snapshots: watch::Sender<PlaybackSession>,
) {
    let mut in_flight: FuturesUnordered<SettledPlay> = FuturesUnordered::new();
    info!("Player service started");

    loop {
        let request = tokio::select! {
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => break,
                Some(command) => apply(&mut controller, command),
            },
            Some(event) = events.recv() => controller.handle_event(event),
            Some((seq, result)) = in_flight.next(), if !in_flight.is_empty() => {
                if let PlayOutcome::Stale = controller.settle_play(seq, result) {
                    debug!("Play request {} settled after being superseded", seq);
                }
                None
            }
        };

        if let Some(pending) = request {
            in_flight.push(settle(pending));
        }

        let snapshot = controller.snapshot();
        snapshots.send_if_modified(|current| {
            if *current != snapshot {
                *current = snapshot;
                true
            } else {
                false
            }
        });
    }

    // Going away is an unmount, not a stop: keep the persisted session
    controller.pause();
    info!("Player service stopped");
}

fn settle(pending: PendingPlay) -> SettledPlay {
    let PendingPlay { seq, request } = pending;
    async move { (seq, request.await) }.boxed()
}

fn apply<O: AudioOutput>(controller: &mut PlaybackController<O>, command: Command) -> Option<PendingPlay> {
    match command {
        Command::PlayTrack(track) => controller.play_track(track),
        Command::PlayEpisode(episode) => controller.play_episode(episode),
        Command::PlayTrackQueue { tracks, start } => controller.play_track_queue(tracks, start),
        Command::PlayEpisodeQueue { episodes, start } => controller.play_episode_queue(episodes, start),
        Command::TogglePlayPause => controller.toggle_play_pause(),
        Command::Pause => {
            controller.pause();
            None
        }
        Command::Resume => controller.resume(),
        Command::Seek(seconds) => {
            controller.seek(seconds);
            None
        }
        Command::SetVolume(volume) => {
            controller.set_volume(volume);
            None
        }
        Command::ToggleMute => {
            controller.toggle_mute();
            None
        }
        Command::Stop => {
            controller.stop();
            None
        }
        Command::Next => controller.next(),
        Command::Previous => controller.previous(),
        Command::EnqueueTrack(track) => {
            controller.enqueue_track(track);
            None
        }
        Command::EnqueueEpisode(episode) => {
            controller.enqueue_episode(episode);
            None
        }
        Command::RemoveFromQueue { kind, index } => {
            controller.remove_from_queue(kind, index);
            None
        }
        Command::ClearQueue(kind) => {
            controller.clear_queue(kind);
            None
        }
        Command::SetRepeat(repeat) => {
            controller.set_repeat(repeat);
            None
        }
        Command::SetShuffle(enabled) => {
            controller.set_shuffle(enabled);
            None
        }
        // Handled by the loop
        Command::Shutdown => None,
    }
}

impl PlayerHandle {
    pub fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| PlayerError::ServiceClosed)
    }

    pub fn play_track(&self, track: Track) -> Result<()> {
        self.send(Command::PlayTrack(track))
    }

    pub fn play_episode(&self, episode: Episode) -> Result<()> {
        self.send(Command::PlayEpisode(episode))
    }

    pub fn play_track_queue(&self, tracks: Vec<Track>, start: usize) -> Result<()> {
        self.send(Command::PlayTrackQueue { tracks, start })
    }

    pub fn play_episode_queue(&self, episodes: Vec<Episode>, start: usize) -> Result<()> {
        self.send(Command::PlayEpisodeQueue { episodes, start })
    }

    pub fn toggle_play_pause(&self) -> Result<()> {
        self.send(Command::TogglePlayPause)
    }

    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.send(Command::Seek(seconds))
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(Command::SetVolume(volume))
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn next(&self) -> Result<()> {
        self.send(Command::Next)
    }

    pub fn previous(&self) -> Result<()> {
        self.send(Command::Previous)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Latest published snapshot
    pub fn session(&self) -> PlaybackSession {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSession> {
        self.snapshots.clone()
    }

    /// Wait for a snapshot matching `predicate` (checks the current one first)
    pub async fn wait_until<F>(&self, predicate: F) -> Result<PlaybackSession>
    where
        F: FnMut(&PlaybackSession) -> bool,
    {
        let mut rx = self.snapshots.clone();
        let session = rx
            .wait_for(predicate)
            .await
            .map_err(|_| PlayerError::ServiceClosed)?;
        Ok(session.clone())
    }
}
