// Playback controller - the single authority over the audio output
// Owns the live session, both queues and the output itself; every mutation goes through here

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::error::OutputError;
use crate::media::{Episode, MediaItem, MediaKind, Track};
use crate::output::{AudioOutput, LoadId, OutputEvent, OutputEventKind, PlayFuture};
use crate::persist::{PersistedSession, SessionStore, SESSION_SCHEMA_VERSION};
use crate::queue::{PlayQueue, RepeatMode};
use crate::session::{PlaybackPhase, PlaybackSession};

pub type ErrorCallback = Box<dyn FnMut(&OutputError) + Send>;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub initial_volume: f32,
    /// Move on through the active queue when an item ends
    pub advance_on_end: bool,
    /// previous() restarts the current item instead once this far in (seconds)
    pub restart_threshold: f64,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            advance_on_end: false,
            restart_threshold: 3.0,
        }
    }
}

/// A play request that has been handed to the output but not yet settled.
/// Drive `request` to completion and feed the result to `settle_play` with `seq`.
pub struct PendingPlay {
    pub seq: u64,
    pub request: PlayFuture,
}

impl std::fmt::Debug for PendingPlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingPlay").field("seq", &self.seq).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    Started,
    Failed(OutputError),
    /// Superseded by a later play/pause/stop; nothing was changed
    Stale,
}

pub struct PlaybackController<O: AudioOutput> {
    output: O,
    store: Option<Box<dyn SessionStore>>,
    options: ControllerOptions,
    on_error: Option<ErrorCallback>,

    active: Option<MediaItem>,
    // False for an item restored from disk until it is first played
    source_loaded: bool,
    // The loaded source ran out or broke; it has to be loaded again before it can play
    source_spent: bool,
    phase: PlaybackPhase,
    is_playing: bool,
    position: f64,
    duration: f64,
    volume: f32,
    muted: bool,
    last_error: Option<String>,

    tracks: PlayQueue<Track>,
    episodes: PlayQueue<Episode>,
    repeat: RepeatMode,
    shuffle: bool,
    rng: StdRng,

    load_id: LoadId,
    play_seq: u64,
    last_saved: Option<String>,
}

impl<O: AudioOutput> PlaybackController<O> {
    pub fn new(output: O, options: ControllerOptions) -> Self {
        let volume = sanitize_volume(options.initial_volume).unwrap_or(1.0);
        let mut controller = Self {
            output,
            store: None,
            options,
            on_error: None,
            active: None,
            source_loaded: false,
            source_spent: false,
            phase: PlaybackPhase::Idle,
            is_playing: false,
            position: 0.0,
            duration: 0.0,
            volume,
            muted: false,
            last_error: None,
            tracks: PlayQueue::new(),
            episodes: PlayQueue::new(),
            repeat: RepeatMode::Off,
            shuffle: false,
            rng: StdRng::from_entropy(),
            load_id: 0,
            play_seq: 0,
            last_saved: None,
        };
        controller.apply_volume();
        controller
    }

    /// Attach a session store and rehydrate from it. Bad blobs are dropped silently.
    pub fn with_store(mut self, store: Box<dyn SessionStore>) -> Self {
        let restored = match store.load() {
            Ok(Some(raw)) => PersistedSession::restore(&raw),
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read persisted session: {}", e);
                None
            }
        };
        self.store = Some(store);
        if let Some(session) = restored {
            self.restore(session);
        }
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn on_error(&mut self, callback: ErrorCallback) {
        self.on_error = Some(callback);
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    fn restore(&mut self, session: PersistedSession) {
        let kind = session.current_media_type;
        let (track_cursor, episode_cursor) = match kind {
            Some(MediaKind::Episode) => (0, session.current_index),
            _ => (session.current_index, 0),
        };
        self.tracks = PlayQueue::from_parts(session.track_queue, track_cursor);
        self.episodes = PlayQueue::from_parts(session.episode_queue, episode_cursor);
        self.repeat = session.repeat;
        self.volume = sanitize_volume(session.volume).unwrap_or(self.volume);
        self.apply_volume();

        self.active = match kind {
            Some(MediaKind::Track) => session.current_track.map(MediaItem::Track),
            Some(MediaKind::Episode) => session.current_episode.map(MediaItem::Episode),
            None => None,
        };
        match &self.active {
            Some(MediaItem::Track(t)) => {
                self.tracks.follow(&t.id);
            }
            Some(MediaItem::Episode(e)) => {
                self.episodes.follow(&e.id);
            }
            None => {}
        }
        // Shown but not auto-played; the source is handed over on the next play
        self.phase = if self.active.is_some() {
            PlaybackPhase::Paused
        } else {
            PlaybackPhase::Idle
        };
        self.last_saved = self.persisted().to_json().ok();
        info!(
            "Restored session: {} tracks, {} episodes queued",
            self.tracks.len(),
            self.episodes.len()
        );
    }

    // ---- playback verbs -------------------------------------------------

    /// Play a track. The already-active track toggles pause/resume instead of reloading.
    pub fn play_track(&mut self, track: Track) -> Option<PendingPlay> {
        self.tracks.follow(&track.id);
        self.play_item(MediaItem::Track(track))
    }

    /// Play an episode. The already-active episode toggles pause/resume instead of reloading.
    pub fn play_episode(&mut self, episode: Episode) -> Option<PendingPlay> {
        self.episodes.follow(&episode.id);
        self.play_item(MediaItem::Episode(episode))
    }

    pub fn play_item(&mut self, item: MediaItem) -> Option<PendingPlay> {
        let same = self
            .active
            .as_ref()
            .map(|active| active.key() == item.key())
            .unwrap_or(false);

        if same && self.source_loaded && !self.source_spent {
            return self.toggle_play_pause();
        }
        self.start_item(item)
    }

    /// Tear down whatever is active and load `item` fresh
    fn start_item(&mut self, item: MediaItem) -> Option<PendingPlay> {
        self.teardown();

        self.load_id += 1;
        info!("Loading {} '{}' (load #{})", item.kind(), item.title(), self.load_id);
        self.output.load(self.load_id, item.source());
        // Tag durations hold until the output reports its own
        self.duration = item
            .duration_hint()
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0);
        self.active = Some(item);
        self.source_loaded = true;
        self.source_spent = false;
        self.phase = PlaybackPhase::Loading;
        self.persist();

        Some(self.request_play())
    }

    fn teardown(&mut self) {
        if self.source_loaded {
            self.output.pause();
        }
        self.play_seq += 1;
        self.is_playing = false;
        self.position = 0.0;
        self.duration = 0.0;
        self.last_error = None;
        self.phase = PlaybackPhase::Idle;
    }

    fn request_play(&mut self) -> PendingPlay {
        self.play_seq += 1;
        self.phase = PlaybackPhase::Loading;
        debug!("Requesting play (seq {})", self.play_seq);
        PendingPlay {
            seq: self.play_seq,
            request: self.output.play(),
        }
    }

    /// Apply the result of a play request. Only the most recent request counts.
    pub fn settle_play(&mut self, seq: u64, result: Result<(), OutputError>) -> PlayOutcome {
        if seq != self.play_seq || self.active.is_none() {
            debug!("Ignoring stale play result (seq {}, current {})", seq, self.play_seq);
            return PlayOutcome::Stale;
        }
        match result {
            Ok(()) => {
                self.is_playing = true;
                self.phase = PlaybackPhase::Playing;
                self.last_error = None;
                PlayOutcome::Started
            }
            Err(e) => {
                self.fail(e.clone());
                PlayOutcome::Failed(e)
            }
        }
    }

    pub fn toggle_play_pause(&mut self) -> Option<PendingPlay> {
        let item = self.active.clone()?;

        if !self.source_loaded || self.source_spent {
            return self.start_item(item);
        }
        if self.is_playing || self.phase == PlaybackPhase::Loading {
            self.pause();
            None
        } else {
            Some(self.request_play())
        }
    }

    pub fn pause(&mut self) {
        if self.active.is_none() {
            return;
        }
        if self.source_loaded {
            self.output.pause();
        }
        // Anything still in flight must not flip us back to playing
        self.play_seq += 1;
        self.is_playing = false;
        if matches!(self.phase, PlaybackPhase::Loading | PlaybackPhase::Playing) {
            self.phase = PlaybackPhase::Paused;
        }
    }

    pub fn resume(&mut self) -> Option<PendingPlay> {
        if self.is_playing || self.phase == PlaybackPhase::Loading {
            return None;
        }
        self.toggle_play_pause()
    }

    /// Seek within the active item, clamped to [0, duration] (upper bound only once known).
    /// Non-finite targets and sources that have ended or failed are ignored.
    pub fn seek(&mut self, seconds: f64) {
        if self.active.is_none() || !self.source_loaded || self.source_spent || !seconds.is_finite() {
            return;
        }
        let mut target = seconds.max(0.0);
        if self.duration > 0.0 {
            target = target.min(self.duration);
        }
        self.output.seek(target);
        self.position = target;
    }

    /// Linear volume clamped to [0, 1]; NaN is ignored
    pub fn set_volume(&mut self, volume: f32) {
        let Some(volume) = sanitize_volume(volume) else {
            return;
        };
        self.volume = volume;
        self.apply_volume();
        self.persist();
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.apply_volume();
    }

    fn apply_volume(&mut self) {
        let effective = if self.muted { 0.0 } else { self.volume };
        self.output.set_volume(effective);
    }

    /// Drop the active item entirely. Queues are left alone.
    pub fn stop(&mut self) {
        if self.source_loaded {
            self.output.unload();
        }
        self.play_seq += 1;
        self.active = None;
        self.source_loaded = false;
        self.source_spent = false;
        self.phase = PlaybackPhase::Idle;
        self.is_playing = false;
        self.position = 0.0;
        self.duration = 0.0;
        self.persist();
    }

    // ---- queues -----------------------------------------------------------

    /// Replace the track queue and start at `start` (clamped). An empty queue stops playback.
    pub fn play_track_queue(&mut self, tracks: Vec<Track>, start: usize) -> Option<PendingPlay> {
        self.tracks.replace(tracks, start);
        // The start item stays current; the rest follows the shuffle setting
        self.tracks.set_shuffled(self.shuffle, &mut self.rng);
        match self.tracks.current().cloned() {
            Some(track) => self.start_item(MediaItem::Track(track)),
            None => {
                self.stop();
                None
            }
        }
    }

    pub fn play_episode_queue(&mut self, episodes: Vec<Episode>, start: usize) -> Option<PendingPlay> {
        self.episodes.replace(episodes, start);
        // The start item stays current; the rest follows the shuffle setting
        self.episodes.set_shuffled(self.shuffle, &mut self.rng);
        match self.episodes.current().cloned() {
            Some(episode) => self.start_item(MediaItem::Episode(episode)),
            None => {
                self.stop();
                None
            }
        }
    }

    /// Next item in the active queue. Explicit skips wrap under `RepeatMode::One`.
    pub fn next(&mut self) -> Option<PendingPlay> {
        let repeat = match self.repeat {
            RepeatMode::One => RepeatMode::All,
            other => other,
        };
        let item = self.step(repeat, true)?;
        self.start_item(item)
    }

    /// Previous item, or restart the current one when we're past the threshold
    pub fn previous(&mut self) -> Option<PendingPlay> {
        if self.position > self.options.restart_threshold {
            if let Some(item) = self.active.clone() {
                if self.source_spent {
                    return self.start_item(item);
                }
                self.seek(0.0);
                return None;
            }
        }
        let repeat = match self.repeat {
            RepeatMode::One => RepeatMode::All,
            other => other,
        };
        let item = self.step(repeat, false)?;
        self.start_item(item)
    }

    fn step(&mut self, repeat: RepeatMode, forward: bool) -> Option<MediaItem> {
        match self.active.as_ref()?.kind() {
            MediaKind::Track => {
                let track = if forward {
                    self.tracks.advance(repeat)
                } else {
                    self.tracks.retreat(repeat)
                };
                track.cloned().map(MediaItem::Track)
            }
            MediaKind::Episode => {
                let episode = if forward {
                    self.episodes.advance(repeat)
                } else {
                    self.episodes.retreat(repeat)
                };
                episode.cloned().map(MediaItem::Episode)
            }
        }
    }

    pub fn enqueue_track(&mut self, track: Track) {
        self.tracks.push(track);
        self.persist();
    }

    pub fn enqueue_episode(&mut self, episode: Episode) {
        self.episodes.push(episode);
        self.persist();
    }

    pub fn remove_from_queue(&mut self, kind: MediaKind, index: usize) -> Option<MediaItem> {
        let removed = match kind {
            MediaKind::Track => self.tracks.remove(index).map(MediaItem::Track),
            MediaKind::Episode => self.episodes.remove(index).map(MediaItem::Episode),
        };
        if removed.is_some() {
            self.persist();
        }
        removed
    }

    pub fn clear_queue(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Track => self.tracks.clear(),
            MediaKind::Episode => self.episodes.clear(),
        }
        self.persist();
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
        self.persist();
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.shuffle = enabled;
        self.tracks.set_shuffled(enabled, &mut self.rng);
        self.episodes.set_shuffled(enabled, &mut self.rng);
        self.persist();
    }

    // ---- output events ----------------------------------------------------

    /// Apply one event from the output, in arrival order. Events from a superseded
    /// load are dropped. Returns a new play request when an ended item auto-advances.
    pub fn handle_event(&mut self, event: OutputEvent) -> Option<PendingPlay> {
        if !self.source_loaded || event.load != self.load_id {
            debug!("Dropping event for stale load #{}: {:?}", event.load, event.kind);
            return None;
        }

        match event.kind {
            OutputEventKind::LoadedMetadata { duration } => {
                if duration.is_finite() && duration >= 0.0 {
                    self.duration = duration;
                    if duration > 0.0 {
                        self.position = self.position.min(duration);
                    }
                }
            }
            OutputEventKind::TimeUpdate { position } => {
                if position.is_finite() {
                    let mut position = position.max(0.0);
                    if self.duration > 0.0 {
                        position = position.min(self.duration);
                    }
                    self.position = position;
                }
            }
            OutputEventKind::Playing => {
                self.is_playing = true;
                self.phase = PlaybackPhase::Playing;
            }
            OutputEventKind::Paused => {
                self.is_playing = false;
                if matches!(self.phase, PlaybackPhase::Loading | PlaybackPhase::Playing) {
                    self.phase = PlaybackPhase::Paused;
                }
            }
            OutputEventKind::Ended => {
                self.play_seq += 1;
                self.is_playing = false;
                self.source_spent = true;
                self.phase = PlaybackPhase::Ended;
                if self.duration > 0.0 {
                    self.position = self.duration;
                }
                if self.options.advance_on_end {
                    return self.advance_after_end();
                }
            }
            OutputEventKind::Error(e) => {
                self.play_seq += 1;
                self.fail(e);
            }
        }
        None
    }

    fn advance_after_end(&mut self) -> Option<PendingPlay> {
        // repeat One replays whatever ended, queued or not
        let item = match (self.repeat, self.active.clone()) {
            (RepeatMode::One, Some(active)) => active,
            _ => self.step(self.repeat, true)?,
        };
        debug!("Auto-advancing to '{}'", item.title());
        self.start_item(item)
    }

    fn fail(&mut self, error: OutputError) {
        warn!("Playback error: {}", error);
        // A refused start leaves the source intact; retrying just asks again
        if !matches!(error, OutputError::Rejected(_)) {
            self.source_spent = true;
        }
        self.is_playing = false;
        self.phase = PlaybackPhase::Errored;
        self.last_error = Some(error.to_string());
        if let Some(callback) = self.on_error.as_mut() {
            callback(&error);
        }
    }

    // ---- observation ----------------------------------------------------------

    pub fn snapshot(&self) -> PlaybackSession {
        let (current_track, current_episode) = match &self.active {
            Some(MediaItem::Track(t)) => (Some(t.clone()), None),
            Some(MediaItem::Episode(e)) => (None, Some(e.clone())),
            None => (None, None),
        };
        PlaybackSession {
            active_kind: self.active.as_ref().map(MediaItem::kind),
            current_track,
            current_episode,
            phase: self.phase,
            is_playing: self.is_playing,
            position: self.position,
            duration: self.duration,
            volume: self.volume,
            muted: self.muted,
            track_queue: self.tracks.items().to_vec(),
            episode_queue: self.episodes.items().to_vec(),
            current_index: self.current_index(),
            repeat: self.repeat,
            shuffle: self.shuffle,
            last_error: self.last_error.clone(),
        }
    }

    pub fn active_item(&self) -> Option<&MediaItem> {
        self.active.as_ref()
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn current_load(&self) -> LoadId {
        self.load_id
    }

    fn current_index(&self) -> Option<usize> {
        match self.active.as_ref().map(MediaItem::kind) {
            Some(MediaKind::Episode) => self.episodes.index(),
            _ => self.tracks.index(),
        }
    }

    // ---- persistence ------------------------------------------------------------

    fn persisted(&self) -> PersistedSession {
        let (current_track, current_episode) = match &self.active {
            Some(MediaItem::Track(t)) => (Some(t.clone()), None),
            Some(MediaItem::Episode(e)) => (None, Some(e.clone())),
            None => (None, None),
        };
        PersistedSession {
            version: SESSION_SCHEMA_VERSION,
            current_track,
            current_episode,
            current_media_type: self.active.as_ref().map(MediaItem::kind),
            volume: self.volume,
            track_queue: self.tracks.items().to_vec(),
            episode_queue: self.episodes.items().to_vec(),
            current_index: self.current_index().unwrap_or(0),
            repeat: self.repeat,
            saved_at: None,
        }
    }

    /// Write the session out if anything persisted has changed since the last write.
    /// Change detection ignores the timestamp.
    fn persist(&mut self) {
        if self.store.is_none() {
            return;
        }
        let mut session = self.persisted();
        let unstamped = match session.to_json() {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Could not encode session: {}", e);
                return;
            }
        };
        if self.last_saved.as_deref() == Some(unstamped.as_str()) {
            return;
        }

        session.saved_at = Some(chrono::Utc::now());
        let result = session
            .to_json()
            .and_then(|blob| match self.store.as_mut() {
                Some(store) => store.save(&blob),
                None => Ok(()),
            });
        match result {
            Ok(()) => self.last_saved = Some(unstamped),
            Err(e) => warn!("Could not save session: {}", e),
        }
    }
}

fn sanitize_volume(volume: f32) -> Option<f32> {
    if volume.is_nan() {
        None
    } else {
        Some(volume.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputCall, ScriptHandle, ScriptedOutput};
    use tokio::sync::mpsc;

    fn controller() -> (PlaybackController<ScriptedOutput>, ScriptHandle) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (output, handle) = ScriptedOutput::new(tx);
        (PlaybackController::new(output, ControllerOptions::default()), handle)
    }

    fn event(c: &PlaybackController<ScriptedOutput>, kind: OutputEventKind) -> OutputEvent {
        OutputEvent::new(c.current_load(), kind)
    }

    #[test]
    fn toggle_without_item_is_noop() {
        let (mut c, handle) = controller();
        handle.clear_calls();
        assert!(c.toggle_play_pause().is_none());
        c.pause();
        c.seek(10.0);
        assert!(handle.calls().is_empty());
        assert_eq!(c.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn seek_is_clamped_to_known_duration() {
        let (mut c, handle) = controller();
        let _pending = c.play_track(Track::new("t1", "One", "a.mp3"));
        c.seek(50.0);
        assert_eq!(c.position(), 50.0);

        c.handle_event(event(&c, OutputEventKind::LoadedMetadata { duration: 30.0 }));
        assert_eq!(c.position(), 30.0);

        c.seek(-4.0);
        assert_eq!(c.position(), 0.0);
        c.seek(99.0);
        assert_eq!(c.position(), 30.0);
        assert!(handle.calls().contains(&OutputCall::Seek(30.0)));

        c.seek(f64::NAN);
        assert_eq!(c.position(), 30.0);
    }

    #[test]
    fn non_finite_seek_never_reaches_the_output() {
        let (mut c, handle) = controller();
        let _pending = c.play_track(Track::new("t1", "One", "a.mp3"));
        handle.clear_calls();

        c.seek(f64::INFINITY);
        c.seek(f64::NEG_INFINITY);
        assert_eq!(c.position(), 0.0);
        assert!(handle.calls().is_empty());

        c.seek(12.5);
        assert_eq!(handle.calls(), vec![OutputCall::Seek(12.5)]);
    }

    #[test]
    fn tag_duration_bounds_seek_until_metadata_arrives() {
        let (mut c, _handle) = controller();
        let mut track = Track::new("t1", "One", "a.mp3");
        track.duration = Some(200.0);
        let _pending = c.play_track(track);
        assert_eq!(c.duration(), 200.0);

        c.seek(500.0);
        assert_eq!(c.position(), 200.0);

        c.handle_event(event(&c, OutputEventKind::LoadedMetadata { duration: 180.0 }));
        assert_eq!(c.duration(), 180.0);
        assert_eq!(c.position(), 180.0);
    }

    #[test]
    fn seek_after_end_is_ignored() {
        let (mut c, handle) = controller();
        let pending = c.play_track(Track::new("t1", "One", "a.mp3")).unwrap();
        c.settle_play(pending.seq, Ok(()));
        c.handle_event(event(&c, OutputEventKind::LoadedMetadata { duration: 60.0 }));
        c.handle_event(event(&c, OutputEventKind::Ended));
        handle.clear_calls();

        c.seek(5.0);
        assert_eq!(c.position(), 60.0);
        assert!(handle.calls().is_empty());

        // Playing again starts over from a fresh load
        assert!(c.toggle_play_pause().is_some());
        assert_eq!(c.position(), 0.0);
        assert!(handle.calls().iter().any(|call| matches!(call, OutputCall::Load { .. })));
    }

    #[test]
    fn previous_after_end_reloads_current_item() {
        let (mut c, _handle) = controller();
        let tracks = vec![Track::new("a", "A", "a.mp3"), Track::new("b", "B", "b.mp3")];
        let _pending = c.play_track_queue(tracks, 1);
        c.handle_event(event(&c, OutputEventKind::LoadedMetadata { duration: 60.0 }));
        c.handle_event(event(&c, OutputEventKind::Ended));

        let before = c.current_load();
        assert!(c.previous().is_some());
        assert!(c.current_load() > before);
        assert_eq!(c.active_item().map(|i| i.id().to_string()), Some("b".to_string()));
        assert_eq!(c.position(), 0.0);
    }

    #[test]
    fn volume_is_clamped_and_mute_is_separate() {
        let (mut c, handle) = controller();
        c.set_volume(1.7);
        assert_eq!(c.snapshot().volume, 1.0);
        c.set_volume(-0.2);
        assert_eq!(c.snapshot().volume, 0.0);
        c.set_volume(f32::NAN);
        assert_eq!(c.snapshot().volume, 0.0);

        c.set_volume(0.6);
        c.toggle_mute();
        assert_eq!(handle.calls().last(), Some(&OutputCall::Volume(0.0)));
        assert_eq!(c.snapshot().volume, 0.6);
        c.toggle_mute();
        assert_eq!(handle.calls().last(), Some(&OutputCall::Volume(0.6)));
    }

    #[test]
    fn time_updates_never_pass_duration() {
        let (mut c, _handle) = controller();
        let _pending = c.play_track(Track::new("t1", "One", "a.mp3"));
        c.handle_event(event(&c, OutputEventKind::LoadedMetadata { duration: 100.0 }));
        c.handle_event(event(&c, OutputEventKind::TimeUpdate { position: 140.0 }));
        assert_eq!(c.position(), 100.0);
    }

    #[test]
    fn output_error_leaves_item_active_but_not_playing() {
        let (mut c, _handle) = controller();
        let mut pending = c.play_track(Track::new("t1", "One", "a.mp3")).unwrap();
        assert_eq!(c.settle_play(pending.seq, Ok(())), PlayOutcome::Started);

        c.handle_event(event(&c, OutputEventKind::Error(OutputError::Source("decode".into()))));
        let snap = c.snapshot();
        assert_eq!(snap.phase, PlaybackPhase::Errored);
        assert!(!snap.is_playing);
        assert!(snap.current_track.is_some());
        assert!(snap.last_error.unwrap().contains("decode"));

        // Re-invoking the same item reloads instead of toggling
        pending = c.play_track(Track::new("t1", "One", "a.mp3")).unwrap();
        assert_eq!(c.phase(), PlaybackPhase::Loading);
        assert_eq!(c.settle_play(pending.seq, Ok(())), PlayOutcome::Started);
    }

    #[test]
    fn pause_invalidates_in_flight_play() {
        let (mut c, _handle) = controller();
        let pending = c.play_track(Track::new("t1", "One", "a.mp3")).unwrap();
        c.pause();
        assert_eq!(c.settle_play(pending.seq, Ok(())), PlayOutcome::Stale);
        assert!(!c.is_playing());
        assert_eq!(c.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn error_callback_sees_rejections() {
        let (mut c, _handle) = controller();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        c.on_error(Box::new(move |e| sink.lock().unwrap().push(e.clone())));

        let pending = c.play_track(Track::new("t1", "One", "a.mp3")).unwrap();
        let rejected = OutputError::Rejected("autoplay".into());
        assert_eq!(c.settle_play(pending.seq, Err(rejected.clone())), PlayOutcome::Failed(rejected.clone()));
        assert_eq!(seen.lock().unwrap().as_slice(), &[rejected]);
        assert!(!c.is_playing());
    }

    #[test]
    fn previous_restarts_when_far_enough_in() {
        let (mut c, _handle) = controller();
        let tracks = vec![Track::new("a", "A", "a.mp3"), Track::new("b", "B", "b.mp3")];
        let _pending = c.play_track_queue(tracks, 1);
        c.handle_event(event(&c, OutputEventKind::TimeUpdate { position: 12.0 }));

        assert!(c.previous().is_none());
        assert_eq!(c.position(), 0.0);
        assert_eq!(c.active_item().map(|i| i.id().to_string()), Some("b".to_string()));

        assert!(c.previous().is_some());
        assert_eq!(c.active_item().map(|i| i.id().to_string()), Some("a".to_string()));
        assert!(c.previous().is_none());
    }
}
