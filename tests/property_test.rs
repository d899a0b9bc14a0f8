//! Property-based tests for the playback controller
//!
//! Random command/event sequences must never break the session invariants.

use proptest::prelude::*;
use dualdeck::output::ScriptedOutput;
use dualdeck::{
    ControllerOptions, Episode, MediaKind, OutputError, OutputEvent, OutputEventKind, PlayQueue,
    PlaybackController, PlaybackPhase, PlaybackSession, RepeatMode, Track,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

// ===== Helpers =====

#[derive(Debug, Clone)]
enum Op {
    PlayTrack(usize),
    PlayEpisode(usize),
    TrackQueue(usize, usize),
    EpisodeQueue(usize, usize),
    Toggle,
    Seek(f64),
    Volume(f32),
    Stop,
    Next,
    Previous,
    Event(OutputEventKind),
    StaleEvent(OutputEventKind),
    SettleLatest(bool),
    SettleOld,
    Remove(usize),
    Repeat(u8),
    Shuffle(bool),
}

fn track(i: usize) -> Track {
    Track::new(format!("t{}", i), format!("Track {}", i), format!("t{}.mp3", i))
}

fn episode(i: usize) -> Episode {
    Episode::new(format!("e{}", i), format!("Episode {}", i), "pod", i as u32 + 1, format!("e{}.mp3", i))
}

fn arbitrary_event() -> impl Strategy<Value = OutputEventKind> {
    prop_oneof![
        (0.0f64..400.0).prop_map(|duration| OutputEventKind::LoadedMetadata { duration }),
        (-10.0f64..600.0).prop_map(|position| OutputEventKind::TimeUpdate { position }),
        Just(OutputEventKind::Playing),
        Just(OutputEventKind::Paused),
        Just(OutputEventKind::Ended),
        Just(OutputEventKind::Error(OutputError::Source("decode".into()))),
    ]
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..6).prop_map(Op::PlayTrack),
        (0usize..6).prop_map(Op::PlayEpisode),
        (0usize..6, 0usize..8).prop_map(|(n, s)| Op::TrackQueue(n, s)),
        (0usize..6, 0usize..8).prop_map(|(n, s)| Op::EpisodeQueue(n, s)),
        Just(Op::Toggle),
        (-50.0f64..500.0).prop_map(Op::Seek),
        (-1.0f32..2.0).prop_map(Op::Volume),
        Just(Op::Stop),
        Just(Op::Next),
        Just(Op::Previous),
        arbitrary_event().prop_map(Op::Event),
        arbitrary_event().prop_map(Op::StaleEvent),
        any::<bool>().prop_map(Op::SettleLatest),
        Just(Op::SettleOld),
        (0usize..8).prop_map(Op::Remove),
        (0u8..3).prop_map(Op::Repeat),
        any::<bool>().prop_map(Op::Shuffle),
    ]
}

fn check_invariants(s: &PlaybackSession) -> Result<(), TestCaseError> {
    prop_assert!(!(s.current_track.is_some() && s.current_episode.is_some()), "two active items");
    match s.active_kind {
        Some(MediaKind::Track) => prop_assert!(s.current_track.is_some()),
        Some(MediaKind::Episode) => prop_assert!(s.current_episode.is_some()),
        None => {
            prop_assert!(s.current_track.is_none() && s.current_episode.is_none());
            prop_assert!(!s.is_playing);
            prop_assert_eq!(s.position, 0.0);
            prop_assert_eq!(s.phase, PlaybackPhase::Idle);
        }
    }

    prop_assert!(s.position >= 0.0);
    if s.duration > 0.0 {
        prop_assert!(s.position <= s.duration, "position {} past duration {}", s.position, s.duration);
    }
    prop_assert!((0.0..=1.0).contains(&s.volume));
    if s.is_playing {
        prop_assert_eq!(s.phase, PlaybackPhase::Playing);
    }

    let queue_len = match s.active_kind {
        Some(MediaKind::Episode) => s.episode_queue.len(),
        _ => s.track_queue.len(),
    };
    if let Some(index) = s.current_index {
        prop_assert!(index < queue_len, "index {} past queue of {}", index, queue_len);
        let queued = match s.active_kind {
            Some(MediaKind::Episode) => s.episode_queue.get(index).map(|e| e.id.as_str()),
            _ => s.track_queue.get(index).map(|t| t.id.as_str()),
        };
        if let Some(active) = s.active_item() {
            prop_assert_eq!(queued, Some(active.id()), "index {} is not the active item", index);
        }
    }
    Ok(())
}

// ===== Property Tests =====

proptest! {
    /// Property: no sequence of commands and output events breaks the session invariants
    #[test]
    fn session_invariants_hold(ops in prop::collection::vec(arbitrary_op(), 1..60)) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (output, _script) = ScriptedOutput::new(tx);
        let mut c = PlaybackController::new(output, ControllerOptions {
            advance_on_end: true,
            ..ControllerOptions::default()
        })
        .with_rng_seed(7);

        let mut issued: Vec<u64> = Vec::new();

        for op in ops {
            let pending = match op {
                Op::PlayTrack(i) => c.play_track(track(i)),
                Op::PlayEpisode(i) => c.play_episode(episode(i)),
                Op::TrackQueue(n, start) => c.play_track_queue((0..n).map(track).collect(), start),
                Op::EpisodeQueue(n, start) => c.play_episode_queue((0..n).map(episode).collect(), start),
                Op::Toggle => c.toggle_play_pause(),
                Op::Seek(s) => { c.seek(s); None }
                Op::Volume(v) => { c.set_volume(v); None }
                Op::Stop => { c.stop(); None }
                Op::Next => c.next(),
                Op::Previous => c.previous(),
                Op::Event(kind) => c.handle_event(OutputEvent::new(c.current_load(), kind)),
                Op::StaleEvent(kind) => {
                    let before = c.snapshot();
                    let stale = c.current_load().wrapping_sub(1);
                    c.handle_event(OutputEvent::new(stale, kind));
                    prop_assert_eq!(c.snapshot(), before, "stale event changed the session");
                    None
                }
                Op::SettleLatest(ok) => {
                    if let Some(seq) = issued.last().copied() {
                        let result = if ok { Ok(()) } else { Err(OutputError::Rejected("policy".into())) };
                        c.settle_play(seq, result);
                    }
                    None
                }
                Op::SettleOld => {
                    if issued.len() > 1 {
                        let before = c.snapshot();
                        c.settle_play(issued[0], Ok(()));
                        prop_assert_eq!(c.snapshot(), before, "superseded play changed the session");
                    }
                    None
                }
                Op::Remove(i) => { c.remove_from_queue(MediaKind::Track, i); None }
                Op::Repeat(m) => {
                    c.set_repeat(match m { 0 => RepeatMode::Off, 1 => RepeatMode::All, _ => RepeatMode::One });
                    None
                }
                Op::Shuffle(on) => { c.set_shuffle(on); None }
            };
            if let Some(pending) = pending {
                issued.push(pending.seq);
            }
            check_invariants(&c.snapshot())?;
        }
    }

    /// Property: stop always lands in the same empty state
    #[test]
    fn stop_always_resets(ops in prop::collection::vec(arbitrary_op(), 0..20)) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (output, _script) = ScriptedOutput::new(tx);
        let mut c = PlaybackController::new(output, ControllerOptions::default());

        for op in ops {
            match op {
                Op::TrackQueue(n, start) => { c.play_track_queue((0..n).map(track).collect(), start); }
                Op::PlayEpisode(i) => { c.play_episode(episode(i)); }
                Op::Event(kind) => { c.handle_event(OutputEvent::new(c.current_load(), kind)); }
                Op::Seek(s) => c.seek(s),
                _ => {}
            }
        }
        c.stop();

        let s = c.snapshot();
        prop_assert_eq!(s.active_kind, None);
        prop_assert!(!s.is_playing);
        prop_assert_eq!(s.position, 0.0);
        prop_assert_eq!(s.duration, 0.0);
        prop_assert_eq!(s.phase, PlaybackPhase::Idle);
    }

    /// Property: shuffling and unshuffling keeps every item and the current one
    #[test]
    fn shuffle_keeps_items_and_cursor(n in 1usize..30, start in 0usize..30, seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut queue = PlayQueue::new();
        queue.replace((0..n).map(track).collect(), start);
        let current = queue.current().map(|t| t.id.clone());

        queue.set_shuffled(true, &mut rng);
        prop_assert_eq!(queue.len(), n);
        prop_assert_eq!(queue.current().map(|t| t.id.clone()), current.clone());

        queue.set_shuffled(false, &mut rng);
        let ids: Vec<String> = queue.items().iter().map(|t| t.id.clone()).collect();
        let expected: Vec<String> = (0..n).map(|i| format!("t{}", i)).collect();
        prop_assert_eq!(ids, expected);
        prop_assert_eq!(queue.current().map(|t| t.id.clone()), current);
    }
}
