// dualdeck - terminal front-end for the playback controller
// Reads simple commands from stdin; handy for poking at the controller without a UI

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use dualdeck::library::LibraryScanner;
use dualdeck::media::format_time;
use dualdeck::output::{AudioOutput, NullOutput, OutputEvent};
use dualdeck::{
    Command, Config, FileStore, MediaKind, PlaybackController, PlaybackSession, PlayerHandle,
    PlayerService, RepeatMode, SessionStore,
};

#[derive(Parser)]
#[command(name = "dualdeck")]
#[command(about = "Play tracks and podcast episodes through one controller")]
struct Args {
    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,

    /// Use this config file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start fresh instead of restoring the last session
    #[arg(long)]
    no_restore: bool,

    /// Treat the given paths as podcast folders
    #[arg(long)]
    episodes: bool,

    /// Files or folders to queue up
    paths: Vec<PathBuf>,
}

fn init_logging(dev: bool) -> Result<WorkerGuard> {
    let log_dir = dirs::data_dir()
        .map(|d| d.join("dualdeck").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&log_dir, "dualdeck.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,dualdeck=debug"))
    };

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_filter(filter());

    // Dev mode mirrors everything to stderr as well
    let stderr_layer = dev.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(filter())
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(guard)
}

fn open_output(volume: f32, events: mpsc::UnboundedSender<OutputEvent>) -> Box<dyn AudioOutput> {
    #[cfg(feature = "audio")]
    {
        match dualdeck::output::RodioOutput::new(volume, events.clone()) {
            Ok(output) => return Box::new(output),
            Err(e) => warn!("Falling back to silent output: {}", e),
        }
    }
    #[cfg(not(feature = "audio"))]
    let _ = volume;

    Box::new(NullOutput::new(events))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.dev)?;
    info!("dualdeck starting up");

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let output = open_output(config.player.initial_volume, event_tx);

    let mut controller = PlaybackController::new(output, config.controller_options());
    // A restored session overrides the configured repeat mode
    controller.set_repeat(config.player.repeat);
    if config.persistence.enabled {
        let path = match &config.persistence.session_path {
            Some(path) => path.clone(),
            None => FileStore::default_path()?,
        };
        let mut store = FileStore::new(path);
        if args.no_restore {
            store.clear()?;
        }
        controller = controller.with_store(Box::new(store));
    }

    let (player, service) = PlayerService::spawn(controller, event_rx);

    if !args.paths.is_empty() {
        queue_paths(&player, &args.paths, args.episodes)?;
    }

    println!("dualdeck - type 'help' for commands");
    tokio::spawn(announce_changes(player.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(line.trim()) {
            Input::Command(command) => player.send(command)?,
            Input::Library(kind) => {
                let (dirs, episodes) = match kind {
                    MediaKind::Track => (&config.library.music_directories, false),
                    MediaKind::Episode => (&config.library.podcast_directories, true),
                };
                if let Err(e) = queue_paths(&player, dirs, episodes) {
                    println!("Could not load library: {}", e);
                }
            }
            Input::Status => print_status(&player.session()),
            Input::Queue => print_queue(&player.session()),
            Input::Help => print_help(),
            Input::Quit => break,
            Input::Empty => {}
            Input::Unknown(text) => println!("Unknown command: {} (try 'help')", text),
        }
    }

    player.shutdown()?;
    service.await?;
    info!("dualdeck shut down");
    Ok(())
}

fn queue_paths(player: &PlayerHandle, paths: &[PathBuf], episodes: bool) -> Result<()> {
    let scanner = LibraryScanner::new();
    if episodes {
        let mut all = Vec::new();
        for path in paths {
            all.extend(scanner.scan_episodes(path)?);
        }
        println!("Queued {} episodes", all.len());
        player.play_episode_queue(all, 0)?;
    } else {
        let mut all = Vec::new();
        for path in paths {
            all.extend(scanner.scan_tracks(path)?);
        }
        println!("Queued {} tracks", all.len());
        player.play_track_queue(all, 0)?;
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Input {
    Command(Command),
    Library(MediaKind),
    Status,
    Queue,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> Input {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Input::Empty;
    };
    let arg = parts.next();

    let command = match (verb, arg) {
        ("p" | "play" | "toggle", None) => Command::TogglePlayPause,
        ("pause", None) => Command::Pause,
        ("resume", None) => Command::Resume,
        ("n" | "next", None) => Command::Next,
        ("b" | "prev" | "previous", None) => Command::Previous,
        ("s" | "stop", None) => Command::Stop,
        ("m" | "mute", None) => Command::ToggleMute,
        ("seek", Some(secs)) => match secs.parse::<f64>() {
            Ok(secs) => Command::Seek(secs),
            Err(_) => return Input::Unknown(line.to_string()),
        },
        ("vol" | "volume", Some(pct)) => match pct.parse::<f32>() {
            Ok(pct) => Command::SetVolume(pct / 100.0),
            Err(_) => return Input::Unknown(line.to_string()),
        },
        ("repeat", Some(mode)) => match mode {
            "off" => Command::SetRepeat(RepeatMode::Off),
            "all" => Command::SetRepeat(RepeatMode::All),
            "one" => Command::SetRepeat(RepeatMode::One),
            _ => return Input::Unknown(line.to_string()),
        },
        ("shuffle", Some(state)) => match state {
            "on" => Command::SetShuffle(true),
            "off" => Command::SetShuffle(false),
            _ => return Input::Unknown(line.to_string()),
        },
        ("clear", Some("tracks")) => Command::ClearQueue(MediaKind::Track),
        ("clear", Some("episodes")) => Command::ClearQueue(MediaKind::Episode),
        ("library", Some("tracks")) => return Input::Library(MediaKind::Track),
        ("library", Some("episodes")) => return Input::Library(MediaKind::Episode),
        ("status", None) => return Input::Status,
        ("queue" | "q", None) => return Input::Queue,
        ("help" | "?", None) => return Input::Help,
        ("quit" | "exit", None) => return Input::Quit,
        _ => return Input::Unknown(line.to_string()),
    };
    Input::Command(command)
}

async fn announce_changes(player: PlayerHandle) {
    let mut rx = player.subscribe();
    let mut last_item = None;
    let mut last_error = None;

    while rx.changed().await.is_ok() {
        let session = rx.borrow_and_update().clone();
        let item = session.active_item().map(|i| i.to_string());
        if item != last_item {
            match &item {
                Some(item) => println!("Now playing: {}", item),
                None => println!("Stopped"),
            }
            last_item = item;
        }
        if session.last_error != last_error {
            if let Some(error) = &session.last_error {
                println!("Playback error: {}", error);
            }
            last_error = session.last_error.clone();
        }
    }
}

fn print_status(session: &PlaybackSession) {
    match session.active_item() {
        Some(item) => println!(
            "{:?} {} [{} / {} {:.0}%] vol {:.0}%{}",
            session.phase,
            item,
            format_time(session.position),
            format_time(session.duration),
            session.progress() * 100.0,
            session.volume * 100.0,
            if session.muted { " (muted)" } else { "" }
        ),
        None => println!("Idle, vol {:.0}%", session.volume * 100.0),
    }
}

fn print_queue(session: &PlaybackSession) {
    let episode_mode = session.active_kind == Some(MediaKind::Episode);
    let entries: Vec<String> = if episode_mode {
        session.episode_queue.iter().map(|e| format!("#{} {}", e.episode_number, e.title)).collect()
    } else {
        session.track_queue.iter().map(|t| format!("{} - {}", t.display_artist(), t.title)).collect()
    };

    if entries.is_empty() {
        println!("Queue is empty");
        return;
    }
    for (i, entry) in entries.iter().enumerate() {
        let marker = if Some(i) == session.current_index { ">" } else { " " };
        println!("{} {:3}. {}", marker, i + 1, entry);
    }
}

fn print_help() {
    println!("p/play      toggle play/pause");
    println!("pause       pause");
    println!("resume      resume");
    println!("n/next      next in queue");
    println!("b/prev      previous (restarts if you're a few seconds in)");
    println!("seek <s>    jump to second s");
    println!("vol <0-100> set volume");
    println!("m/mute      toggle mute");
    println!("repeat off|all|one");
    println!("shuffle on|off");
    println!("clear tracks|episodes");
    println!("library tracks|episodes  queue up the configured folders");
    println!("s/stop      stop and unload");
    println!("status, queue, quit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_playback_verbs() {
        assert!(matches!(parse_command("p"), Input::Command(Command::TogglePlayPause)));
        assert!(matches!(parse_command("next"), Input::Command(Command::Next)));
        assert!(matches!(parse_command("seek 42.5"), Input::Command(Command::Seek(s)) if s == 42.5));
        assert!(matches!(parse_command("vol 50"), Input::Command(Command::SetVolume(v)) if v == 0.5));
        assert!(matches!(parse_command("repeat one"), Input::Command(Command::SetRepeat(RepeatMode::One))));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_command("seek soon"), Input::Unknown(_)));
        assert!(matches!(parse_command("dance"), Input::Unknown(_)));
        assert_eq!(parse_command("   "), Input::Empty);
        assert_eq!(parse_command("quit"), Input::Quit);
        assert_eq!(parse_command("library episodes"), Input::Library(MediaKind::Episode));
        assert!(matches!(parse_command("library films"), Input::Unknown(_)));
    }
}
