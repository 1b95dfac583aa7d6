//! Console front.
//!
//! Reads commands from stdin on a dedicated thread, translates them into
//! player/engine intents, and renders state snapshots, progress reports, and
//! like/unlike banners as plain lines on stdout. Banner display is driven by
//! a [`BannerQueue`] with per-generation timeout threads so a stale timeout
//! never cuts a newer banner short.

use std::io::BufRead;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Receiver, Sender};

use crate::config::Config;
use crate::notifications::BannerQueue;
use crate::protocol::{
    ConfigMessage, EngineMessage, LoopMode, Message, NotificationMessage, PlayerMessage,
    PlayerStateSnapshot, Track, UiMessage,
};

/// One parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    TogglePlay,
    Next,
    Previous,
    CycleLoop,
    /// 1-based queue position; `None` targets the current track.
    Like(Option<usize>),
    /// Normalized volume in [0.0, 1.0].
    Volume(f32),
    /// Target position in milliseconds.
    Seek(u64),
    List,
    Status,
    Quit,
}

/// Parses one input line. Volume accepts either a 0-100 percentage or a
/// 0.0-1.0 fraction; seek accepts `m:ss` or plain seconds.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(String::new)?;
    let argument = words.next();
    if words.next().is_some() {
        return Err(format!("Too many arguments for '{}'", verb));
    }

    match (verb, argument) {
        ("play", None) => Ok(Command::Play),
        ("pause", None) => Ok(Command::Pause),
        ("p" | "toggle", None) => Ok(Command::TogglePlay),
        ("next" | "n", None) => Ok(Command::Next),
        ("prev" | "previous", None) => Ok(Command::Previous),
        ("loop", None) => Ok(Command::CycleLoop),
        ("like", None) => Ok(Command::Like(None)),
        ("like", Some(position)) => position
            .parse::<usize>()
            .ok()
            .filter(|&position| position >= 1)
            .map(|position| Command::Like(Some(position)))
            .ok_or_else(|| format!("'{}' is not a queue position", position)),
        ("vol" | "volume", Some(level)) => {
            let level: f32 = level
                .parse()
                .map_err(|_| format!("'{}' is not a volume", level))?;
            // Values of 2 and above read as percentages; between 1 and 2 is
            // almost certainly a mistyped fraction.
            if level > 1.0 && level < 2.0 {
                return Err(format!(
                    "'{}' is ambiguous; use a 0-1 fraction or a 2-100 percentage",
                    level
                ));
            }
            let normalized = if level > 1.0 { level / 100.0 } else { level };
            if !(0.0..=1.0).contains(&normalized) {
                return Err(format!("'{}' is out of range", level));
            }
            Ok(Command::Volume(normalized))
        }
        ("seek", Some(position)) => parse_time_arg(position)
            .map(Command::Seek)
            .ok_or_else(|| format!("'{}' is not a position (use m:ss or seconds)", position)),
        ("list" | "ls", None) => Ok(Command::List),
        ("status" | "s", None) => Ok(Command::Status),
        ("quit" | "q" | "exit", None) => Ok(Command::Quit),
        _ => Err(format!("Unknown command '{}'", line.trim())),
    }
}

/// Parses `m:ss` or a bare seconds count into milliseconds.
fn parse_time_arg(text: &str) -> Option<u64> {
    match text.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.parse().ok()?;
            let seconds: u64 = seconds.parse().ok()?;
            if seconds >= 60 {
                return None;
            }
            Some((minutes * 60 + seconds) * 1_000)
        }
        None => text.parse::<u64>().ok().map(|seconds| seconds * 1_000),
    }
}

/// Formats milliseconds as `m:ss`; 0 renders as unknown.
fn format_time(ms: u64) -> String {
    if ms == 0 {
        return "--:--".to_string();
    }
    let total_seconds = ms / 1_000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

fn loop_mode_label(mode: LoopMode) -> &'static str {
    match mode {
        LoopMode::Off => "off",
        LoopMode::All => "all",
        LoopMode::One => "one",
    }
}

pub struct UiManager {
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,
    banners: BannerQueue,
    banner_display_ms: u64,
    queue: Vec<Track>,
    snapshot: Option<PlayerStateSnapshot>,
}

impl UiManager {
    pub fn new(bus_receiver: Receiver<Message>, bus_sender: Sender<Message>) -> Self {
        Self {
            bus_receiver,
            bus_sender,
            banners: BannerQueue::new(),
            banner_display_ms: Config::default().ui.banner_display_ms,
            queue: Vec::new(),
            snapshot: None,
        }
    }

    /// Blocks until the user quits or the bus closes.
    pub fn run(&mut self) {
        self.spawn_stdin_reader();
        println!("trackdeck ready. Type 'status' for state, 'quit' to exit.");
        loop {
            match self.bus_receiver.blocking_recv() {
                Ok(message) => {
                    if !self.handle_message(message) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("UiManager: bus receiver lagged, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("UiManager: bus closed, exiting");
                    break;
                }
            }
        }
    }

    /// Forwards stdin lines onto the bus so command handling happens on the
    /// UI thread, where the cached snapshot and queue live.
    fn spawn_stdin_reader(&self) {
        let bus_sender = self.bus_sender.clone();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                let quitting = line.trim() == "quit" || line.trim() == "q" || line.trim() == "exit";
                if bus_sender
                    .send(Message::Ui(UiMessage::CommandEntered(line)))
                    .is_err()
                    || quitting
                {
                    break;
                }
            }
        });
    }

    /// Returns false when the UI should shut down.
    fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::Ui(UiMessage::CommandEntered(line)) => return self.handle_command(&line),
            Message::Player(PlayerMessage::StateChanged(snapshot)) => {
                let changed_track = self
                    .snapshot
                    .as_ref()
                    .map(|previous| previous.current_track != snapshot.current_track)
                    .unwrap_or(true);
                self.snapshot = Some(snapshot);
                if changed_track {
                    self.render_status();
                }
            }
            Message::Player(PlayerMessage::QueueLoaded(tracks)) => {
                println!("Queue loaded: {} tracks", tracks.len());
                self.queue = tracks;
            }
            Message::Engine(EngineMessage::Progress {
                elapsed_ms,
                duration_ms,
                buffered_ms: _,
            }) => {
                let playing = self
                    .snapshot
                    .as_ref()
                    .map(|snapshot| snapshot.is_playing)
                    .unwrap_or(false);
                if playing {
                    println!("  {} / {}", format_time(elapsed_ms), format_time(duration_ms));
                }
            }
            Message::Notify(NotificationMessage::Banner(text)) => {
                if let Some(generation) = self.banners.push(text) {
                    self.display_current_banner(generation);
                }
            }
            Message::Notify(NotificationMessage::BannerTimeout { generation }) => {
                if let Some(next_generation) = self.banners.dismiss(generation) {
                    self.display_current_banner(next_generation);
                }
            }
            Message::Config(ConfigMessage::ConfigChanged(config)) => {
                self.banner_display_ms = config.ui.banner_display_ms;
            }
            _ => {} // Ignore other messages
        }
        true
    }

    fn handle_command(&mut self, line: &str) -> bool {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(reason) => {
                if !reason.is_empty() {
                    println!("{}", reason);
                }
                return true;
            }
        };
        match command {
            Command::Play => self.send_player(PlayerMessage::Play),
            Command::Pause => self.send_player(PlayerMessage::Pause),
            Command::TogglePlay => self.send_player(PlayerMessage::TogglePlay),
            Command::Next => self.send_player(PlayerMessage::Next { manual: true }),
            Command::Previous => self.send_player(PlayerMessage::Previous { manual: true }),
            Command::CycleLoop => self.send_player(PlayerMessage::ToggleLoopMode),
            Command::Like(position) => match self.resolve_like_target(position) {
                Some(track_id) => self.send_player(PlayerMessage::ToggleLike(track_id)),
                None => println!("No such track to like"),
            },
            Command::Volume(volume) => self.send_player(PlayerMessage::SetVolume(volume)),
            Command::Seek(position_ms) => {
                let _ = self
                    .bus_sender
                    .send(Message::Engine(EngineMessage::Seek(position_ms)));
            }
            Command::List => self.render_queue(),
            Command::Status => self.render_status(),
            Command::Quit => return false,
        }
        true
    }

    fn send_player(&self, message: PlayerMessage) {
        let _ = self.bus_sender.send(Message::Player(message));
    }

    fn resolve_like_target(&self, position: Option<usize>) -> Option<String> {
        match position {
            Some(position) => self.queue.get(position - 1).map(|track| track.id.clone()),
            None => self
                .snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.current_track.as_ref())
                .map(|track| track.id.clone()),
        }
    }

    fn display_current_banner(&self, generation: u64) {
        if let Some(text) = self.banners.displayed() {
            println!("*** {} ***", text);
        }
        let bus_sender = self.bus_sender.clone();
        let display_ms = self.banner_display_ms;
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(display_ms));
            let _ = bus_sender.send(Message::Notify(NotificationMessage::BannerTimeout {
                generation,
            }));
        });
    }

    fn render_status(&self) {
        let Some(snapshot) = &self.snapshot else {
            println!("No queue loaded");
            return;
        };
        match (&snapshot.current_track, snapshot.current_index) {
            (Some(track), Some(index)) => {
                let liked = if snapshot.liked_track_ids.contains(&track.id) {
                    " (liked)"
                } else {
                    ""
                };
                println!(
                    "[{}] {}/{} \"{}\" by {} | {} | loop: {} | vol: {:.0}%{}",
                    if snapshot.is_playing { "playing" } else { "paused" },
                    index + 1,
                    snapshot.queue_len,
                    track.title,
                    track.artist,
                    format_time(track.duration_ms),
                    loop_mode_label(snapshot.loop_mode),
                    snapshot.volume * 100.0,
                    liked,
                );
            }
            _ => println!("Queue is empty"),
        }
    }

    fn render_queue(&self) {
        if self.queue.is_empty() {
            println!("Queue is empty");
            return;
        }
        let (current_index, liked) = match &self.snapshot {
            Some(snapshot) => (snapshot.current_index, snapshot.liked_track_ids.clone()),
            None => (None, Default::default()),
        };
        for (index, track) in self.queue.iter().enumerate() {
            let marker = if Some(index) == current_index { ">" } else { " " };
            let heart = if liked.contains(&track.id) { " *" } else { "" };
            println!(
                "{} {:>3}. {} - {} ({}){}",
                marker,
                index + 1,
                track.artist,
                track.title,
                format_time(track.duration_ms),
                heart,
            );
        }
    }
}
