//! Event-bus protocol shared by all runtime components.
//!
//! This module defines all message payloads exchanged between the player
//! state machine, the playback engine, the decoder, and the console front.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::Config;

/// Loop policy applied when navigating beyond the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum LoopMode {
    Off, // Stop after reaching the end of the queue
    All, // Repeat the queue from the beginning
    One, // Repeat the current track
}

impl LoopMode {
    /// Cycle order used by the loop toggle: Off -> All -> One -> Off.
    pub fn cycled(self) -> LoopMode {
        match self {
            LoopMode::Off => LoopMode::All,
            LoopMode::All => LoopMode::One,
            LoopMode::One => LoopMode::Off,
        }
    }
}

/// One playable queue entry produced by the metadata loader.
///
/// The core treats everything but `id`, `title`, and `duration_ms` as opaque
/// display/engine payload. `duration_ms == 0` means the duration is unknown
/// and will be resolved by the engine once the track is decoded.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Track {
    /// Stable track id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Display artist.
    pub artist: String,
    /// Display album.
    pub album: String,
    /// Duration in milliseconds, 0 when unknown.
    pub duration_ms: u64,
    /// Opaque artwork reference (MIME type of the embedded front cover).
    pub artwork_ref: Option<String>,
    /// Playable source on disk.
    pub source: PathBuf,
}

/// Full player state published after every mutation.
///
/// This is the synchronization surface between the state machine and the
/// playback engine: the engine reacts to deltas between consecutive
/// snapshots, never to individual intents.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStateSnapshot {
    pub current_track: Option<Track>,
    pub current_index: Option<usize>,
    pub queue_len: usize,
    pub is_playing: bool,
    pub loop_mode: LoopMode,
    pub volume: f32,
    pub liked_track_ids: BTreeSet<String>,
    /// One-shot: reposition playback to time 0 and treat as a fresh start.
    pub reset_to_start: bool,
    /// One-shot: reposition playback to the end of the current track.
    pub jump_to_end: bool,
}

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Player(PlayerMessage),
    Engine(EngineMessage),
    Audio(AudioMessage),
    Notify(NotificationMessage),
    Config(ConfigMessage),
    Ui(UiMessage),
}

/// Console input events.
#[derive(Debug, Clone)]
pub enum UiMessage {
    /// One raw line read from stdin, parsed on the UI thread.
    CommandEntered(String),
}

/// Player-domain intents, acknowledgments, and state notifications.
#[derive(Debug, Clone)]
pub enum PlayerMessage {
    /// Queue supplied once per session by the metadata loader.
    QueueLoaded(Vec<Track>),
    Play,
    Pause,
    TogglePlay,
    Next { manual: bool },
    Previous { manual: bool },
    ToggleLoopMode,
    ToggleLike(String),
    SetVolume(f32),
    /// Adapter acted on `reset_to_start`; clear the signal.
    AcknowledgeReset,
    /// Adapter acted on `jump_to_end`; clear the signal.
    AcknowledgeJump,
    StateChanged(PlayerStateSnapshot),
}

/// Engine-domain commands and feedback.
#[derive(Debug, Clone)]
pub enum EngineMessage {
    /// Committed seek from the UI, in milliseconds. Forwarded straight to the
    /// engine; never mutates player state.
    Seek(u64),
    /// Natural end-of-track reported by the output stream.
    TrackEnded(String),
    /// Elapsed/duration/buffered report for the display surface.
    Progress {
        elapsed_ms: u64,
        duration_ms: u64,
        buffered_ms: u64,
    },
}

/// Decode request issued by the engine.
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    /// Stable track id; packets from a superseded request are dropped by id.
    pub track_id: String,
    /// File path on disk.
    pub source: PathBuf,
    /// Decode start position in milliseconds.
    pub start_ms: u64,
}

/// Audio payload delivered from decoder to engine.
#[derive(Debug, Clone)]
pub enum AudioPacket {
    TrackHeader {
        track_id: String,
        sample_rate_hz: u32,
        channel_count: u16,
        /// Duration resolved from the container, 0 when unknown.
        duration_ms: u64,
    },
    Samples {
        track_id: String,
        samples: Vec<f32>,
    },
    TrackFooter {
        track_id: String,
    },
}

/// Audio-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum AudioMessage {
    DecodeTrack(DecodeRequest),
    StopDecoding,
    Packet(AudioPacket),
}

/// User-feedback banners with single-slot display.
#[derive(Debug, Clone)]
pub enum NotificationMessage {
    /// One banner message to enqueue on the display surface.
    Banner(String),
    /// Display timeout for the banner promoted under this generation.
    BannerTimeout { generation: u64 },
}

/// Runtime configuration updates.
#[derive(Debug, Clone)]
pub enum ConfigMessage {
    ConfigChanged(Config),
}
