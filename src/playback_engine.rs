//! Playback engine adapter.
//!
//! Observes player state snapshots and drives the physical output: loads a
//! new source on track change, plays/pauses the CPAL stream, services the
//! one-shot resync signals (seek to 0 / seek to end) and acknowledges them,
//! applies volume, and reports progress and natural end-of-track upward.
//!
//! The snapshot-delta rules live in [`actions_for_snapshot`], a pure function
//! kept free of any audio device so the synchronization contract is testable.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error, warn};
use rubato::{FftFixedIn, Resampler};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Receiver, Sender};

use crate::protocol::{
    AudioMessage, AudioPacket, ConfigMessage, DecodeRequest, EngineMessage, Message,
    PlayerMessage, PlayerStateSnapshot, Track,
};

/// Input frames fed to the resampler per conversion step.
const RESAMPLE_CHUNK_FRAMES: usize = 1_024;

/// One engine-side reaction derived from a snapshot delta.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    /// Current track identity changed: decode from 0, reset observed
    /// time/duration/buffered, then play or stay paused.
    LoadTrack {
        track: Track,
        play_immediately: bool,
    },
    Play,
    Pause,
    /// Service `reset_to_start`: seek to 0, resuming when playback is active.
    SeekToStart { resume: bool },
    /// Service `jump_to_end`: position at the track's end once true duration
    /// is known, then acknowledge.
    SeekToEnd,
    SetVolume(f32),
    /// `reset_to_start` has been serviced (or was satisfied by a fresh load).
    AcknowledgeReset,
    /// No current track remains: silence the output and drop buffered audio.
    Stop,
}

/// Derives the engine reactions for one snapshot transition.
///
/// `prev` is the last snapshot the engine acted on, `None` on first
/// observation. Action order matters: load/transport first, signal servicing
/// second, volume last.
pub fn actions_for_snapshot(
    prev: Option<&PlayerStateSnapshot>,
    next: &PlayerStateSnapshot,
) -> Vec<EngineAction> {
    let mut actions = Vec::new();

    let prev_track_id = prev
        .and_then(|snapshot| snapshot.current_track.as_ref())
        .map(|track| track.id.as_str());
    let next_track_id = next.current_track.as_ref().map(|track| track.id.as_str());
    let track_changed = prev_track_id != next_track_id;

    if track_changed {
        match &next.current_track {
            Some(track) => actions.push(EngineAction::LoadTrack {
                track: track.clone(),
                play_immediately: next.is_playing,
            }),
            None => actions.push(EngineAction::Stop),
        }
    } else {
        let prev_playing = prev.map(|snapshot| snapshot.is_playing).unwrap_or(false);
        if next.is_playing != prev_playing {
            actions.push(if next.is_playing {
                EngineAction::Play
            } else {
                EngineAction::Pause
            });
        }
    }

    if next.reset_to_start {
        if !track_changed && next.current_track.is_some() {
            // A fresh load already starts at 0; only a same-track reset
            // needs an explicit seek.
            actions.push(EngineAction::SeekToStart {
                resume: next.is_playing,
            });
        }
        actions.push(EngineAction::AcknowledgeReset);
    }
    if next.jump_to_end && next.current_track.is_some() {
        actions.push(EngineAction::SeekToEnd);
    }

    if prev.map(|snapshot| snapshot.volume) != Some(next.volume) {
        actions.push(EngineAction::SetVolume(next.volume));
    }

    actions
}

/// Entries consumed by the audio callback.
enum QueueEntry {
    /// Interleaved samples at the output rate/channel count, with a read
    /// cursor so partially consumed blocks stay at the queue front.
    Samples { samples: Vec<f32>, cursor: usize },
    /// Footer marker: emitting `TrackEnded` exactly once happens here.
    EndOfTrack(String),
}

/// Counters shared between the engine thread, the audio callback, and the
/// progress reporter.
struct ProgressShared {
    frames_played: AtomicU64,
    frames_buffered: AtomicU64,
    base_ms: AtomicU64,
    duration_ms: AtomicU64,
    output_rate_hz: AtomicU64,
    interval_ms: AtomicU64,
}

impl ProgressShared {
    fn new() -> Self {
        Self {
            frames_played: AtomicU64::new(0),
            frames_buffered: AtomicU64::new(0),
            base_ms: AtomicU64::new(0),
            duration_ms: AtomicU64::new(0),
            output_rate_hz: AtomicU64::new(0),
            interval_ms: AtomicU64::new(500),
        }
    }

    fn frames_to_ms(&self, frames: u64) -> u64 {
        let rate = self.output_rate_hz.load(Ordering::Relaxed);
        if rate == 0 {
            0
        } else {
            frames * 1_000 / rate
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.base_ms.load(Ordering::Relaxed)
            + self.frames_to_ms(self.frames_played.load(Ordering::Relaxed))
    }

    fn buffered_ms(&self) -> u64 {
        self.base_ms.load(Ordering::Relaxed)
            + self.frames_to_ms(self.frames_buffered.load(Ordering::Relaxed))
    }

    fn reset_position(&self, base_ms: u64) {
        self.base_ms.store(base_ms, Ordering::Relaxed);
        self.frames_played.store(0, Ordering::Relaxed);
        self.frames_buffered.store(0, Ordering::Relaxed);
    }
}

/// Runtime playback adapter and output stream owner.
pub struct PlaybackEngine {
    bus_receiver: Receiver<Message>,
    bus_sender: Sender<Message>,

    last_snapshot: Option<PlayerStateSnapshot>,
    expected_track: Option<(String, PathBuf)>,
    pending_jump: bool,
    // Set after servicing jump-to-end: no buffered audio and no decode in
    // flight, so a plain play must restart the track from 0.
    at_track_end: bool,

    // Output preferences from config
    requested_device_name: String,
    requested_sample_rate_hz: u32,
    requested_channel_count: u16,

    // Decode-side format of the current track
    source_rate_hz: u32,
    source_channel_count: u16,
    resampler: Option<FftFixedIn<f32>>,
    resampler_input: Vec<Vec<f32>>,

    // Shared with the audio callback
    sample_queue: Arc<Mutex<VecDeque<QueueEntry>>>,
    is_playing: Arc<AtomicBool>,
    volume_bits: Arc<AtomicU32>,
    progress: Arc<ProgressShared>,

    // Audio stream
    device: Option<cpal::Device>,
    stream_config: Option<cpal::StreamConfig>,
    stream: Option<cpal::Stream>,
    output_rate_hz: u32,
    output_channel_count: u16,
}

impl PlaybackEngine {
    pub fn new(bus_receiver: Receiver<Message>, bus_sender: Sender<Message>) -> Self {
        Self {
            bus_receiver,
            bus_sender,
            last_snapshot: None,
            expected_track: None,
            pending_jump: false,
            at_track_end: false,
            requested_device_name: String::new(),
            requested_sample_rate_hz: 48_000,
            requested_channel_count: 2,
            source_rate_hz: 0,
            source_channel_count: 0,
            resampler: None,
            resampler_input: Vec::new(),
            sample_queue: Arc::new(Mutex::new(VecDeque::new())),
            is_playing: Arc::new(AtomicBool::new(false)),
            volume_bits: Arc::new(AtomicU32::new(0.5f32.to_bits())),
            progress: Arc::new(ProgressShared::new()),
            device: None,
            stream_config: None,
            stream: None,
            output_rate_hz: 0,
            output_channel_count: 0,
        }
    }

    pub fn run(&mut self) {
        self.spawn_progress_reporter();
        loop {
            match self.bus_receiver.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("PlaybackEngine: bus receiver lagged, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("PlaybackEngine: bus closed, exiting");
                    break;
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Player(PlayerMessage::StateChanged(snapshot)) => {
                self.apply_snapshot(snapshot);
            }
            Message::Engine(EngineMessage::Seek(position_ms)) => {
                let resume = self
                    .last_snapshot
                    .as_ref()
                    .map(|snapshot| snapshot.is_playing)
                    .unwrap_or(false);
                self.seek_to(position_ms, resume);
            }
            Message::Audio(AudioMessage::Packet(packet)) => self.handle_packet(packet),
            Message::Config(ConfigMessage::ConfigChanged(config)) => {
                self.requested_device_name = config.output.output_device_name.clone();
                self.requested_sample_rate_hz = config.output.sample_rate_hz;
                self.requested_channel_count = config.output.channel_count;
                self.progress
                    .interval_ms
                    .store(config.ui.progress_interval_ms, Ordering::Relaxed);
            }
            _ => {} // Ignore other messages
        }
    }

    fn apply_snapshot(&mut self, snapshot: PlayerStateSnapshot) {
        let actions = actions_for_snapshot(self.last_snapshot.as_ref(), &snapshot);
        self.last_snapshot = Some(snapshot);
        for action in actions {
            self.perform(action);
        }
    }

    fn perform(&mut self, action: EngineAction) {
        match action {
            EngineAction::LoadTrack {
                track,
                play_immediately,
            } => {
                debug!("PlaybackEngine: Loading track {}", track.id);
                self.expected_track = Some((track.id.clone(), track.source.clone()));
                self.clear_buffered_audio();
                self.at_track_end = false;
                self.progress.reset_position(0);
                self.progress
                    .duration_ms
                    .store(track.duration_ms, Ordering::Relaxed);
                let _ = self
                    .bus_sender
                    .send(Message::Audio(AudioMessage::DecodeTrack(DecodeRequest {
                        track_id: track.id,
                        source: track.source,
                        start_ms: 0,
                    })));
                if play_immediately {
                    self.start_playback();
                } else {
                    self.is_playing.store(false, Ordering::Relaxed);
                }
            }
            EngineAction::Play => {
                if self.at_track_end {
                    // Playing a track positioned at its end restarts it.
                    self.seek_to(0, true);
                } else {
                    self.start_playback();
                }
            }
            EngineAction::Pause => {
                self.is_playing.store(false, Ordering::Relaxed);
                if let Some(stream) = &self.stream {
                    if let Err(e) = stream.pause() {
                        error!("PlaybackEngine: Failed to pause stream: {}", e);
                    }
                }
            }
            EngineAction::SeekToStart { resume } => {
                self.seek_to(0, resume);
            }
            EngineAction::SeekToEnd => {
                let duration_ms = self.progress.duration_ms.load(Ordering::Relaxed);
                if duration_ms > 0 {
                    self.position_at_end(duration_ms);
                } else {
                    // True duration not resolved yet; serviced when the
                    // decoder reports it.
                    debug!("PlaybackEngine: Deferring jump-to-end until duration is known");
                    self.pending_jump = true;
                }
            }
            EngineAction::SetVolume(volume) => {
                self.volume_bits.store(volume.to_bits(), Ordering::Relaxed);
            }
            EngineAction::AcknowledgeReset => {
                let _ = self
                    .bus_sender
                    .send(Message::Player(PlayerMessage::AcknowledgeReset));
            }
            EngineAction::Stop => {
                self.is_playing.store(false, Ordering::Relaxed);
                self.expected_track = None;
                self.at_track_end = false;
                self.clear_buffered_audio();
                self.progress.reset_position(0);
                self.progress.duration_ms.store(0, Ordering::Relaxed);
                let _ = self.bus_sender.send(Message::Audio(AudioMessage::StopDecoding));
            }
        }
    }

    /// Positions playback at the end of the current track without decoding.
    fn position_at_end(&mut self, duration_ms: u64) {
        self.clear_buffered_audio();
        self.progress.reset_position(duration_ms);
        self.pending_jump = false;
        self.at_track_end = true;
        let _ = self.bus_sender.send(Message::Audio(AudioMessage::StopDecoding));
        let _ = self
            .bus_sender
            .send(Message::Player(PlayerMessage::AcknowledgeJump));
    }

    fn seek_to(&mut self, position_ms: u64, resume: bool) {
        let Some((track_id, source)) = self.expected_track.clone() else {
            debug!("PlaybackEngine: Ignoring seek with no current track");
            return;
        };
        let duration_ms = self.progress.duration_ms.load(Ordering::Relaxed);
        let target_ms = if duration_ms > 0 {
            position_ms.min(duration_ms)
        } else {
            position_ms
        };
        debug!("PlaybackEngine: Seeking {} to {}ms", track_id, target_ms);
        self.clear_buffered_audio();
        self.at_track_end = false;
        self.progress.reset_position(target_ms);
        let _ = self
            .bus_sender
            .send(Message::Audio(AudioMessage::DecodeTrack(DecodeRequest {
                track_id,
                source,
                start_ms: target_ms,
            })));
        if resume {
            self.start_playback();
        } else {
            self.is_playing.store(false, Ordering::Relaxed);
        }
    }

    fn clear_buffered_audio(&mut self) {
        self.sample_queue.lock().unwrap().clear();
        self.resampler = None;
        self.resampler_input.clear();
        self.source_rate_hz = 0;
        self.source_channel_count = 0;
    }

    /// Starts the output stream. Start failures (e.g. the platform refusing
    /// playback) are logged and swallowed; player state keeps its
    /// optimistic `is_playing` and the engine stays paused until the next
    /// user-initiated play.
    fn start_playback(&mut self) {
        self.ensure_stream();
        match &self.stream {
            Some(stream) => {
                if let Err(e) = stream.play() {
                    error!("PlaybackEngine: Playback blocked: {}", e);
                    return;
                }
                self.is_playing.store(true, Ordering::Relaxed);
            }
            None => debug!("PlaybackEngine: No audio stream available to play"),
        }
    }

    fn ensure_stream(&mut self) {
        if self.device.is_none() {
            self.setup_audio_device();
        }
        if self.stream.is_none() {
            self.create_stream();
        }
    }

    fn setup_audio_device(&mut self) {
        let host = cpal::default_host();
        let device = if self.requested_device_name.trim().is_empty() {
            host.default_output_device()
        } else {
            let requested = self.requested_device_name.trim();
            match host.output_devices() {
                Ok(mut devices) => devices
                    .find(|device| {
                        device
                            .name()
                            .map(|name| name == requested)
                            .unwrap_or(false)
                    })
                    .or_else(|| {
                        warn!(
                            "PlaybackEngine: Output device '{}' not found, using default",
                            requested
                        );
                        host.default_output_device()
                    }),
                Err(e) => {
                    error!("Error enumerating output devices: {}", e);
                    host.default_output_device()
                }
            }
        };
        let device = match device {
            Some(device) => device,
            None => {
                error!("No output device available");
                return;
            }
        };

        let sample_rate = self.requested_sample_rate_hz;
        let channels = self.requested_channel_count;
        let config = match device.supported_output_configs() {
            Ok(mut configs) => {
                match configs.find(|config| {
                    config.channels() == channels
                        && config.min_sample_rate().0 <= sample_rate
                        && config.max_sample_rate().0 >= sample_rate
                        && config.sample_format() == cpal::SampleFormat::F32
                }) {
                    Some(config) => config.with_sample_rate(cpal::SampleRate(sample_rate)),
                    None => {
                        error!("No matching device config found");
                        return;
                    }
                }
            }
            Err(e) => {
                error!("Error getting device configs: {}", e);
                return;
            }
        };

        self.output_channel_count = config.channels();
        self.output_rate_hz = config.sample_rate().0;
        self.progress
            .output_rate_hz
            .store(u64::from(self.output_rate_hz), Ordering::Relaxed);
        self.stream_config = Some(config.into());
        self.device = Some(device);
        debug!(
            "PlaybackEngine: Audio device initialized at {}Hz, {} channels",
            self.output_rate_hz, self.output_channel_count
        );
    }

    fn create_stream(&mut self) {
        let device = match &self.device {
            Some(device) => device,
            None => {
                error!("Cannot create stream: no audio device initialized");
                return;
            }
        };
        let config = match &self.stream_config {
            Some(config) => config,
            None => {
                error!("Cannot create stream: no stream config set");
                return;
            }
        };

        // Clone our handles for the audio callback
        let sample_queue = self.sample_queue.clone();
        let bus_sender = self.bus_sender.clone();
        let is_playing = self.is_playing.clone();
        let volume_bits = self.volume_bits.clone();
        let progress = Arc::clone(&self.progress);
        let channel_count = usize::from(self.output_channel_count.max(1));

        match device.build_output_stream(
            config,
            move |output_buffer: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !is_playing.load(Ordering::Relaxed) {
                    output_buffer.fill(0.0);
                    return;
                }
                let volume = f32::from_bits(volume_bits.load(Ordering::Relaxed));
                let mut queue = sample_queue.lock().unwrap();
                let mut written = 0usize;
                for slot in output_buffer.iter_mut() {
                    *slot = loop {
                        match queue.front_mut() {
                            Some(QueueEntry::Samples { samples, cursor }) => {
                                if *cursor < samples.len() {
                                    let sample = samples[*cursor] * volume;
                                    *cursor += 1;
                                    written += 1;
                                    break sample;
                                }
                                queue.pop_front();
                            }
                            Some(QueueEntry::EndOfTrack(track_id)) => {
                                let _ = bus_sender.send(Message::Engine(
                                    EngineMessage::TrackEnded(track_id.clone()),
                                ));
                                queue.pop_front();
                            }
                            None => break 0.0,
                        }
                    };
                }
                progress
                    .frames_played
                    .fetch_add((written / channel_count) as u64, Ordering::Relaxed);
            },
            |err| error!("Audio stream error: {}", err),
            None,
        ) {
            Ok(stream) => {
                self.stream = Some(stream);
                debug!("Audio stream created");
            }
            Err(e) => error!("Failed to build audio stream: {}", e),
        }
    }

    fn handle_packet(&mut self, packet: AudioPacket) {
        let expected_id = self.expected_track.as_ref().map(|(id, _)| id.clone());
        match packet {
            AudioPacket::TrackHeader {
                track_id,
                sample_rate_hz,
                channel_count,
                duration_ms,
            } => {
                if expected_id.as_deref() != Some(track_id.as_str()) {
                    debug!("PlaybackEngine: Dropping stale header for {}", track_id);
                    return;
                }
                self.source_rate_hz = sample_rate_hz;
                self.source_channel_count = channel_count.max(1);
                if duration_ms > 0 {
                    self.progress.duration_ms.store(duration_ms, Ordering::Relaxed);
                }
                self.ensure_stream();
                if self.output_rate_hz != 0 && self.output_rate_hz != sample_rate_hz {
                    match FftFixedIn::<f32>::new(
                        sample_rate_hz as usize,
                        self.output_rate_hz as usize,
                        RESAMPLE_CHUNK_FRAMES,
                        2,
                        usize::from(self.source_channel_count),
                    ) {
                        Ok(resampler) => self.resampler = Some(resampler),
                        Err(e) => {
                            error!("Failed to create resampler: {}", e);
                            self.resampler = None;
                        }
                    }
                }
                self.resampler_input =
                    vec![Vec::new(); usize::from(self.source_channel_count)];
                let known_duration = self.progress.duration_ms.load(Ordering::Relaxed);
                if self.pending_jump && known_duration > 0 {
                    self.position_at_end(known_duration);
                }
            }
            AudioPacket::Samples { track_id, samples } => {
                if expected_id.as_deref() != Some(track_id.as_str()) {
                    return;
                }
                let converted = self.convert_samples(&samples, false);
                if !converted.is_empty() {
                    let frames =
                        converted.len() as u64 / u64::from(self.output_channel_count.max(1));
                    self.progress
                        .frames_buffered
                        .fetch_add(frames, Ordering::Relaxed);
                    self.sample_queue.lock().unwrap().push_back(QueueEntry::Samples {
                        samples: converted,
                        cursor: 0,
                    });
                }
            }
            AudioPacket::TrackFooter { track_id } => {
                if expected_id.as_deref() != Some(track_id.as_str()) {
                    return;
                }
                let tail = self.convert_samples(&[], true);
                if !tail.is_empty() {
                    let frames =
                        tail.len() as u64 / u64::from(self.output_channel_count.max(1));
                    self.progress
                        .frames_buffered
                        .fetch_add(frames, Ordering::Relaxed);
                    self.sample_queue.lock().unwrap().push_back(QueueEntry::Samples {
                        samples: tail,
                        cursor: 0,
                    });
                }
                if self.progress.duration_ms.load(Ordering::Relaxed) == 0 {
                    // The container did not report a duration; the decoded
                    // length is the truth now.
                    let resolved = self.progress.buffered_ms();
                    self.progress.duration_ms.store(resolved, Ordering::Relaxed);
                }
                if self.pending_jump {
                    let duration_ms = self.progress.duration_ms.load(Ordering::Relaxed);
                    self.position_at_end(duration_ms);
                    return;
                }
                self.sample_queue
                    .lock()
                    .unwrap()
                    .push_back(QueueEntry::EndOfTrack(track_id));
            }
        }
    }

    /// Converts interleaved source samples to the output rate and channel
    /// count. With `flush` set, pads the resampler's pending input with
    /// silence and drains it.
    fn convert_samples(&mut self, samples: &[f32], flush: bool) -> Vec<f32> {
        let source_channels = usize::from(self.source_channel_count.max(1));
        let output_channels = usize::from(self.output_channel_count.max(1));

        if self.resampler.is_none() {
            return map_channels(samples, source_channels, output_channels);
        }

        // Deinterleave into the per-channel staging buffers.
        for frame in samples.chunks_exact(source_channels) {
            for (channel, &sample) in frame.iter().enumerate() {
                self.resampler_input[channel].push(sample);
            }
        }
        if flush && !self.resampler_input[0].is_empty() {
            let pad = RESAMPLE_CHUNK_FRAMES - (self.resampler_input[0].len() % RESAMPLE_CHUNK_FRAMES);
            if pad != RESAMPLE_CHUNK_FRAMES {
                for channel in self.resampler_input.iter_mut() {
                    channel.extend(std::iter::repeat(0.0).take(pad));
                }
            }
        }

        let mut output = Vec::new();
        while self.resampler_input[0].len() >= RESAMPLE_CHUNK_FRAMES {
            let chunk: Vec<Vec<f32>> = self
                .resampler_input
                .iter_mut()
                .map(|channel| channel.drain(..RESAMPLE_CHUNK_FRAMES).collect())
                .collect();
            let resampler = self.resampler.as_mut().unwrap();
            match resampler.process(&chunk, None) {
                Ok(resampled) => {
                    output.extend(interleave_channels(&resampled, output_channels));
                }
                Err(e) => {
                    error!("Resampling failed: {}", e);
                    break;
                }
            }
        }
        output
    }

    fn spawn_progress_reporter(&self) {
        let bus_sender = self.bus_sender.clone();
        let progress = Arc::clone(&self.progress);
        thread::spawn(move || loop {
            let interval = progress.interval_ms.load(Ordering::Relaxed).max(100);
            thread::sleep(Duration::from_millis(interval));
            let duration_ms = progress.duration_ms.load(Ordering::Relaxed);
            let elapsed_ms = if duration_ms > 0 {
                progress.elapsed_ms().min(duration_ms)
            } else {
                progress.elapsed_ms()
            };
            let send_result = bus_sender.send(Message::Engine(EngineMessage::Progress {
                elapsed_ms,
                duration_ms,
                buffered_ms: progress.buffered_ms(),
            }));
            if send_result.is_err() {
                break;
            }
        });
    }
}

/// Remaps interleaved frames between channel counts: missing output channels
/// repeat the last source channel, extra source channels are dropped.
fn map_channels(samples: &[f32], source_channels: usize, output_channels: usize) -> Vec<f32> {
    if source_channels == output_channels {
        return samples.to_vec();
    }
    let mut output = Vec::with_capacity(samples.len() / source_channels * output_channels);
    for frame in samples.chunks_exact(source_channels) {
        for channel in 0..output_channels {
            output.push(frame[channel.min(source_channels - 1)]);
        }
    }
    output
}

/// Interleaves per-channel sample buffers into output frames using the same
/// channel mapping as [`map_channels`].
fn interleave_channels(channels: &[Vec<f32>], output_channels: usize) -> Vec<f32> {
    if channels.is_empty() {
        return Vec::new();
    }
    let frames = channels[0].len();
    let mut output = Vec::with_capacity(frames * output_channels);
    for frame in 0..frames {
        for channel in 0..output_channels {
            output.push(channels[channel.min(channels.len() - 1)][frame]);
        }
    }
    output
}
