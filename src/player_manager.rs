//! Player-domain orchestrator.
//!
//! Single mutator of [`PlayerState`]: consumes UI intents and engine feedback
//! from the event bus, applies them synchronously, and broadcasts a full
//! state snapshot after every change. The playback engine reacts to snapshot
//! deltas and acknowledges the one-shot resync signals back through here.

use log::{debug, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Receiver, Sender};

use crate::player_state::{LikeToggle, PlayerState};
use crate::protocol::{
    ConfigMessage, EngineMessage, Message, NotificationMessage, PlayerMessage, PlayerStateSnapshot,
};

pub struct PlayerManager {
    state: PlayerState,
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
}

impl PlayerManager {
    pub fn new(bus_consumer: Receiver<Message>, bus_producer: Sender<Message>) -> Self {
        Self {
            state: PlayerState::new(Vec::new()),
            bus_consumer,
            bus_producer,
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => self.handle_message(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("PlayerManager: bus receiver lagged, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("PlayerManager: bus closed, exiting");
                    break;
                }
            }
        }
    }

    fn handle_message(&mut self, message: Message) {
        let before = self.state.snapshot();
        let mut banner: Option<LikeToggle> = None;

        match message {
            Message::Player(PlayerMessage::QueueLoaded(tracks)) => {
                debug!("PlayerManager: Queue loaded with {} tracks", tracks.len());
                let volume = self.state.volume();
                self.state = PlayerState::new(tracks);
                self.state.set_volume(volume);
            }
            Message::Player(PlayerMessage::Play) => {
                debug!("PlayerManager: Received play command");
                self.state.play();
            }
            Message::Player(PlayerMessage::Pause) => {
                debug!("PlayerManager: Received pause command");
                self.state.pause();
            }
            Message::Player(PlayerMessage::TogglePlay) => {
                debug!("PlayerManager: Received toggle play command");
                self.state.toggle_play();
            }
            Message::Player(PlayerMessage::Next { manual }) => {
                debug!("PlayerManager: Received next command (manual={})", manual);
                self.state.next(manual);
            }
            Message::Player(PlayerMessage::Previous { manual }) => {
                debug!("PlayerManager: Received previous command (manual={})", manual);
                self.state.prev(manual);
            }
            Message::Player(PlayerMessage::ToggleLoopMode) => {
                self.state.toggle_loop_mode();
                debug!("PlayerManager: Loop mode toggled to {:?}", self.state.loop_mode());
            }
            Message::Player(PlayerMessage::ToggleLike(track_id)) => {
                banner = self.state.toggle_like(&track_id);
                if banner.is_none() {
                    debug!("PlayerManager: Ignoring like toggle for unknown track {}", track_id);
                }
            }
            Message::Player(PlayerMessage::SetVolume(volume)) => {
                self.state.set_volume(volume);
            }
            Message::Player(PlayerMessage::AcknowledgeReset) => {
                self.state.clear_reset_signal();
            }
            Message::Player(PlayerMessage::AcknowledgeJump) => {
                self.state.clear_jump_signal();
            }
            Message::Engine(EngineMessage::TrackEnded(track_id)) => {
                let current_track_id = self.state.current_track().map(|track| track.id.clone());
                if current_track_id.as_deref() != Some(track_id.as_str()) {
                    debug!(
                        "PlayerManager: Ignoring stale TrackEnded for {} (current={:?})",
                        track_id, current_track_id
                    );
                    return;
                }
                debug!("PlayerManager: Track {} ended naturally", track_id);
                self.state.next(false);
            }
            Message::Config(ConfigMessage::ConfigChanged(config)) => {
                self.state.set_volume(config.playback.initial_volume);
            }
            _ => {} // Ignore other messages
        }

        if let Some(toggle) = banner {
            let message = if toggle.liked {
                format!("Added \"{}\" to liked tracks", toggle.title)
            } else {
                format!("Removed \"{}\" from liked tracks", toggle.title)
            };
            let _ = self
                .bus_producer
                .send(Message::Notify(NotificationMessage::Banner(message)));
        }

        self.broadcast_if_changed(&before);
    }

    fn broadcast_if_changed(&self, before: &PlayerStateSnapshot) {
        let after = self.state.snapshot();
        if after != *before {
            let _ = self
                .bus_producer
                .send(Message::Player(PlayerMessage::StateChanged(after)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LoopMode, Track};
    use std::path::PathBuf;
    use std::thread;
    use std::time::{Duration, Instant};
    use tokio::sync::broadcast::{self, error::TryRecvError};

    struct PlayerManagerHarness {
        bus_sender: Sender<Message>,
        receiver: Receiver<Message>,
    }

    impl PlayerManagerHarness {
        fn new() -> Self {
            let (bus_sender, _) = broadcast::channel(4096);
            let manager_bus_sender = bus_sender.clone();
            let manager_receiver = bus_sender.subscribe();

            thread::spawn(move || {
                let mut manager = PlayerManager::new(manager_receiver, manager_bus_sender);
                manager.run();
            });

            let receiver = bus_sender.subscribe();
            Self {
                bus_sender,
                receiver,
            }
        }

        fn send(&self, message: Message) {
            self.bus_sender
                .send(message)
                .expect("failed to send message to bus");
        }

        fn load_queue(&mut self, track_count: usize) -> Vec<Track> {
            let tracks: Vec<Track> = (0..track_count)
                .map(|index| Track {
                    id: format!("track-{index}"),
                    title: format!("Song {index}"),
                    artist: "Artist".to_string(),
                    album: "Album".to_string(),
                    duration_ms: 120_000,
                    artwork_ref: None,
                    source: PathBuf::from(format!("/tmp/track-{index}.mp3")),
                })
                .collect();
            self.send(Message::Player(PlayerMessage::QueueLoaded(tracks.clone())));
            self.wait_for_snapshot(|snapshot| snapshot.queue_len == track_count);
            tracks
        }

        fn wait_for_snapshot<F>(&mut self, mut predicate: F) -> PlayerStateSnapshot
        where
            F: FnMut(&PlayerStateSnapshot) -> bool,
        {
            let message = wait_for_message(&mut self.receiver, Duration::from_secs(1), |message| {
                matches!(
                    message,
                    Message::Player(PlayerMessage::StateChanged(snapshot)) if predicate(snapshot)
                )
            });
            if let Message::Player(PlayerMessage::StateChanged(snapshot)) = message {
                snapshot
            } else {
                panic!("expected StateChanged message");
            }
        }

        fn drain_messages(&mut self) {
            loop {
                match self.receiver.try_recv() {
                    Ok(_) => {}
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Closed) => break,
                }
            }
        }
    }

    fn wait_for_message<F>(
        receiver: &mut Receiver<Message>,
        timeout: Duration,
        mut predicate: F,
    ) -> Message
    where
        F: FnMut(&Message) -> bool,
    {
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                panic!("timed out waiting for expected message");
            }
            match receiver.try_recv() {
                Ok(message) => {
                    if predicate(&message) {
                        return message;
                    }
                }
                Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("bus closed while waiting for message"),
            }
        }
    }

    fn assert_no_message<F>(
        receiver: &mut Receiver<Message>,
        timeout: Duration,
        mut predicate: F,
    ) where
        F: FnMut(&Message) -> bool,
    {
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                return;
            }
            match receiver.try_recv() {
                Ok(message) => {
                    if predicate(&message) {
                        panic!("received unexpected message: {:?}", message);
                    }
                }
                Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => return,
            }
        }
    }

    #[test]
    fn test_queue_loaded_broadcasts_initial_snapshot() {
        let mut harness = PlayerManagerHarness::new();
        harness.load_queue(3);
        harness.send(Message::Player(PlayerMessage::Play));
        let snapshot = harness.wait_for_snapshot(|snapshot| snapshot.is_playing);
        assert_eq!(snapshot.current_index, Some(0));
        assert_eq!(
            snapshot.current_track.as_ref().map(|track| track.id.as_str()),
            Some("track-0")
        );
    }

    #[test]
    fn test_play_intent_on_empty_queue_broadcasts_nothing() {
        let mut harness = PlayerManagerHarness::new();
        harness.drain_messages();
        harness.send(Message::Player(PlayerMessage::Play));
        assert_no_message(&mut harness.receiver, Duration::from_millis(200), |message| {
            matches!(message, Message::Player(PlayerMessage::StateChanged(_)))
        });
    }

    #[test]
    fn test_toggle_like_emits_banner_then_snapshot_round_trip() {
        let mut harness = PlayerManagerHarness::new();
        harness.load_queue(2);

        harness.send(Message::Player(PlayerMessage::ToggleLike(
            "track-1".to_string(),
        )));
        let message = wait_for_message(&mut harness.receiver, Duration::from_secs(1), |message| {
            matches!(message, Message::Notify(NotificationMessage::Banner(_)))
        });
        if let Message::Notify(NotificationMessage::Banner(text)) = message {
            assert_eq!(text, "Added \"Song 1\" to liked tracks");
        }
        harness.wait_for_snapshot(|snapshot| snapshot.liked_track_ids.contains("track-1"));

        harness.send(Message::Player(PlayerMessage::ToggleLike(
            "track-1".to_string(),
        )));
        let message = wait_for_message(&mut harness.receiver, Duration::from_secs(1), |message| {
            matches!(message, Message::Notify(NotificationMessage::Banner(_)))
        });
        if let Message::Notify(NotificationMessage::Banner(text)) = message {
            assert_eq!(text, "Removed \"Song 1\" from liked tracks");
        }
        harness.wait_for_snapshot(|snapshot| snapshot.liked_track_ids.is_empty());
    }

    #[test]
    fn test_toggle_like_unknown_track_emits_nothing() {
        let mut harness = PlayerManagerHarness::new();
        harness.load_queue(1);
        harness.drain_messages();
        harness.send(Message::Player(PlayerMessage::ToggleLike(
            "missing".to_string(),
        )));
        assert_no_message(&mut harness.receiver, Duration::from_millis(200), |message| {
            matches!(
                message,
                Message::Notify(NotificationMessage::Banner(_))
                    | Message::Player(PlayerMessage::StateChanged(_))
            )
        });
    }

    #[test]
    fn test_track_ended_advances_queue() {
        let mut harness = PlayerManagerHarness::new();
        harness.load_queue(3);
        harness.send(Message::Player(PlayerMessage::Play));
        harness.wait_for_snapshot(|snapshot| snapshot.is_playing);

        harness.send(Message::Engine(EngineMessage::TrackEnded(
            "track-0".to_string(),
        )));
        let snapshot = harness.wait_for_snapshot(|snapshot| snapshot.current_index == Some(1));
        assert!(snapshot.is_playing);
        assert!(!snapshot.reset_to_start);
    }

    #[test]
    fn test_stale_track_ended_is_ignored() {
        let mut harness = PlayerManagerHarness::new();
        harness.load_queue(3);
        harness.drain_messages();
        harness.send(Message::Engine(EngineMessage::TrackEnded(
            "track-2".to_string(),
        )));
        assert_no_message(&mut harness.receiver, Duration::from_millis(200), |message| {
            matches!(message, Message::Player(PlayerMessage::StateChanged(_)))
        });
    }

    #[test]
    fn test_track_ended_on_last_with_loop_off_stops() {
        let mut harness = PlayerManagerHarness::new();
        harness.load_queue(2);
        harness.send(Message::Player(PlayerMessage::Play));
        harness.send(Message::Player(PlayerMessage::Next { manual: true }));
        harness.wait_for_snapshot(|snapshot| snapshot.current_index == Some(1));

        harness.send(Message::Engine(EngineMessage::TrackEnded(
            "track-1".to_string(),
        )));
        let snapshot = harness.wait_for_snapshot(|snapshot| !snapshot.is_playing);
        assert_eq!(snapshot.current_index, Some(1));
    }

    #[test]
    fn test_acknowledgments_clear_signals() {
        let mut harness = PlayerManagerHarness::new();
        harness.load_queue(2);
        harness.send(Message::Player(PlayerMessage::ToggleLoopMode)); // All
        harness.send(Message::Player(PlayerMessage::Previous { manual: true }));
        let snapshot = harness.wait_for_snapshot(|snapshot| snapshot.reset_to_start);
        assert_eq!(snapshot.current_index, Some(1));
        assert_eq!(snapshot.loop_mode, LoopMode::All);

        harness.send(Message::Player(PlayerMessage::AcknowledgeReset));
        harness.wait_for_snapshot(|snapshot| !snapshot.reset_to_start);
    }

    #[test]
    fn test_set_volume_is_clamped_in_snapshot() {
        let mut harness = PlayerManagerHarness::new();
        harness.load_queue(1);
        harness.send(Message::Player(PlayerMessage::SetVolume(3.0)));
        let snapshot = harness.wait_for_snapshot(|snapshot| snapshot.volume == 1.0);
        assert_eq!(snapshot.volume, 1.0);
    }
}
