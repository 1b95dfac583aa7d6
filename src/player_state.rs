//! Pure player state machine.
//!
//! Owns queue position, the play/pause flag, the loop policy, the liked-set,
//! and the two one-shot resync signals consumed by the playback engine. All
//! operations are synchronous total functions: illegal or boundary input is a
//! defined no-op, never an error.

use std::collections::BTreeSet;

use crate::protocol::{LoopMode, PlayerStateSnapshot, Track};

/// Outcome of a like toggle, used to build the banner message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeToggle {
    /// Display title of the toggled track.
    pub title: String,
    /// Membership after the toggle.
    pub liked: bool,
}

/// Mutable core entity. Created once per queue, mutated only through the
/// methods below, discarded when the queue is replaced.
pub struct PlayerState {
    queue: Vec<Track>,
    current_index: usize,
    is_playing: bool,
    loop_mode: LoopMode,
    volume: f32,
    liked_track_ids: BTreeSet<String>,
    reset_to_start: bool,
    jump_to_end: bool,
}

impl PlayerState {
    pub fn new(queue: Vec<Track>) -> PlayerState {
        PlayerState {
            queue,
            current_index: 0,
            is_playing: false,
            loop_mode: LoopMode::Off,
            volume: 0.5,
            liked_track_ids: BTreeSet::new(),
            reset_to_start: false,
            jump_to_end: false,
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.queue.get(self.current_index)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn reset_to_start(&self) -> bool {
        self.reset_to_start
    }

    pub fn jump_to_end(&self) -> bool {
        self.jump_to_end
    }

    pub fn play(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        self.is_playing = true;
    }

    pub fn pause(&mut self) {
        self.is_playing = false;
    }

    pub fn toggle_play(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        self.is_playing = !self.is_playing;
    }

    pub fn toggle_loop_mode(&mut self) {
        self.loop_mode = self.loop_mode.cycled();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Flips liked membership for a track in the queue. Unknown ids are a
    /// no-op and yield no banner.
    pub fn toggle_like(&mut self, track_id: &str) -> Option<LikeToggle> {
        let track = self.queue.iter().find(|track| track.id == track_id)?;
        let title = track.title.clone();
        let liked = if self.liked_track_ids.remove(track_id) {
            false
        } else {
            self.liked_track_ids.insert(track_id.to_string());
            true
        };
        Some(LikeToggle { title, liked })
    }

    pub fn is_liked(&self, track_id: &str) -> bool {
        self.liked_track_ids.contains(track_id)
    }

    /// Advance to the next track.
    ///
    /// `manual` distinguishes a user-initiated skip from the engine reporting
    /// natural end-of-track; the two follow different boundary policies.
    pub fn next(&mut self, manual: bool) {
        if self.queue.is_empty() {
            return;
        }
        let last = self.queue.len() - 1;

        if !manual {
            match self.loop_mode {
                LoopMode::One => {
                    // Replay the same track from 0.
                    self.raise_reset_signal();
                }
                LoopMode::All => {
                    self.current_index = (self.current_index + 1) % self.queue.len();
                    self.raise_reset_signal();
                }
                LoopMode::Off => {
                    if self.current_index == last {
                        // Queue exhausted, stay on the last track.
                        self.is_playing = false;
                    } else {
                        // No explicit reset signal: a track change already
                        // implies starting fresh.
                        self.current_index += 1;
                    }
                }
            }
            return;
        }

        let was_loop_one = self.loop_mode == LoopMode::One;
        if self.current_index == last {
            if self.loop_mode == LoopMode::Off {
                // Snap to the end of the last track without restarting it.
                self.is_playing = false;
                self.raise_jump_signal();
            } else {
                let wrapped = (self.current_index + 1) % self.queue.len();
                self.raise_reset_signal();
                if wrapped == self.current_index && was_loop_one {
                    // Single-track queue under One: the skip would otherwise
                    // be unobservable.
                    self.is_playing = true;
                }
                self.current_index = wrapped;
            }
        } else {
            self.current_index += 1;
        }
        if was_loop_one {
            // Manual navigation implies the user no longer wants
            // single-track repeat.
            self.loop_mode = LoopMode::All;
        }
    }

    /// Retreat to the previous track. See [`PlayerState::next`] for the
    /// meaning of `manual`.
    pub fn prev(&mut self, manual: bool) {
        if self.queue.is_empty() {
            return;
        }
        let len = self.queue.len();

        if !manual {
            match self.loop_mode {
                LoopMode::One => {}
                LoopMode::All => {
                    self.current_index = (self.current_index + len - 1) % len;
                }
                LoopMode::Off => {
                    if self.current_index == 0 {
                        self.is_playing = false;
                    } else {
                        self.current_index -= 1;
                    }
                }
            }
            return;
        }

        let was_loop_one = self.loop_mode == LoopMode::One;
        if self.current_index == 0 {
            if self.loop_mode == LoopMode::Off {
                // Restart the first track from 0, index unchanged.
                self.raise_reset_signal();
            } else {
                let wrapped = len - 1;
                self.raise_reset_signal();
                if wrapped == self.current_index && was_loop_one {
                    self.is_playing = true;
                }
                self.current_index = wrapped;
            }
        } else {
            self.current_index -= 1;
        }
        if was_loop_one {
            self.loop_mode = LoopMode::All;
        }
    }

    /// Idempotent acknowledgment of the reset signal.
    pub fn clear_reset_signal(&mut self) {
        self.reset_to_start = false;
    }

    /// Idempotent acknowledgment of the jump signal.
    pub fn clear_jump_signal(&mut self) {
        self.jump_to_end = false;
    }

    // Raising one signal clears the other: at most one resync action may be
    // pending at a time.
    fn raise_reset_signal(&mut self) {
        self.reset_to_start = true;
        self.jump_to_end = false;
    }

    fn raise_jump_signal(&mut self) {
        self.jump_to_end = true;
        self.reset_to_start = false;
    }

    pub fn snapshot(&self) -> PlayerStateSnapshot {
        PlayerStateSnapshot {
            current_track: self.current_track().cloned(),
            current_index: if self.queue.is_empty() {
                None
            } else {
                Some(self.current_index)
            },
            queue_len: self.queue.len(),
            is_playing: self.is_playing,
            loop_mode: self.loop_mode,
            volume: self.volume,
            liked_track_ids: self.liked_track_ids.clone(),
            reset_to_start: self.reset_to_start,
            jump_to_end: self.jump_to_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Title {}", id),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration_ms: 180_000,
            artwork_ref: None,
            source: PathBuf::from(format!("/tmp/{}.mp3", id)),
        }
    }

    fn state_with(n: usize) -> PlayerState {
        PlayerState::new((0..n).map(|i| track(&i.to_string())).collect())
    }

    fn at_index(mut state: PlayerState, index: usize) -> PlayerState {
        for _ in 0..index {
            state.next(true);
        }
        state.clear_reset_signal();
        state.clear_jump_signal();
        state
    }

    fn assert_signal_invariant(state: &PlayerState) {
        assert!(
            !(state.reset_to_start() && state.jump_to_end()),
            "reset_to_start and jump_to_end must never both be raised"
        );
    }

    #[test]
    fn test_play_pause_toggle() {
        let mut state = state_with(2);
        assert!(!state.is_playing());
        state.play();
        assert!(state.is_playing());
        state.pause();
        assert!(!state.is_playing());
        state.toggle_play();
        assert!(state.is_playing());
    }

    #[test]
    fn test_empty_queue_operations_are_noops() {
        let mut state = state_with(0);
        state.play();
        state.toggle_play();
        state.next(true);
        state.next(false);
        state.prev(true);
        state.prev(false);
        assert!(!state.is_playing());
        assert!(state.current_track().is_none());
        assert!(state.snapshot().current_index.is_none());
        assert!(!state.reset_to_start());
        assert!(!state.jump_to_end());
    }

    #[test]
    fn test_loop_mode_cycles() {
        let mut state = state_with(2);
        assert_eq!(state.loop_mode(), LoopMode::Off);
        state.toggle_loop_mode();
        assert_eq!(state.loop_mode(), LoopMode::All);
        state.toggle_loop_mode();
        assert_eq!(state.loop_mode(), LoopMode::One);
        state.toggle_loop_mode();
        assert_eq!(state.loop_mode(), LoopMode::Off);
    }

    #[test]
    fn test_automatic_next_loop_one_replays_current() {
        let mut state = at_index(state_with(3), 1);
        state.play();
        state.toggle_loop_mode();
        state.toggle_loop_mode(); // One
        state.next(false);
        assert_eq!(state.snapshot().current_index, Some(1));
        assert!(state.reset_to_start());
        assert!(state.is_playing());
        assert_signal_invariant(&state);
    }

    #[test]
    fn test_automatic_next_loop_all_wraps_from_last() {
        let mut state = at_index(state_with(3), 2);
        state.play();
        state.toggle_loop_mode(); // All
        state.next(false);
        assert_eq!(state.snapshot().current_index, Some(0));
        assert!(state.reset_to_start());
        assert!(state.is_playing());
        assert_signal_invariant(&state);
    }

    #[test]
    fn test_automatic_next_loop_off_stops_on_last() {
        let mut state = at_index(state_with(3), 2);
        state.play();
        state.next(false);
        assert_eq!(state.snapshot().current_index, Some(2));
        assert!(!state.is_playing());
        assert!(!state.reset_to_start());
        assert!(!state.jump_to_end());
    }

    #[test]
    fn test_automatic_next_loop_off_advances_without_reset() {
        let mut state = state_with(3);
        state.play();
        state.next(false);
        assert_eq!(state.snapshot().current_index, Some(1));
        assert!(state.is_playing());
        // The track change itself implies a fresh start.
        assert!(!state.reset_to_start());
    }

    #[test]
    fn test_manual_next_off_boundary_steps_by_one() {
        let mut state = state_with(3);
        state.next(true);
        assert_eq!(state.snapshot().current_index, Some(1));
        assert!(!state.reset_to_start());
        assert!(!state.jump_to_end());
    }

    #[test]
    fn test_manual_next_at_last_under_loop_off_jumps_to_end() {
        let mut state = at_index(state_with(3), 2);
        state.play();
        state.next(true);
        assert_eq!(state.snapshot().current_index, Some(2));
        assert!(!state.is_playing());
        assert!(state.jump_to_end());
        assert!(!state.reset_to_start());
    }

    #[test]
    fn test_manual_next_at_last_under_loop_all_wraps_with_reset() {
        let mut state = at_index(state_with(3), 2);
        state.toggle_loop_mode(); // All
        state.next(true);
        assert_eq!(state.snapshot().current_index, Some(0));
        assert!(state.reset_to_start());
        assert_signal_invariant(&state);
    }

    #[test]
    fn test_manual_next_single_track_loop_one_demotes_and_plays() {
        let mut state = state_with(1);
        state.toggle_loop_mode();
        state.toggle_loop_mode(); // One
        state.next(true);
        assert_eq!(state.loop_mode(), LoopMode::All);
        assert_eq!(state.snapshot().current_index, Some(0));
        assert!(state.reset_to_start());
        assert!(state.is_playing());
    }

    #[test]
    fn test_manual_prev_at_first_under_loop_off_restarts() {
        let mut state = state_with(3);
        state.play();
        state.prev(true);
        assert_eq!(state.snapshot().current_index, Some(0));
        assert!(state.reset_to_start());
        assert!(state.is_playing());
    }

    #[test]
    fn test_manual_prev_at_first_under_loop_all_wraps_to_last() {
        let mut state = state_with(3);
        state.toggle_loop_mode(); // All
        state.prev(true);
        assert_eq!(state.snapshot().current_index, Some(2));
        assert!(state.reset_to_start());
    }

    #[test]
    fn test_manual_navigation_demotes_loop_one() {
        let mut state = at_index(state_with(3), 1);
        state.toggle_loop_mode();
        state.toggle_loop_mode(); // One
        state.next(true);
        assert_eq!(state.loop_mode(), LoopMode::All);
        assert_eq!(state.snapshot().current_index, Some(2));

        let mut state = at_index(state_with(3), 1);
        state.toggle_loop_mode();
        state.toggle_loop_mode(); // One
        state.prev(true);
        assert_eq!(state.loop_mode(), LoopMode::All);
        assert_eq!(state.snapshot().current_index, Some(0));
    }

    #[test]
    fn test_automatic_prev_follows_loop_policy() {
        let mut state = state_with(3);
        state.play();
        state.prev(false);
        assert_eq!(state.snapshot().current_index, Some(0));
        assert!(!state.is_playing());

        let mut state = state_with(3);
        state.toggle_loop_mode(); // All
        state.prev(false);
        assert_eq!(state.snapshot().current_index, Some(2));
    }

    #[test]
    fn test_clear_signals_are_idempotent() {
        let mut state = at_index(state_with(3), 2);
        state.next(true); // jump_to_end raised
        state.clear_jump_signal();
        let before = state.snapshot();
        state.clear_jump_signal();
        state.clear_reset_signal();
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_raising_one_signal_clears_the_other() {
        let mut state = at_index(state_with(3), 2);
        state.next(true);
        assert!(state.jump_to_end());
        // Loop mode changes, then a wrap raises reset while jump is still
        // pending; exactly one signal may remain.
        state.toggle_loop_mode(); // All
        state.next(true);
        assert!(state.reset_to_start());
        assert!(!state.jump_to_end());
        assert_signal_invariant(&state);
    }

    #[test]
    fn test_signal_invariant_over_operation_sequence() {
        let mut state = state_with(2);
        state.play();
        state.next(true);
        state.next(true);
        state.toggle_loop_mode();
        state.next(true);
        state.prev(true);
        state.toggle_loop_mode();
        state.next(false);
        assert_signal_invariant(&state);
    }

    #[test]
    fn test_toggle_like_round_trip() {
        let mut state = state_with(2);
        let first = state.toggle_like("1").expect("track 1 exists");
        assert!(first.liked);
        assert_eq!(first.title, "Title 1");
        assert!(state.is_liked("1"));
        let second = state.toggle_like("1").expect("track 1 exists");
        assert!(!second.liked);
        assert!(!state.is_liked("1"));
    }

    #[test]
    fn test_toggle_like_unknown_id_is_noop() {
        let mut state = state_with(2);
        assert!(state.toggle_like("missing").is_none());
        assert!(state.snapshot().liked_track_ids.is_empty());
    }

    #[test]
    fn test_set_volume_clamps() {
        let mut state = state_with(1);
        state.set_volume(1.5);
        assert_eq!(state.volume(), 1.0);
        state.set_volume(-0.2);
        assert_eq!(state.volume(), 0.0);
        state.set_volume(0.3);
        assert_eq!(state.volume(), 0.3);
    }
}
