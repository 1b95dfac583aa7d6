//! Banner queue backing the like/unlike feedback surface.
//!
//! Pending messages plus at most one "currently displayed" message, kept
//! separate from player state so rapid toggling never drops or reorders
//! feedback. Each promotion bumps a generation counter so a stale display
//! timeout cannot dismiss a newer banner.

use std::collections::VecDeque;

pub struct BannerQueue {
    pending: VecDeque<String>,
    displayed: Option<String>,
    generation: u64,
}

impl BannerQueue {
    pub fn new() -> BannerQueue {
        BannerQueue {
            pending: VecDeque::new(),
            displayed: None,
            generation: 0,
        }
    }

    /// Enqueues one message. When nothing is displayed the message is
    /// promoted immediately (skipping a redundant wait cycle) and the new
    /// display generation is returned.
    pub fn push(&mut self, message: String) -> Option<u64> {
        if self.displayed.is_none() {
            self.displayed = Some(message);
            self.generation += 1;
            Some(self.generation)
        } else {
            self.pending.push_back(message);
            None
        }
    }

    /// Dismisses the banner shown under `generation`, promoting the next
    /// pending message if any. Timeouts for generations other than the
    /// current one are ignored.
    pub fn dismiss(&mut self, generation: u64) -> Option<u64> {
        if generation != self.generation || self.displayed.is_none() {
            return None;
        }
        self.displayed = self.pending.pop_front();
        if self.displayed.is_some() {
            self.generation += 1;
            Some(self.generation)
        } else {
            None
        }
    }

    pub fn displayed(&self) -> Option<&str> {
        self.displayed.as_deref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_message_displays_immediately() {
        let mut queue = BannerQueue::new();
        let generation = queue.push("Added \"a\" to liked tracks".to_string());
        assert!(generation.is_some());
        assert_eq!(queue.displayed(), Some("Added \"a\" to liked tracks"));
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_second_message_waits_for_dismissal() {
        let mut queue = BannerQueue::new();
        let first = queue.push("first".to_string()).expect("promoted");
        assert!(queue.push("second".to_string()).is_none());
        assert_eq!(queue.displayed(), Some("first"));
        assert_eq!(queue.pending_len(), 1);

        let second = queue.dismiss(first).expect("second promoted");
        assert_eq!(queue.displayed(), Some("second"));
        assert!(queue.dismiss(second).is_none());
        assert_eq!(queue.displayed(), None);
    }

    #[test]
    fn test_stale_timeout_is_ignored() {
        let mut queue = BannerQueue::new();
        let first = queue.push("first".to_string()).expect("promoted");
        queue.push("second".to_string());
        let second = queue.dismiss(first).expect("second promoted");
        // The first banner's timeout fires again after the second banner is
        // already showing; it must not dismiss it.
        assert!(queue.dismiss(first).is_none());
        assert_eq!(queue.displayed(), Some("second"));
        assert!(queue.dismiss(second).is_none());
    }

    #[test]
    fn test_rapid_toggles_preserve_order() {
        let mut queue = BannerQueue::new();
        let mut generation = queue.push("a".to_string()).expect("promoted");
        for message in ["b", "c", "d"] {
            assert!(queue.push(message.to_string()).is_none());
        }
        let mut seen = vec![queue.displayed().unwrap().to_string()];
        while let Some(next_generation) = queue.dismiss(generation) {
            generation = next_generation;
            seen.push(queue.displayed().unwrap().to_string());
        }
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_dismiss_on_empty_queue_is_noop() {
        let mut queue = BannerQueue::new();
        assert!(queue.dismiss(0).is_none());
        assert!(queue.dismiss(7).is_none());
        assert_eq!(queue.displayed(), None);
    }
}
