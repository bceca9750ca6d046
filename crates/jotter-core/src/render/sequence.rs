//! Latest-wins sequencing of render requests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues increasing sequence numbers and tells whether a response still
/// belongs to the most recent request.
///
/// Superseded requests are not cancelled; their responses are dropped when
/// they arrive.
#[derive(Debug, Default)]
pub struct RenderSequencer {
    latest: AtomicU64,
}

impl RenderSequencer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
        }
    }

    /// Reserve the next sequence number. The first one issued is 1.
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Most recently issued sequence number, 0 before the first request.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, sequence: u64) -> bool {
        sequence == self.latest()
    }

    /// Keep `value` only if `sequence` is still the latest issued.
    pub fn accept<T>(&self, sequence: u64, value: T) -> Option<T> {
        self.is_current(sequence).then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let sequencer = RenderSequencer::new();
        assert_eq!(sequencer.latest(), 0);
        assert_eq!(sequencer.issue(), 1);
        assert_eq!(sequencer.issue(), 2);
        assert_eq!(sequencer.latest(), 2);
    }

    #[test]
    fn only_latest_response_is_accepted() {
        let sequencer = RenderSequencer::new();
        let older = sequencer.issue();
        let newer = sequencer.issue();

        assert_eq!(sequencer.accept(older, "stale"), None);
        assert_eq!(sequencer.accept(newer, "fresh"), Some("fresh"));
        assert!(!sequencer.is_current(older));
    }
}
