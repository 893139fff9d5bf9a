//! Deferred voice teardown.
//!
//! A released voice stays busy until its tail has played out. Rather than
//! using timers, the pool records when each tail ends and applies the
//! teardowns lazily whenever it next looks at the clock. Entries carry the
//! voice generation they were scheduled for, so a teardown that outlives its
//! note (the voice was re-allocated in the meantime) is recognized as stale.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::voice::VoiceId;

/// One pending teardown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Teardown {
    /// When the tail ends.
    pub due: f64,
    /// Voice to tear down.
    pub voice: VoiceId,
    /// Generation the teardown applies to.
    pub generation: u64,
}

impl Eq for Teardown {}

impl Ord for Teardown {
    // Reversed so the heap pops the earliest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.voice.cmp(&self.voice))
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for Teardown {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending teardowns keyed by due time.
#[derive(Debug, Default, Clone)]
pub struct TeardownScheduler {
    pending: BinaryHeap<Teardown>,
}

impl TeardownScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a teardown for `voice` at `due`.
    pub fn schedule(&mut self, voice: VoiceId, generation: u64, due: f64) {
        self.pending.push(Teardown {
            due,
            voice,
            generation,
        });
    }

    /// Remove and return every teardown due at or before `now`, earliest first.
    pub fn due(&mut self, now: f64) -> Vec<Teardown> {
        let mut ready = Vec::new();
        while self.pending.peek().is_some_and(|t| t.due <= now) {
            if let Some(teardown) = self.pending.pop() {
                ready.push(teardown);
            }
        }
        ready
    }

    /// Time of the earliest pending teardown.
    pub fn next_due(&self) -> Option<f64> {
        self.pending.peek().map(|t| t.due)
    }

    /// Number of pending teardowns, stale ones included.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop everything pending.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
