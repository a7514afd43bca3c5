use std::collections::{HashSet, VecDeque};

use autocrane_types::PodIdentifier;

/// FIFO of at most `W` per-iteration failing-pod sets (§4.4).
///
/// Represented as a ring-buffer-shaped `VecDeque` bounded at `capacity`, per
/// the spec's design note (§9, "Queue-based sliding window"). Eviction fires
/// only when the window is full and the intersection across every entry is
/// non-empty; the window keeps sliding afterward rather than clearing, so a
/// pod that recovers naturally falls out once it ages past the window.
pub struct FailureWindow {
    capacity: usize,
    entries: VecDeque<HashSet<PodIdentifier>>,
}

impl FailureWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "failure window capacity must be positive");
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends this iteration's failing-pod set, dropping the oldest entry
    /// if the window is already at capacity.
    pub fn push(&mut self, failing: HashSet<PodIdentifier>) {
        self.entries.push_back(failing);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    /// Intersection across every entry currently in the window. Only
    /// meaningful (and only called by the orchestrator) once `is_full()`.
    pub fn intersection(&self) -> HashSet<PodIdentifier> {
        let Some((first, rest)) = self.entries.split_first() else {
            return HashSet::new();
        };
        let mut acc = first.clone();
        for set in rest {
            acc.retain(|pod| set.contains(pod));
        }
        acc
    }
}
