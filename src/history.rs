//! Pre-synaptic spike arrival history.

use crate::ids::SynapseId;
use crate::time::{Duration, Instant};
use std::collections::VecDeque;

/// A hard cap on history length, independent of the time window, so a burst
/// of activity cannot grow the history unboundedly.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Ordered record of recent pre-synaptic arrivals, bounded by a time window
/// and a hard capacity.
///
/// Invariant: timestamps are strictly non-decreasing (entries are only ever
/// appended in arrival order); cleanup is idempotent.
#[derive(Debug, Clone)]
pub struct PreSpikeHistory {
    entries: VecDeque<(Instant, SynapseId)>,
    window_size: Duration,
    capacity: usize,
}

impl PreSpikeHistory {
    /// Construct an empty history with the given window and capacity.
    pub fn new(window_size: Duration, capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            window_size,
            capacity,
        }
    }

    /// Construct an empty history with [`DEFAULT_CAPACITY`].
    pub fn with_window(window_size: Duration) -> Self {
        Self::new(window_size, DEFAULT_CAPACITY)
    }

    /// Record a pre-synaptic arrival, evicting entries older than
    /// `t - window_size` and beyond capacity.
    pub fn record(&mut self, synapse_id: SynapseId, t: Instant) {
        self.entries.push_back((t, synapse_id));
        self.evict(t);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Drop entries older than `now - window_size`. Idempotent.
    pub fn evict(&mut self, now: Instant) {
        while let Some(&(t, _)) = self.entries.front() {
            if now.saturating_since(t) > self.window_size {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// All entries with `last_activity >= since`, in arrival order — the
    /// shape `deliver_now` needs from a local in-process history,
    /// independent of whatever the matrix's `list_synapses` returns.
    pub fn since(&self, since: Instant) -> impl Iterator<Item = &(Instant, SynapseId)> {
        self.entries.iter().filter(move |&&(t, _)| t >= since)
    }

    /// Current number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
