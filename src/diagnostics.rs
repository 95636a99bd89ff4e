//! Per-neuron diagnostic counters.
//!
//! Every error on the fire path is caught at the soma boundary, counted
//! here, and discarded — never propagated. Scalars use atomics so they can
//! be read from any task without taking the soma task's critical section.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking failure modes that are swallowed rather than
/// propagated, plus a couple of headline activity counters useful for tests.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Signals dropped because the mailbox was full (drop-oldest policy).
    pub mailbox_overflows: AtomicU64,
    /// Callback invocations on the fire path that returned an error.
    pub callback_errors: AtomicU64,
    /// Panics caught at the callback call boundary.
    pub callback_panics: AtomicU64,
    /// Total fires.
    pub fires: AtomicU64,
    /// STDP adjustments successfully delivered.
    pub plasticity_adjustments_delivered: AtomicU64,
    /// Synaptic weight writes that were clamped to `[min, max]`.
    pub weights_clamped: AtomicU64,
    /// Synapses pruned.
    pub synapses_pruned: AtomicU64,
}

impl Diagnostics {
    /// Construct a fresh, zeroed diagnostics block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mailbox drop-oldest event.
    pub fn record_mailbox_overflow(&self) {
        self.mailbox_overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a callback error on the fire path.
    pub fn record_callback_error(&self) {
        self.callback_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a callback panic caught at the call boundary.
    pub fn record_callback_panic(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fire event.
    pub fn record_fire(&self) {
        self.fires.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivered plasticity adjustment.
    pub fn record_plasticity_delivered(&self) {
        self.plasticity_adjustments_delivered
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a clamped weight write.
    pub fn record_weight_clamped(&self) {
        self.weights_clamped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a synapse pruned.
    pub fn record_synapse_pruned(&self) {
        self.synapses_pruned.fetch_add(1, Ordering::Relaxed);
    }

    /// A consistent (but not atomic-across-fields) snapshot for tests and
    /// introspection.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            mailbox_overflows: self.mailbox_overflows.load(Ordering::Relaxed),
            callback_errors: self.callback_errors.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
            fires: self.fires.load(Ordering::Relaxed),
            plasticity_adjustments_delivered: self
                .plasticity_adjustments_delivered
                .load(Ordering::Relaxed),
            weights_clamped: self.weights_clamped.load(Ordering::Relaxed),
            synapses_pruned: self.synapses_pruned.load(Ordering::Relaxed),
        }
    }
}

/// A plain-data copy of [`Diagnostics`] for comparison in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiagnosticsSnapshot {
    /// See [`Diagnostics::mailbox_overflows`].
    pub mailbox_overflows: u64,
    /// See [`Diagnostics::callback_errors`].
    pub callback_errors: u64,
    /// See [`Diagnostics::callback_panics`].
    pub callback_panics: u64,
    /// See [`Diagnostics::fires`].
    pub fires: u64,
    /// See [`Diagnostics::plasticity_adjustments_delivered`].
    pub plasticity_adjustments_delivered: u64,
    /// See [`Diagnostics::weights_clamped`].
    pub weights_clamped: u64,
    /// See [`Diagnostics::synapses_pruned`].
    pub synapses_pruned: u64,
}
