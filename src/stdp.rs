//! STDP signaling unit.
//!
//! Records pre-synaptic arrival timestamps and, on a post-synaptic fire,
//! schedules a feedback delivery. Scheduling uses an "earliest-wins"
//! compare-and-set loop on a monotonic instant cell, so two
//! concurrent fires never push a later delivery time over an earlier one.

use crate::callbacks::NeuronCallbacks;
use crate::history::PreSpikeHistory;
use crate::ids::SynapseId;
use crate::plasticity::PlasticityAdjustment;
use crate::synapse_info::SynapseQuery;
use crate::time::{Duration, Instant, SignedDuration};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Sentinel meaning "no feedback currently scheduled".
const UNSCHEDULED: u64 = u64::MAX;

/// The STDP signaling unit owned by one neuron.
///
/// All state transitions are serialized by a single mutex (the history) or
/// an atomic compare-exchange loop (the schedule); no operation blocks
/// longer than one short critical section.
pub struct StdpUnit {
    enabled: AtomicBool,
    /// Feedback delay, nanoseconds. Mutated by `enable_stdp_feedback`.
    feedback_delay_ns: AtomicU64,
    /// Default learning rate, stored as `f64::to_bits`.
    default_learning_rate_bits: AtomicU64,
    window: Duration,
    history: Mutex<PreSpikeHistory>,
    /// Nanoseconds of the next scheduled feedback instant, or
    /// [`UNSCHEDULED`].
    scheduled: AtomicU64,
}

impl StdpUnit {
    /// Construct a new STDP unit.
    pub fn new(enabled: bool, feedback_delay: Duration, default_learning_rate: f64, window: Duration) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            feedback_delay_ns: AtomicU64::new(feedback_delay.as_nanos()),
            default_learning_rate_bits: AtomicU64::new(default_learning_rate.to_bits()),
            window,
            history: Mutex::new(PreSpikeHistory::with_window(window)),
            scheduled: AtomicU64::new(UNSCHEDULED),
        }
    }

    /// Whether STDP feedback is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Current feedback delay.
    pub fn feedback_delay(&self) -> Duration {
        Duration::from_nanos(self.feedback_delay_ns.load(Ordering::Relaxed))
    }

    /// Default learning rate, used when a [`PlasticityAdjustment`] carries
    /// no override.
    pub fn default_learning_rate(&self) -> f64 {
        f64::from_bits(self.default_learning_rate_bits.load(Ordering::Relaxed))
    }

    /// Enable STDP feedback with a new delay and default learning rate
    ///.
    pub fn enable(&self, delay: Duration, learning_rate: f64) {
        self.feedback_delay_ns.store(delay.as_nanos(), Ordering::Relaxed);
        self.default_learning_rate_bits
            .store(learning_rate.to_bits(), Ordering::Relaxed);
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Record a pre-synaptic arrival.
    pub fn record_pre_spike(&self, synapse_id: SynapseId, t: Instant) {
        self.history.lock().record(synapse_id, t);
    }

    /// Schedule a feedback delivery for `fire_time + feedback_delay`. If a
    /// feedback is already scheduled at an earlier instant, this call is a
    /// no-op — earliest wins.
    pub fn schedule_feedback(&self, fire_time: Instant) {
        if !self.is_enabled() {
            return;
        }
        let candidate = fire_time.checked_add(self.feedback_delay()).as_nanos();
        let mut current = self.scheduled.load(Ordering::SeqCst);
        loop {
            if current != UNSCHEDULED && current <= candidate {
                // Already have an equal-or-earlier schedule; nothing to do.
                return;
            }
            match self.scheduled.compare_exchange_weak(
                current,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// The currently scheduled feedback instant, if any.
    pub fn scheduled_at(&self) -> Option<Instant> {
        let raw = self.scheduled.load(Ordering::SeqCst);
        (raw != UNSCHEDULED).then(|| Instant::from_nanos(raw))
    }

    /// If enabled and the scheduled time has passed, atomically clear it
    /// and deliver feedback now. Returns the number of adjustments
    /// attempted.
    pub async fn check_and_deliver(&self, now: Instant, callbacks: &dyn NeuronCallbacks) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let raw = self.scheduled.load(Ordering::SeqCst);
        if raw == UNSCHEDULED || raw > now.as_nanos() {
            return 0;
        }
        // At-most-once: only the task that wins this compare-exchange
        // delivers; a racing scheduler that lands an earlier time after
        // our load simply gets re-delivered on the next check.
        if self
            .scheduled
            .compare_exchange(raw, UNSCHEDULED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return 0;
        }
        let delay_ns = self.feedback_delay_ns.load(Ordering::Relaxed);
        self.deliver_now(Instant::from_nanos(raw.saturating_sub(delay_ns)), callbacks)
            .await
    }

    /// Query recently active incoming synapses and issue a
    /// [`PlasticityAdjustment`] to each.
    ///
    /// `post_spike_time` is the instant of the fire that triggered this
    /// delivery (not the delivery instant itself). Tolerates per-call
    /// errors (counted by the caller, not propagated) and returns `0` if
    /// the query yields nothing.
    pub async fn deliver_now(&self, post_spike_time: Instant, callbacks: &dyn NeuronCallbacks) -> usize {
        let since = Instant::from_nanos(
            post_spike_time
                .as_nanos()
                .saturating_sub(self.window.as_nanos()),
        );
        let synapses = callbacks.list_synapses(SynapseQuery::incoming_since(since)).await;
        let mut attempted = 0usize;
        for syn in synapses {
            let delta_t = SignedDuration::between(syn.last_activity, post_spike_time);
            if delta_t.magnitude() > self.window {
                // Outside the window: no-op, not an error.
                continue;
            }
            attempted += 1;
            let _ = callbacks
                .apply_plasticity(syn.id, PlasticityAdjustment::from_delta(delta_t))
                .await;
        }
        attempted
    }

    /// Number of entries currently held in the pre-spike history, for
    /// diagnostics/tests.
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{ComponentInfo, NeuronCallbacks, SynapseCreateConfig};
    use crate::ids::{LigandKind, NeuronId};
    use crate::synapse_info::{SynapseDirection, SynapseInfo};
    use async_trait::async_trait;
    use parking_lot::Mutex as PMutex;

    #[derive(Default)]
    struct RecordingCallbacks {
        synapses: Vec<SynapseInfo>,
        applied: PMutex<Vec<(SynapseId, PlasticityAdjustment)>>,
    }

    #[async_trait]
    impl NeuronCallbacks for RecordingCallbacks {
        async fn create_synapse(&self, _c: SynapseCreateConfig) -> crate::error::Result<SynapseId> {
            unimplemented!()
        }
        async fn delete_synapse(&self, _id: SynapseId) -> crate::error::Result<()> {
            unimplemented!()
        }
        async fn list_synapses(&self, _q: SynapseQuery) -> Vec<SynapseInfo> {
            self.synapses.clone()
        }
        async fn get_synapse(&self, _id: SynapseId) -> crate::error::Result<std::sync::Arc<dyn crate::callbacks::SynapseHandle>> {
            unimplemented!()
        }
        async fn apply_plasticity(&self, id: SynapseId, adj: PlasticityAdjustment) -> crate::error::Result<()> {
            self.applied.lock().push((id, adj));
            Ok(())
        }
        async fn get_synapse_weight(&self, _id: SynapseId) -> crate::error::Result<f64> {
            unimplemented!()
        }
        async fn set_synapse_weight(&self, _id: SynapseId, _w: f64) -> crate::error::Result<()> {
            unimplemented!()
        }
        async fn release_chemical(&self, _l: LigandKind, _c: f64) -> crate::error::Result<()> {
            unimplemented!()
        }
        async fn send_electrical_signal(&self, _k: crate::ids::SignalKind, _p: &[u8]) {}
        async fn get_spatial_delay(&self, _t: NeuronId) -> Duration {
            Duration::ZERO
        }
        async fn find_nearby(&self, _r: f64) -> Vec<ComponentInfo> {
            Vec::new()
        }
        async fn report_health(&self, _a: f64, _c: usize) {}
        async fn report_state_change(&self, _o: crate::lifecycle::ComponentState, _n: crate::lifecycle::ComponentState) {}
    }

    #[test]
    fn earliest_wins_under_concurrent_schedule() {
        let unit = StdpUnit::new(true, Duration::from_millis(5), 0.01, Duration::from_millis(50));
        unit.schedule_feedback(Instant::from_nanos(100));
        unit.schedule_feedback(Instant::from_nanos(50));
        assert_eq!(
            unit.scheduled_at(),
            Some(Instant::from_nanos(50).checked_add(Duration::from_millis(5)))
        );
        // A later schedule after the earliest must not overwrite it.
        unit.schedule_feedback(Instant::from_nanos(200));
        assert_eq!(
            unit.scheduled_at(),
            Some(Instant::from_nanos(50).checked_add(Duration::from_millis(5)))
        );
    }

    #[test]
    fn delivery_clears_schedule_until_next_fire() {
        let unit = StdpUnit::new(true, Duration::ZERO, 0.01, Duration::from_millis(50));
        unit.schedule_feedback(Instant::from_nanos(10));
        assert!(unit.scheduled_at().is_some());
        let raw = unit.scheduled.load(Ordering::SeqCst);
        assert!(unit
            .scheduled
            .compare_exchange(raw, UNSCHEDULED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok());
        assert!(unit.scheduled_at().is_none());
    }

    #[tokio::test]
    async fn sign_convention_pre_before_post_is_negative() {
        let unit = StdpUnit::new(true, Duration::ZERO, 0.01, Duration::from_millis(50));
        let post_spike_time = Instant::from_nanos(100_000_000);
        let cb = RecordingCallbacks {
            synapses: vec![SynapseInfo {
                id: SynapseId::new(1),
                source_id: NeuronId::new(1),
                target_id: NeuronId::new(2),
                weight: 0.5,
                delay: Duration::ZERO,
                last_activity: Instant::from_nanos(90_000_000),
                direction: SynapseDirection::Incoming,
                synapse_type: 0,
            }],
            applied: PMutex::new(Vec::new()),
        };
        let attempted = unit.deliver_now(post_spike_time, &cb).await;
        assert_eq!(attempted, 1);
        let applied = cb.applied.lock();
        assert!(applied[0].1.delta_t.is_negative());
    }

    #[tokio::test]
    async fn outside_window_is_noop_not_error() {
        let unit = StdpUnit::new(true, Duration::ZERO, 0.01, Duration::from_millis(10));
        let post_spike_time = Instant::from_nanos(100_000_000);
        let cb = RecordingCallbacks {
            synapses: vec![SynapseInfo {
                id: SynapseId::new(1),
                source_id: NeuronId::new(1),
                target_id: NeuronId::new(2),
                weight: 0.5,
                delay: Duration::ZERO,
                last_activity: Instant::from_nanos(0),
                direction: SynapseDirection::Incoming,
                synapse_type: 0,
            }],
            applied: PMutex::new(Vec::new()),
        };
        let attempted = unit.deliver_now(post_spike_time, &cb).await;
        assert_eq!(attempted, 0);
        assert!(cb.applied.lock().is_empty());
    }
}
