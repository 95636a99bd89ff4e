//! Per-neuron membrane state.
//!
//! Exclusively owned and mutated by the soma task; external
//! readers see it only through a short critical section, modeled here with
//! `parking_lot::RwLock` rather than atomics-per-field, since several
//! fields must be read together for a consistent snapshot (e.g.
//! `current_threshold` alongside `activity_level`).

use crate::time::{Duration, Instant};

/// Mutable soma state. Not `Clone` — there is exactly one instance per
/// neuron, and only the soma task writes to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembraneState {
    /// Current accumulator value.
    pub accumulator: f64,
    /// Instant the accumulator was last updated (for leak computation).
    pub last_update: Instant,
    /// Current firing threshold, adapted by homeostasis.
    pub threshold_current: f64,
    /// Base threshold, fixed at construction.
    pub threshold_base: f64,
    /// Geometric decay rate applied per unit time, in `(0, 1]`.
    pub decay_rate: f64,
    /// Instant the refractory lockout ends.
    pub refractory_until: Instant,
    /// Instant of the most recent fire.
    pub last_fire_time: Instant,
    /// Exponentially weighted moving average of firing rate, Hz.
    pub activity_ewma: f64,
    /// Value the accumulator resets to after a fire.
    pub reset_value: f64,
}

impl MembraneState {
    /// Construct a fresh membrane state at rest.
    pub fn new(threshold_base: f64, decay_rate: f64, reset_value: f64, now: Instant) -> Self {
        Self {
            accumulator: reset_value,
            last_update: now,
            threshold_current: threshold_base,
            threshold_base,
            decay_rate,
            refractory_until: now,
            last_fire_time: Instant::ZERO,
            activity_ewma: 0.0,
            reset_value,
        }
    }

    /// Apply geometric leak toward zero for the elapsed time since
    /// `last_update`, then advance `last_update` to `now`.
    pub fn apply_leak(&mut self, now: Instant) {
        let elapsed = now.saturating_since(self.last_update).as_secs_f64();
        self.accumulator *= (-self.decay_rate * elapsed).exp();
        self.last_update = now;
    }

    /// Add a dendritic contribution to the accumulator.
    pub fn integrate(&mut self, contribution: f64) {
        self.accumulator += contribution;
    }

    /// Whether firing is locked out by refractoriness at this instant.
    pub fn is_refractory(&self, now: Instant) -> bool {
        now < self.refractory_until
    }

    /// Whether the accumulator has crossed the current threshold.
    pub fn crosses_threshold(&self) -> bool {
        self.accumulator >= self.threshold_current
    }

    /// Apply the post-fire reset: accumulator to `reset_value`, refractory
    /// lockout through `now + refractory_period`, `last_fire_time := now`.
    pub fn apply_fire_reset(&mut self, now: Instant, refractory_period: Duration) {
        self.accumulator = self.reset_value;
        self.refractory_until = now.checked_add(refractory_period);
        self.last_fire_time = now;
    }

    /// A read-only snapshot, for introspection without holding the lock
    /// that guards live mutation.
    pub fn snapshot(&self) -> MembraneSnapshot {
        MembraneSnapshot {
            accumulator: self.accumulator,
            threshold_current: self.threshold_current,
            activity_ewma: self.activity_ewma,
            refractory_until: self.refractory_until,
            last_fire_time: self.last_fire_time,
        }
    }
}

/// Cheap, copyable snapshot of the parts of [`MembraneState`] exposed by the
/// neuron's introspection API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembraneSnapshot {
    /// Current accumulator value.
    pub accumulator: f64,
    /// Current firing threshold.
    pub threshold_current: f64,
    /// Current firing-rate EWMA, Hz.
    pub activity_ewma: f64,
    /// Instant the refractory lockout ends.
    pub refractory_until: Instant,
    /// Instant of the most recent fire.
    pub last_fire_time: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leak_decays_toward_zero() {
        let mut m = MembraneState::new(1.0, 0.5, 0.0, Instant::ZERO);
        m.accumulator = 2.0;
        m.apply_leak(Instant::from_nanos(1_000_000_000));
        assert!(m.accumulator < 2.0);
        assert!(m.accumulator > 0.0);
    }

    #[test]
    fn refractory_blocks_fire_detection_window() {
        let mut m = MembraneState::new(1.0, 0.1, 0.0, Instant::ZERO);
        m.apply_fire_reset(Instant::from_nanos(100), Duration::from_nanos(50));
        assert!(m.is_refractory(Instant::from_nanos(120)));
        assert!(!m.is_refractory(Instant::from_nanos(151)));
    }
}
