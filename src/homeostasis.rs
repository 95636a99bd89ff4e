//! Homeostatic controller.

use crate::callbacks::NeuronCallbacks;
use crate::config::{THRESHOLD_CLAMP_HI, THRESHOLD_CLAMP_LO};
use crate::diagnostics::Diagnostics;
use crate::synapse_info::SynapseQuery;
use crate::time::{Duration, Instant};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Step size applied to threshold adaptation each fire.
const THRESHOLD_STEP: f64 = 0.01;

/// Small floor to avoid division by zero when `target_input_strength` is
/// zero.
const SCALING_EPSILON: f64 = 1e-6;

struct State {
    rate_ewma: f64,
    last_fire_time: Option<Instant>,
    last_auto_tick: Option<Instant>,
    last_scaling_pass: Option<Instant>,
    last_pruning_pass: Option<Instant>,
}

/// The mutable part of [`HomeostasisController`]'s configuration — runtime
/// setters write this behind a short critical section, mirroring how
/// `MembraneState::threshold_current` is guarded.
#[derive(Debug, Clone, Copy)]
struct Config {
    strength: f64,
    target_rate: f64,
    alpha: f64,
    auto_tick_enabled: bool,
    auto_tick_interval: Duration,
    synaptic_scaling_enabled: bool,
    target_input_strength: f64,
    scaling_rate: f64,
    scaling_interval: Duration,
    min_weight: f64,
    max_weight: f64,
    pruning_enabled: bool,
    pruning_interval: Duration,
    pruning_weight_threshold: f64,
    pruning_min_age: Duration,
}

/// Keeps a neuron's firing rate near a target by adjusting its threshold
/// and, optionally, rescaling incoming synaptic weights.
pub struct HomeostasisController {
    config: RwLock<Config>,
    state: Mutex<State>,
}

/// Construction parameters for [`HomeostasisController`], kept separate
/// from [`crate::config::NeuronConfig`] so the controller can be unit
/// tested without constructing a whole neuron.
#[derive(Debug, Clone, Copy)]
pub struct HomeostasisParams {
    /// Strength of the threshold-adaptation feedback; `0.0` makes the
    /// controller inert.
    pub strength: f64,
    /// Target firing rate, Hz.
    pub target_rate: f64,
    /// Averaging horizon for the firing-rate EWMA.
    pub averaging_horizon: Duration,
    /// Whether synaptic scaling is enabled at construction.
    pub synaptic_scaling_enabled: bool,
    /// Target total incoming synaptic strength for scaling.
    pub target_input_strength: f64,
    /// Scaling rate for synaptic rescaling.
    pub scaling_rate: f64,
    /// Cadence between synaptic-scaling passes.
    pub scaling_interval: Duration,
    /// Clamp bounds applied to every synaptic weight write.
    pub min_weight: f64,
    /// See [`HomeostasisParams::min_weight`].
    pub max_weight: f64,
    /// Whether periodic pruning is enabled.
    pub pruning_enabled: bool,
    /// Cadence between pruning passes.
    pub pruning_interval: Duration,
    /// Weight below which a synapse is a pruning candidate.
    pub pruning_weight_threshold: f64,
    /// Minimum inactivity age for a pruning candidate.
    pub pruning_min_age: Duration,
}

fn derive_alpha(averaging_horizon: Duration) -> f64 {
    // ~63% weight on activity within the averaging horizon — the standard
    // exponential-smoothing choice for an EWMA time constant.
    let horizon_secs = averaging_horizon.as_secs_f64().max(1e-6);
    1.0 - (-1.0 / horizon_secs).exp()
}

impl HomeostasisController {
    /// Construct a new controller from its parameters.
    pub fn new(params: HomeostasisParams) -> Self {
        let config = Config {
            strength: params.strength,
            target_rate: params.target_rate,
            alpha: derive_alpha(params.averaging_horizon),
            auto_tick_enabled: false,
            auto_tick_interval: Duration::ZERO,
            synaptic_scaling_enabled: params.synaptic_scaling_enabled,
            target_input_strength: params.target_input_strength,
            scaling_rate: params.scaling_rate,
            scaling_interval: params.scaling_interval,
            min_weight: params.min_weight,
            max_weight: params.max_weight,
            pruning_enabled: params.pruning_enabled,
            pruning_interval: params.pruning_interval,
            pruning_weight_threshold: params.pruning_weight_threshold,
            pruning_min_age: params.pruning_min_age,
        };
        Self {
            config: RwLock::new(config),
            state: Mutex::new(State {
                rate_ewma: 0.0,
                last_fire_time: None,
                last_auto_tick: None,
                last_scaling_pass: None,
                last_pruning_pass: None,
            }),
        }
    }

    /// Current firing-rate estimate, Hz.
    pub fn current_rate(&self) -> f64 {
        self.state.lock().rate_ewma
    }

    /// Whether the controller is inert.
    pub fn is_inert(&self) -> bool {
        self.config.read().strength == 0.0
    }

    /// Update the homeostasis strength and/or target rate at runtime.
    pub fn set_strength_and_target(&self, strength: f64, target_rate: f64) {
        let mut cfg = self.config.write();
        cfg.strength = strength;
        cfg.target_rate = target_rate;
    }

    /// Enable synaptic scaling with new parameters.
    pub fn enable_synaptic_scaling(&self, target: f64, rate: f64, interval: Duration) {
        let mut cfg = self.config.write();
        cfg.synaptic_scaling_enabled = true;
        cfg.target_input_strength = target;
        cfg.scaling_rate = rate;
        cfg.scaling_interval = interval;
    }

    /// Enable timer-driven pruning with a new cadence.
    pub fn enable_pruning(&self, interval: Duration) {
        let mut cfg = self.config.write();
        cfg.pruning_enabled = true;
        cfg.pruning_interval = interval;
    }

    /// Enable a timer-driven threshold-adaptation tick independent of
    /// fires, at the given cadence.
    pub fn enable_auto_tick(&self, interval: Duration) {
        let mut cfg = self.config.write();
        cfg.auto_tick_enabled = true;
        cfg.auto_tick_interval = interval;
    }

    /// Whether a timer-driven threshold tick is due.
    pub fn auto_tick_due(&self, now: Instant) -> bool {
        let cfg = self.config.read();
        cfg.auto_tick_enabled
            && self
                .state
                .lock()
                .last_auto_tick
                .map(|last| now.saturating_since(last) >= cfg.auto_tick_interval)
                .unwrap_or(true)
    }

    /// Recompute the threshold from the current rate estimate without
    /// advancing it, for a timer-driven tick that happens independent of
    /// any fire.
    pub fn run_auto_tick(&self, now: Instant, threshold_base: f64, threshold_current: f64) -> f64 {
        self.state.lock().last_auto_tick = Some(now);
        let cfg = self.config.read();
        let rate = self.state.lock().rate_ewma;
        if cfg.strength == 0.0 {
            return threshold_current;
        }
        let adjusted = threshold_current + cfg.strength * (rate - cfg.target_rate) * THRESHOLD_STEP;
        clamp(
            adjusted,
            threshold_base * THRESHOLD_CLAMP_LO,
            threshold_base * THRESHOLD_CLAMP_HI,
        )
    }

    /// Update the firing-rate EWMA and compute the new threshold at a fire.
    ///
    /// Returns the new `threshold_current`, already clamped to
    /// `[threshold_base * lo, threshold_base * hi]`.
    pub fn on_fire(&self, now: Instant, threshold_base: f64, threshold_current: f64) -> f64 {
        let mut state = self.state.lock();
        let cfg = self.config.read();
        if let Some(last) = state.last_fire_time {
            let interval = now.saturating_since(last).as_secs_f64();
            if interval > 0.0 {
                let instantaneous_rate = 1.0 / interval;
                state.rate_ewma = cfg.alpha * instantaneous_rate + (1.0 - cfg.alpha) * state.rate_ewma;
            }
        }
        state.last_fire_time = Some(now);
        let rate = state.rate_ewma;
        drop(state);

        if cfg.strength == 0.0 {
            return threshold_current;
        }
        let adjusted = threshold_current + cfg.strength * (rate - cfg.target_rate) * THRESHOLD_STEP;
        clamp(
            adjusted,
            threshold_base * THRESHOLD_CLAMP_LO,
            threshold_base * THRESHOLD_CLAMP_HI,
        )
    }

    /// Whether a timer-driven scaling pass is due.
    pub fn scaling_due(&self, now: Instant) -> bool {
        let cfg = self.config.read();
        cfg.synaptic_scaling_enabled
            && self
                .state
                .lock()
                .last_scaling_pass
                .map(|last| now.saturating_since(last) >= cfg.scaling_interval)
                .unwrap_or(true)
    }

    /// Whether a timer-driven pruning pass is due.
    pub fn pruning_due(&self, now: Instant) -> bool {
        let cfg = self.config.read();
        cfg.pruning_enabled
            && self
                .state
                .lock()
                .last_pruning_pass
                .map(|last| now.saturating_since(last) >= cfg.pruning_interval)
                .unwrap_or(true)
    }

    /// Run one synaptic-scaling pass.
    ///
    /// Lists incoming synapses, computes the total input strength, derives
    /// a multiplicative scaling factor, and writes each clamped weight
    /// back. Callback errors during listing or setting are counted and
    /// ignored; the controller simply retries next cadence.
    pub async fn run_scaling_pass(
        &self,
        now: Instant,
        callbacks: &dyn NeuronCallbacks,
        diagnostics: &Arc<Diagnostics>,
    ) {
        self.state.lock().last_scaling_pass = Some(now);
        let cfg = *self.config.read();
        if !cfg.synaptic_scaling_enabled {
            return;
        }
        let synapses = callbacks.list_synapses(SynapseQuery::all_incoming()).await;
        if synapses.is_empty() {
            return;
        }
        let total: f64 = synapses.iter().map(|s| s.weight).sum();
        let denom = cfg.target_input_strength.max(SCALING_EPSILON);
        let factor = 1.0 + cfg.scaling_rate * (cfg.target_input_strength - total) / denom;
        for syn in synapses {
            let target = syn.weight * factor;
            let new_weight = clamp(target, cfg.min_weight, cfg.max_weight);
            if new_weight != target {
                diagnostics.record_weight_clamped();
            }
            if callbacks.set_synapse_weight(syn.id, new_weight).await.is_err() {
                diagnostics.record_callback_error();
            }
        }
    }

    /// Run one pruning pass. Advisory: the matrix may
    /// refuse a deletion, which is counted but not treated as fatal.
    pub async fn run_pruning_pass(
        &self,
        now: Instant,
        callbacks: &dyn NeuronCallbacks,
        diagnostics: &Arc<Diagnostics>,
    ) {
        self.state.lock().last_pruning_pass = Some(now);
        let cfg = *self.config.read();
        if !cfg.pruning_enabled {
            return;
        }
        let synapses = callbacks.list_synapses(SynapseQuery::all_incoming()).await;
        for syn in synapses {
            let age = now.saturating_since(syn.last_activity);
            if syn.weight < cfg.pruning_weight_threshold && age >= cfg.pruning_min_age {
                match callbacks.delete_synapse(syn.id).await {
                    Ok(()) => diagnostics.record_synapse_pruned(),
                    Err(_) => diagnostics.record_callback_error(),
                }
            }
        }
    }
}

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HomeostasisParams {
        HomeostasisParams {
            strength: 0.3,
            target_rate: 10.0,
            averaging_horizon: Duration::from_millis(1000),
            synaptic_scaling_enabled: false,
            target_input_strength: 1.0,
            scaling_rate: 0.1,
            scaling_interval: Duration::from_millis(1000),
            min_weight: 0.0,
            max_weight: 10.0,
            pruning_enabled: false,
            pruning_interval: Duration::from_millis(1000),
            pruning_weight_threshold: 0.01,
            pruning_min_age: Duration::from_millis(1000),
        }
    }

    #[test]
    fn inert_when_strength_zero() {
        let mut p = params();
        p.strength = 0.0;
        let ctrl = HomeostasisController::new(p);
        assert!(ctrl.is_inert());
        let t = ctrl.on_fire(Instant::from_nanos(1_000_000), 1.0, 1.0);
        assert_eq!(t, 1.0);
    }

    #[test]
    fn below_target_rate_lowers_threshold() {
        let ctrl = HomeostasisController::new(params());
        let mut t = 1.0;
        let mut now = Instant::ZERO;
        // Drive at well below the 10Hz target (every 500ms == 2Hz).
        for _ in 0..200 {
            now = now.checked_add(Duration::from_millis(500));
            t = ctrl.on_fire(now, 1.0, t);
        }
        assert!(t < 1.0, "threshold should have dropped toward easier excitation, got {t}");
    }

    #[test]
    fn threshold_stays_within_clamp_bounds() {
        let mut p = params();
        p.strength = 1000.0; // absurdly large to try to break the clamp
        let ctrl = HomeostasisController::new(p);
        let mut t = 1.0;
        let mut now = Instant::ZERO;
        for _ in 0..50 {
            now = now.checked_add(Duration::from_millis(1));
            t = ctrl.on_fire(now, 1.0, t);
        }
        assert!(t >= THRESHOLD_CLAMP_LO && t <= THRESHOLD_CLAMP_HI);
    }

    #[test]
    fn scaling_bounds_respect_clamp() {
        let mut p = params();
        p.synaptic_scaling_enabled = true;
        p.target_input_strength = 3.0;
        p.scaling_rate = 0.5;
        p.min_weight = 0.0;
        p.max_weight = 10.0;
        let ctrl = HomeostasisController::new(p);
        // total = 9.0, target = 3.0 => factor = 1 + 0.5*(3-9)/3 = 0.0
        let cfg = *ctrl.config.read();
        let factor = 1.0 + cfg.scaling_rate * (cfg.target_input_strength - 9.0) / cfg.target_input_strength;
        let clamped = clamp(3.0 * factor, cfg.min_weight, cfg.max_weight);
        assert!(clamped >= cfg.min_weight && clamped <= cfg.max_weight);
    }
}
