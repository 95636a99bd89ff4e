//! Immutable neuron configuration.
//!
//! A plain struct with a `Default` impl carrying documented constants,
//! validated through a builder rather than module-level mutable globals.

use crate::error::{NeuronError, Result};
use crate::ids::{LigandKind, NeuronId};
use crate::time::Duration;
use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which dendritic integration strategy a neuron runs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DendriticMode {
    /// Contribution equals the signal value unchanged.
    Passive,
    /// Buffers signals within a window and emits their sum.
    TemporalSummation {
        /// Width of the summation window.
        window: Duration,
    },
    /// Non-linear excitatory/inhibitory combination.
    ShuntingInhibition {
        /// Shunting strength `k`.
        k: f64,
        /// Width of the integration window.
        window: Duration,
        /// Optional spatial decay factor applied when the matrix supplies
        /// source position information.
        spatial_decay_factor: Option<f64>,
    },
    /// Supra-linear NMDA-like dendritic spike with optional coincidence
    /// detection.
    ActiveDendrite {
        /// Width of the integration window.
        window: Duration,
        /// Local dendritic-spike threshold.
        dendritic_threshold: f64,
        /// Amplification factor applied above threshold.
        amplification: f64,
        /// Optional coincidence-detection sub-config: N inputs within Δt.
        coincidence: Option<CoincidenceConfig>,
    },
}

impl Default for DendriticMode {
    fn default() -> Self {
        DendriticMode::Passive
    }
}

/// Coincidence-detection sub-config for [`DendriticMode::ActiveDendrite`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoincidenceConfig {
    /// Number of inputs required within the window.
    pub required_inputs: usize,
    /// Width of the coincidence window.
    pub within: Duration,
    /// Extra amplification applied when coincidence is detected.
    pub extra_amplification: f64,
}

/// Immutable, validated configuration for one neuron.
///
/// Construct via [`NeuronConfigBuilder`]; every field here is fixed for the
/// lifetime of the neuron.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeuronConfig {
    /// Neuron identifier.
    pub id: NeuronId,
    /// Opaque neuron-type tag, matrix-defined.
    pub neuron_type: u16,
    /// Base firing threshold, before homeostatic adaptation.
    pub threshold_base: f64,
    /// Geometric decay rate applied to the membrane accumulator, per unit
    /// time, in `(0, 1]`.
    pub decay_rate: f64,
    /// Refractory period after a fire.
    pub refractory_period: Duration,
    /// Multiplier applied to outgoing synaptic weight on fire.
    pub fire_factor: f64,
    /// Value the accumulator resets to after a fire.
    pub reset_value: f64,
    /// Target firing rate for the homeostatic controller, Hz.
    pub target_firing_rate: f64,
    /// Strength of the homeostatic threshold adaptation; `0.0` disables it.
    pub homeostasis_strength: f64,
    /// Ligand kinds this neuron's receptors respond to (matrix-side
    /// interpretation; the neuron only carries the set).
    pub receptors: HashSet<LigandKind>,
    /// Ligand kinds released on firing.
    pub released_ligands: HashSet<LigandKind>,
    /// Dendritic integration strategy.
    pub dendritic_mode: DendriticMode,
    /// Additive membrane noise jitter (standard deviation).
    pub membrane_noise: f64,
    /// Additive timestamp jitter applied before dendritic buffering.
    pub temporal_jitter: Duration,
    /// Whether STDP feedback is enabled on fire.
    pub enable_stdp_feedback: bool,
    /// Delay from a fire to STDP feedback delivery.
    pub stdp_feedback_delay: Duration,
    /// Default STDP learning rate magnitude.
    pub stdp_learning_rate: f64,
    /// Width of the STDP pre-spike history window.
    pub stdp_window: Duration,
    /// Whether the synaptic scaler is enabled at all.
    pub enable_synaptic_scaling: bool,
    /// Target total incoming synaptic strength for scaling.
    pub target_input_strength: f64,
    /// Scaling rate for synaptic rescaling.
    pub scaling_rate: f64,
    /// Cadence between synaptic-scaling passes.
    pub scaling_check_interval: Duration,
    /// Whether a timer-driven threshold-adaptation tick runs independent of
    /// fires.
    pub enable_auto_homeostasis: bool,
    /// Cadence between auto-homeostasis ticks.
    pub auto_homeostasis_interval: Duration,
    /// Whether periodic pruning is enabled.
    pub enable_auto_pruning: bool,
    /// Cadence between pruning passes.
    pub pruning_check_interval: Duration,
    /// Spatial position, for strategies that use it (e.g. shunting
    /// inhibition's spatial decay).
    pub position: Option<(f64, f64, f64)>,
}

/// Default safety clamps for homeostatic threshold adaptation.
pub const THRESHOLD_CLAMP_LO: f64 = 0.25;
/// See [`THRESHOLD_CLAMP_LO`].
pub const THRESHOLD_CLAMP_HI: f64 = 4.0;

impl Default for NeuronConfig {
    fn default() -> Self {
        Self {
            id: NeuronId::new(0),
            neuron_type: 0,
            threshold_base: 1.0,
            decay_rate: 0.1,
            refractory_period: Duration::from_millis(1),
            fire_factor: 1.0,
            reset_value: 0.0,
            target_firing_rate: 5.0,
            homeostasis_strength: 0.0,
            receptors: HashSet::new(),
            released_ligands: HashSet::new(),
            dendritic_mode: DendriticMode::Passive,
            membrane_noise: 0.0,
            temporal_jitter: Duration::ZERO,
            enable_stdp_feedback: false,
            stdp_feedback_delay: Duration::from_millis(10),
            stdp_learning_rate: 0.01,
            stdp_window: Duration::from_millis(50),
            enable_synaptic_scaling: false,
            target_input_strength: 1.0,
            scaling_rate: 0.1,
            scaling_check_interval: Duration::from_millis(1000),
            enable_auto_homeostasis: false,
            auto_homeostasis_interval: Duration::from_millis(1000),
            enable_auto_pruning: false,
            pruning_check_interval: Duration::from_millis(5000),
            position: None,
        }
    }
}

impl NeuronConfig {
    /// Validate invariants that the constructor alone cannot enforce.
    pub fn validate(&self) -> Result<()> {
        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            return Err(NeuronError::invariant(format!(
                "decay_rate must be in (0, 1], got {}",
                self.decay_rate
            )));
        }
        if self.threshold_base <= 0.0 {
            return Err(NeuronError::invariant(format!(
                "threshold_base must be > 0, got {}",
                self.threshold_base
            )));
        }
        Ok(())
    }
}

/// Builder for [`NeuronConfig`], the lone path to constructing one.
#[derive(Debug, Clone)]
pub struct NeuronConfigBuilder {
    config: NeuronConfig,
}

impl NeuronConfigBuilder {
    /// Start a builder from the neuron's required construction parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NeuronId,
        threshold: f64,
        decay_rate: f64,
        refractory: Duration,
        fire_factor: f64,
        target_rate: f64,
        homeostasis_strength: f64,
    ) -> Self {
        let mut config = NeuronConfig {
            id,
            threshold_base: threshold,
            decay_rate,
            refractory_period: refractory,
            fire_factor,
            target_firing_rate: target_rate,
            homeostasis_strength,
            ..NeuronConfig::default()
        };
        config.id = id;
        Self { config }
    }

    /// Set the dendritic integration strategy.
    pub fn dendritic_mode(mut self, mode: DendriticMode) -> Self {
        self.config.dendritic_mode = mode;
        self
    }

    /// Enable STDP feedback with a delay and default learning rate.
    pub fn stdp_feedback(mut self, delay: Duration, learning_rate: f64) -> Self {
        self.config.enable_stdp_feedback = true;
        self.config.stdp_feedback_delay = delay;
        self.config.stdp_learning_rate = learning_rate;
        self
    }

    /// Enable synaptic scaling.
    pub fn synaptic_scaling(mut self, target: f64, rate: f64, interval: Duration) -> Self {
        self.config.enable_synaptic_scaling = true;
        self.config.target_input_strength = target;
        self.config.scaling_rate = rate;
        self.config.scaling_check_interval = interval;
        self
    }

    /// Enable timer-driven threshold-adaptation ticks independent of fires.
    pub fn auto_homeostasis(mut self, interval: Duration) -> Self {
        self.config.enable_auto_homeostasis = true;
        self.config.auto_homeostasis_interval = interval;
        self
    }

    /// Enable periodic pruning.
    pub fn auto_pruning(mut self, interval: Duration) -> Self {
        self.config.enable_auto_pruning = true;
        self.config.pruning_check_interval = interval;
        self
    }

    /// Set membrane noise jitter (standard deviation).
    pub fn membrane_noise(mut self, noise: f64) -> Self {
        self.config.membrane_noise = noise;
        self
    }

    /// Set the spatial position.
    pub fn position(mut self, pos: (f64, f64, f64)) -> Self {
        self.config.position = Some(pos);
        self
    }

    /// Finish, validating invariants.
    pub fn build(self) -> Result<NeuronConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
