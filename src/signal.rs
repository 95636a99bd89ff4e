//! The signal that flows between neurons.

use crate::ids::{NeuronId, SignalKind, SynapseId};
use crate::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An immutable timestamped signal delivered to a neuron's mailbox.
///
/// `timestamp` is assigned once, by the sender, at emission time; a receiver
/// never rewrites it. Excitatory signals carry `value > 0`,
/// inhibitory signals `value < 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeuralSignal {
    /// Signed contribution this signal carries. Sign convention: excitatory
    /// (> 0), inhibitory (< 0).
    pub value: f64,
    /// Instant the sender emitted this signal.
    pub timestamp: Instant,
    /// Neuron that emitted the signal.
    pub source_id: NeuronId,
    /// Neuron the signal is addressed to.
    pub target_id: NeuronId,
    /// Synapse the signal traveled across, if any (absent for direct
    /// injection, e.g. sensory input with no modeled synapse).
    pub synapse_id: Option<SynapseId>,
    /// Opaque signal kind, matrix-defined.
    pub signal_type: Option<SignalKind>,
}

impl NeuralSignal {
    /// Construct a signal with no synapse or type tag (direct injection).
    pub fn new(value: f64, timestamp: Instant, source_id: NeuronId, target_id: NeuronId) -> Self {
        Self {
            value,
            timestamp,
            source_id,
            target_id,
            synapse_id: None,
            signal_type: None,
        }
    }

    /// Attach a synapse id, builder-style.
    pub fn via_synapse(mut self, synapse_id: SynapseId) -> Self {
        self.synapse_id = Some(synapse_id);
        self
    }

    /// Attach a signal kind, builder-style.
    pub fn with_kind(mut self, kind: SignalKind) -> Self {
        self.signal_type = Some(kind);
        self
    }

    /// `true` if this signal is excitatory (`value > 0`).
    pub fn is_excitatory(&self) -> bool {
        self.value > 0.0
    }

    /// `true` if this signal is inhibitory (`value < 0`).
    pub fn is_inhibitory(&self) -> bool {
        self.value < 0.0
    }
}
