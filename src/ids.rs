//! Identifier and small enumeration types shared across the neuron engine.
//!
//! Newtype wrappers with `const fn` constructors and `Display` impls,
//! rather than `Option<u32>` or bare integers sprinkled through call sites.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a neuron, stable for the process lifetime of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeuronId(pub u64);

impl NeuronId {
    /// Construct a neuron id from a raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id value.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Identifier of a synapse. The neuron never owns the synapse this names —
/// it is handed back opaquely through callback results, avoiding a cyclic
/// reference between neuron and synapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SynapseId(pub u64);

impl SynapseId {
    /// Construct a synapse id from a raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id value.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SynapseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Direction of a synapse relative to the querying neuron.
///
/// The synapse's own type catalog lives with the matrix; the neuron only ever needs to say which side it is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SynapseDirection {
    /// Synapse delivers signals into this neuron.
    Incoming,
    /// Synapse carries signals away from this neuron.
    Outgoing,
}

/// Opaque ligand kind released on firing. The full ligand catalog is a
/// matrix-side concern; the neuron only carries an identifier it
/// was configured with and hands it back on `release_chemical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LigandKind(pub u16);

/// Opaque electrical/chemical signal kind, e.g. "ActionPotential". Full
/// enumeration lives with the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignalKind(pub u16);

impl SignalKind {
    /// The kind sent alongside `send_electrical_signal` on every fire.
    pub const ACTION_POTENTIAL: SignalKind = SignalKind(1);
}
