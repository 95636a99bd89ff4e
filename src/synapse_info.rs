//! Snapshots the matrix hands back about synapses it owns.
//!
//! The neuron never owns a [`SynapseInfo`] beyond the call that produced it —
//! it is a read-only view, consumed immediately.

use crate::ids::{NeuronId, SynapseDirection, SynapseId};
use crate::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of one synapse, as seen from the matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SynapseInfo {
    /// Synapse identifier.
    pub id: SynapseId,
    /// Pre-synaptic neuron.
    pub source_id: NeuronId,
    /// Post-synaptic neuron.
    pub target_id: NeuronId,
    /// Current weight.
    pub weight: f64,
    /// Transmission delay.
    pub delay: crate::time::Duration,
    /// Instant this synapse last carried a signal.
    pub last_activity: Instant,
    /// Direction relative to the neuron that requested the snapshot.
    pub direction: SynapseDirection,
    /// Opaque synapse-type tag (the type catalog is matrix-side).
    pub synapse_type: u16,
}

/// Query criteria for [`crate::callbacks::NeuronCallbacks::list_synapses`].
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SynapseQuery {
    /// Restrict to synapses in this direction, if set.
    pub direction: Option<SynapseDirection>,
    /// Restrict to synapses active at or after this instant, if set.
    pub activity_since: Option<Instant>,
    /// Restrict to synapses with weight in `[min, max]`, if set.
    pub weight_range: Option<(f64, f64)>,
    /// Restrict to this synapse type, if set.
    pub synapse_type: Option<u16>,
}

impl SynapseQuery {
    /// A query for all incoming synapses active since a given instant — the
    /// shape the STDP unit issues on feedback delivery.
    pub fn incoming_since(since: Instant) -> Self {
        Self {
            direction: Some(SynapseDirection::Incoming),
            activity_since: Some(since),
            weight_range: None,
            synapse_type: None,
        }
    }

    /// A query for all incoming synapses, unfiltered by activity — the
    /// shape the homeostatic controller issues for scaling.
    pub fn all_incoming() -> Self {
        Self {
            direction: Some(SynapseDirection::Incoming),
            activity_since: None,
            weight_range: None,
            synapse_type: None,
        }
    }
}
