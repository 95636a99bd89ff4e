//! The capability interface the neuron depends on.
//!
//! The matrix-facing surface is a single `async_trait` injected at
//! construction; absence of an environment is modeled by [`NoopCallbacks`]
//! rather than per-method presence checks scattered through the soma loop.

use crate::error::{NeuronError, Result};
use crate::ids::{LigandKind, NeuronId, SynapseId};
use crate::plasticity::PlasticityAdjustment;
use crate::synapse_info::{SynapseInfo, SynapseQuery};
use crate::time::Duration;
use async_trait::async_trait;
use std::sync::Arc;

/// Configuration for creating a new synapse.
#[derive(Debug, Clone, Copy)]
pub struct SynapseCreateConfig {
    /// Pre-synaptic neuron.
    pub source_id: NeuronId,
    /// Post-synaptic neuron.
    pub target_id: NeuronId,
    /// Initial weight.
    pub weight: f64,
    /// Opaque synapse-type tag.
    pub synapse_type: u16,
    /// Transmission delay.
    pub delay: Duration,
    /// Optional spatial position of the synapse.
    pub position: Option<(f64, f64, f64)>,
}

/// A lightweight description of a nearby component.
#[derive(Debug, Clone, Copy)]
pub struct ComponentInfo {
    /// Component's neuron id, if it is a neuron.
    pub id: NeuronId,
    /// Distance from the querying neuron.
    pub distance: f64,
}

/// The lifecycle states a `report_state_change` callback can name.
pub use crate::lifecycle::ComponentState;

/// A handle to a single synapse, as returned by
/// [`NeuronCallbacks::get_synapse`].
///
/// This is the stateful counterpart to the flattened, id-keyed
/// `apply_plasticity`/`get_synapse_weight`/`set_synapse_weight` methods on
/// [`NeuronCallbacks`] itself: callers that want to act on one synapse
/// repeatedly (check it, maybe prune it, maybe adjust it) can hold this
/// handle instead of re-passing the id on every call.
#[async_trait]
pub trait SynapseHandle: Send + Sync {
    /// Apply a plasticity adjustment to this synapse.
    async fn apply_plasticity(&self, adj: PlasticityAdjustment) -> Result<()>;

    /// Read this synapse's current weight.
    async fn get_weight(&self) -> Result<f64>;

    /// Write this synapse's weight; the synapse clamps and owns the value
    /// atomically.
    async fn set_weight(&self, weight: f64) -> Result<()>;

    /// Whether the matrix considers this synapse dysfunctional and a
    /// candidate for pruning (weak, stale, or otherwise unhealthy by
    /// matrix-side criteria the neuron does not need to know).
    async fn should_prune(&self) -> bool;
}

/// The capability set a neuron requires from its environment (the
/// "matrix"), injected at construction and never owned by the neuron.
///
/// Every method must be safe to call from the soma task and is expected to
/// return promptly — the soma task assumes callback latency is well under
/// the refractory period.
#[async_trait]
pub trait NeuronCallbacks: Send + Sync {
    /// Create a new synapse, returning its id.
    async fn create_synapse(&self, config: SynapseCreateConfig) -> Result<SynapseId>;

    /// Delete a synapse.
    async fn delete_synapse(&self, id: SynapseId) -> Result<()>;

    /// List synapses matching the given criteria. Never returns an error;
    /// an empty list stands in for "none matched" or "unavailable".
    async fn list_synapses(&self, query: SynapseQuery) -> Vec<SynapseInfo>;

    /// Get a handle to one synapse, exposing `apply_plasticity`,
    /// `get_weight`/`set_weight` and `should_prune` without re-passing the
    /// id on every call. Distinct from the flattened, id-keyed methods
    /// below, which remain the cheaper path for a single one-off call.
    async fn get_synapse(&self, id: SynapseId) -> Result<Arc<dyn SynapseHandle>>;

    /// Apply a plasticity adjustment to one synapse.
    async fn apply_plasticity(&self, id: SynapseId, adj: PlasticityAdjustment) -> Result<()>;

    /// Read a synapse's current weight.
    async fn get_synapse_weight(&self, id: SynapseId) -> Result<f64>;

    /// Write a synapse's weight; the synapse clamps and owns the value
    /// atomically.
    async fn set_synapse_weight(&self, id: SynapseId, weight: f64) -> Result<()>;

    /// Release a chemical ligand into the environment.
    async fn release_chemical(&self, ligand: LigandKind, concentration: f64) -> Result<()>;

    /// Fire-and-forget electrical signal, e.g. the action-potential
    /// broadcast on every fire.
    async fn send_electrical_signal(&self, kind: crate::ids::SignalKind, payload: &[u8]);

    /// Spatial transmission delay to a target, defaulting to zero.
    async fn get_spatial_delay(&self, target: NeuronId) -> Duration;

    /// Nearby components within a radius.
    async fn find_nearby(&self, radius: f64) -> Vec<ComponentInfo>;

    /// Fire-and-forget health report.
    async fn report_health(&self, activity: f64, connection_count: usize);

    /// Fire-and-forget lifecycle state-change notification.
    async fn report_state_change(&self, old: ComponentState, new: ComponentState);
}

/// A capability set that answers every query with "unavailable" or an
/// empty/default result, never panicking.
///
/// The neuron must tolerate the entire interface being absent.
/// Feature-gated operations degrade to errors visible only to their direct
/// caller; the soma loop proceeds regardless.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

#[async_trait]
impl NeuronCallbacks for NoopCallbacks {
    async fn create_synapse(&self, _config: SynapseCreateConfig) -> Result<SynapseId> {
        Err(NeuronError::CallbackUnavailable {
            capability: "create_synapse",
        })
    }

    async fn delete_synapse(&self, _id: SynapseId) -> Result<()> {
        Err(NeuronError::CallbackUnavailable {
            capability: "delete_synapse",
        })
    }

    async fn list_synapses(&self, _query: SynapseQuery) -> Vec<SynapseInfo> {
        Vec::new()
    }

    async fn get_synapse(&self, _id: SynapseId) -> Result<Arc<dyn SynapseHandle>> {
        Err(NeuronError::CallbackUnavailable {
            capability: "get_synapse",
        })
    }

    async fn apply_plasticity(&self, _id: SynapseId, _adj: PlasticityAdjustment) -> Result<()> {
        Err(NeuronError::CallbackUnavailable {
            capability: "apply_plasticity",
        })
    }

    async fn get_synapse_weight(&self, _id: SynapseId) -> Result<f64> {
        Err(NeuronError::CallbackUnavailable {
            capability: "get_synapse_weight",
        })
    }

    async fn set_synapse_weight(&self, _id: SynapseId, _weight: f64) -> Result<()> {
        Err(NeuronError::CallbackUnavailable {
            capability: "set_synapse_weight",
        })
    }

    async fn release_chemical(&self, _ligand: LigandKind, _concentration: f64) -> Result<()> {
        Err(NeuronError::CallbackUnavailable {
            capability: "release_chemical",
        })
    }

    async fn send_electrical_signal(&self, _kind: crate::ids::SignalKind, _payload: &[u8]) {}

    async fn get_spatial_delay(&self, _target: NeuronId) -> Duration {
        Duration::ZERO
    }

    async fn find_nearby(&self, _radius: f64) -> Vec<ComponentInfo> {
        Vec::new()
    }

    async fn report_health(&self, _activity: f64, _connection_count: usize) {}

    async fn report_state_change(&self, _old: ComponentState, _new: ComponentState) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_lists_are_empty_never_panic() {
        let cb = NoopCallbacks;
        assert!(cb.list_synapses(SynapseQuery::all_incoming()).await.is_empty());
        assert!(cb.find_nearby(10.0).await.is_empty());
    }

    #[tokio::test]
    async fn noop_direct_caller_ops_error_verbatim() {
        let cb = NoopCallbacks;
        let err = cb
            .create_synapse(SynapseCreateConfig {
                source_id: NeuronId::new(1),
                target_id: NeuronId::new(2),
                weight: 0.5,
                synapse_type: 0,
                delay: Duration::ZERO,
                position: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NeuronError::CallbackUnavailable { .. }));
    }
}
