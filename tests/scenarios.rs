//! Cross-module scenario tests: a full [`Neuron`] driven end to end for the
//! STDP feedback path, and the homeostatic controller exercised directly
//! for threshold up-regulation and synaptic-scaling clamping.

use async_trait::async_trait;
use parking_lot::Mutex as PMutex;
use shnn_neuron_core::callbacks::ComponentInfo;
use shnn_neuron_core::config::{THRESHOLD_CLAMP_HI, THRESHOLD_CLAMP_LO};
use shnn_neuron_core::homeostasis::{HomeostasisController, HomeostasisParams};
use shnn_neuron_core::{
    ComponentState, Diagnostics, Duration, Instant, LigandKind, ManualClock, Neuron,
    NeuronCallbacks, NeuronConfigBuilder, NeuronError, NeuronId, NeuralSignal,
    PlasticityAdjustment, Result, SignalKind, SynapseDirection, SynapseHandle, SynapseId,
    SynapseInfo, SynapseQuery,
};
use std::sync::Arc;

#[derive(Default)]
struct RecordingCallbacks {
    synapses: Vec<SynapseInfo>,
    applied: PMutex<Vec<(SynapseId, PlasticityAdjustment)>>,
}

#[async_trait]
impl NeuronCallbacks for RecordingCallbacks {
    async fn create_synapse(
        &self,
        _config: shnn_neuron_core::SynapseCreateConfig,
    ) -> Result<SynapseId> {
        Ok(SynapseId::new(0))
    }
    async fn delete_synapse(&self, _id: SynapseId) -> Result<()> {
        Ok(())
    }
    async fn list_synapses(&self, _query: SynapseQuery) -> Vec<SynapseInfo> {
        self.synapses.clone()
    }
    async fn get_synapse(&self, _id: SynapseId) -> Result<Arc<dyn SynapseHandle>> {
        Err(NeuronError::CallbackUnavailable {
            capability: "get_synapse",
        })
    }
    async fn apply_plasticity(&self, id: SynapseId, adj: PlasticityAdjustment) -> Result<()> {
        self.applied.lock().push((id, adj));
        Ok(())
    }
    async fn get_synapse_weight(&self, _id: SynapseId) -> Result<f64> {
        Ok(1.0)
    }
    async fn set_synapse_weight(&self, _id: SynapseId, _weight: f64) -> Result<()> {
        Ok(())
    }
    async fn release_chemical(&self, _ligand: LigandKind, _concentration: f64) -> Result<()> {
        Ok(())
    }
    async fn send_electrical_signal(&self, _kind: SignalKind, _payload: &[u8]) {}
    async fn get_spatial_delay(&self, _target: NeuronId) -> Duration {
        Duration::ZERO
    }
    async fn find_nearby(&self, _radius: f64) -> Vec<ComponentInfo> {
        Vec::new()
    }
    async fn report_health(&self, _activity: f64, _connection_count: usize) {}
    async fn report_state_change(&self, _old: ComponentState, _new: ComponentState) {}
}

/// A post-synaptic fire whose triggering synapse arrived before it must be
/// scheduled, delivered, and land on the potentiation side of the STDP
/// sign convention — exercising `neuron`, `stdp` and `callbacks` together
/// rather than `stdp` in isolation.
#[tokio::test]
async fn fire_schedules_and_delivers_potentiating_feedback() {
    let clock = Arc::new(ManualClock::new());
    let config = NeuronConfigBuilder::new(
        NeuronId::new(1),
        1.0,
        1.0,
        Duration::from_millis(1),
        1.0,
        5.0,
        0.0,
    )
    .stdp_feedback(Duration::from_millis(5), 0.05)
    .build()
    .unwrap();

    let neuron = Neuron::from_config(config, clock.clone());
    let cb = Arc::new(RecordingCallbacks {
        synapses: vec![SynapseInfo {
            id: SynapseId::new(7),
            source_id: NeuronId::new(99),
            target_id: NeuronId::new(1),
            weight: 1.0,
            delay: Duration::ZERO,
            last_activity: Instant::ZERO,
            direction: SynapseDirection::Incoming,
            synapse_type: 0,
        }],
        applied: PMutex::new(Vec::new()),
    });
    neuron.set_callbacks(cb.clone());
    neuron.start().unwrap();

    // Fire at t=20ms, well inside the 50ms default STDP window relative to
    // the synapse's recorded last activity at t=0.
    clock.advance(Duration::from_millis(20));
    neuron.receive(NeuralSignal::new(1.5, clock.now(), NeuronId::new(99), NeuronId::new(1)).via_synapse(SynapseId::new(7)));
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(neuron.diagnostics().fires, 1);

    // Feedback was scheduled for fire_time + 5ms; advance past it and give
    // the housekeeping ticker a chance to deliver.
    clock.advance(Duration::from_millis(10));
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let applied = cb.applied.lock();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].0, SynapseId::new(7));
    assert!(applied[0].1.is_potentiating());
    drop(applied);

    neuron.stop().await.unwrap();
}

/// Firing well above the target rate must push the adapted threshold up,
/// clamped to the controller's documented bounds — `homeostasis` and
/// `config`'s clamp constants exercised together.
#[test]
fn sustained_overactivity_up_regulates_threshold() {
    let homeostasis = HomeostasisController::new(HomeostasisParams {
        strength: 1.0,
        target_rate: 1.0,
        averaging_horizon: Duration::from_millis(100),
        synaptic_scaling_enabled: false,
        target_input_strength: 0.0,
        scaling_rate: 0.0,
        scaling_interval: Duration::ZERO,
        min_weight: 0.0,
        max_weight: f64::MAX,
        pruning_enabled: false,
        pruning_interval: Duration::ZERO,
        pruning_weight_threshold: 0.0,
        pruning_min_age: Duration::ZERO,
    });

    let threshold_base = 1.0;
    let mut threshold_current = threshold_base;
    let mut now = Instant::ZERO;
    for _ in 0..50 {
        now = now.checked_add(Duration::from_millis(10)); // 100Hz, far above the 1Hz target
        threshold_current = homeostasis.on_fire(now, threshold_base, threshold_current);
    }

    assert!(threshold_current > threshold_base);
    assert!(threshold_current <= threshold_base * THRESHOLD_CLAMP_HI);
    assert!(threshold_current >= threshold_base * THRESHOLD_CLAMP_LO);
    assert!(homeostasis.current_rate() > 1.0);
}

/// A synaptic-scaling pass that would push weights past `max_weight` must
/// clamp them and count the clamp, rather than writing the unclamped value.
#[tokio::test]
async fn scaling_pass_clamps_weights_above_max() {
    let homeostasis = HomeostasisController::new(HomeostasisParams {
        strength: 0.0,
        target_rate: 0.0,
        averaging_horizon: Duration::from_millis(1000),
        synaptic_scaling_enabled: true,
        target_input_strength: 10.0,
        scaling_rate: 5.0,
        scaling_interval: Duration::from_millis(100),
        min_weight: 0.0,
        max_weight: 3.0,
        pruning_enabled: false,
        pruning_interval: Duration::ZERO,
        pruning_weight_threshold: 0.0,
        pruning_min_age: Duration::ZERO,
    });
    let diagnostics = Arc::new(Diagnostics::new());
    let cb = RecordingCallbacks {
        synapses: vec![
            SynapseInfo {
                id: SynapseId::new(1),
                source_id: NeuronId::new(1),
                target_id: NeuronId::new(2),
                weight: 1.0,
                delay: Duration::ZERO,
                last_activity: Instant::ZERO,
                direction: SynapseDirection::Incoming,
                synapse_type: 0,
            },
            SynapseInfo {
                id: SynapseId::new(2),
                source_id: NeuronId::new(1),
                target_id: NeuronId::new(2),
                weight: 1.0,
                delay: Duration::ZERO,
                last_activity: Instant::ZERO,
                direction: SynapseDirection::Incoming,
                synapse_type: 0,
            },
        ],
        applied: PMutex::new(Vec::new()),
    };

    homeostasis
        .run_scaling_pass(Instant::ZERO, &cb, &diagnostics)
        .await;

    let snapshot = diagnostics.snapshot();
    assert_eq!(snapshot.weights_clamped, 2);
}
