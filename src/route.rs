//! Outgoing wiring from a neuron to one synapse.
//!
//! The neuron does not store the synapse's weight; it asks for it through
//! these closures at fire time. Ownership: the neuron exclusively owns the
//! route table; synapses are referenced only through these closures,
//! breaking what would otherwise be a neuron/synapse reference cycle.

use crate::ids::{NeuronId, SynapseId};
use crate::signal::NeuralSignal;
use crate::time::Duration;
use std::fmt;
use std::sync::Arc;

/// A transmit closure: hand a signal to whatever sits on the other end of
/// this route (typically a synapse's `receive`, or directly a target
/// neuron's mailbox for zero-delay testing wiring).
pub type TransmitFn = Arc<dyn Fn(NeuralSignal) + Send + Sync>;
/// A weight getter: the current weight the synapse reports.
pub type WeightFn = Arc<dyn Fn() -> f64 + Send + Sync>;
/// A delay getter: the transmission delay the synapse reports.
pub type DelayFn = Arc<dyn Fn() -> Duration + Send + Sync>;
/// A target-id getter: which neuron this route ultimately reaches.
pub type TargetIdFn = Arc<dyn Fn() -> NeuronId + Send + Sync>;

/// One outgoing connection, referenced only through closures — never a
/// direct synapse handle.
#[derive(Clone)]
pub struct OutputRoute {
    /// Synapse id this route corresponds to.
    pub synapse_id: SynapseId,
    transmit: TransmitFn,
    weight: WeightFn,
    delay: DelayFn,
    target_id: TargetIdFn,
}

impl OutputRoute {
    /// Construct a route from its four capability closures.
    pub fn new(
        synapse_id: SynapseId,
        transmit: TransmitFn,
        weight: WeightFn,
        delay: DelayFn,
        target_id: TargetIdFn,
    ) -> Self {
        Self {
            synapse_id,
            transmit,
            weight,
            delay,
            target_id,
        }
    }

    /// Current weight, as reported by the synapse.
    pub fn weight(&self) -> f64 {
        (self.weight)()
    }

    /// Current transmission delay, as reported by the synapse.
    pub fn delay(&self) -> Duration {
        (self.delay)()
    }

    /// Target neuron id, as reported by the synapse.
    pub fn target_id(&self) -> NeuronId {
        (self.target_id)()
    }

    /// Invoke the transmit closure with an outbound signal.
    pub fn transmit(&self, signal: NeuralSignal) {
        (self.transmit)(signal);
    }
}

impl fmt::Debug for OutputRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputRoute")
            .field("synapse_id", &self.synapse_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NeuronId;
    use crate::time::Instant;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn transmit_invokes_closure() {
        let received = Arc::new(AtomicU64::new(0));
        let r = received.clone();
        let route = OutputRoute::new(
            SynapseId::new(1),
            Arc::new(move |s: NeuralSignal| {
                r.store(s.value.to_bits(), Ordering::SeqCst);
            }),
            Arc::new(|| 0.5),
            Arc::new(|| Duration::ZERO),
            Arc::new(|| NeuronId::new(2)),
        );
        assert_eq!(route.weight(), 0.5);
        route.transmit(NeuralSignal::new(
            1.0,
            Instant::ZERO,
            NeuronId::new(1),
            NeuronId::new(2),
        ));
        assert_eq!(received.load(Ordering::SeqCst), 1.0_f64.to_bits());
    }
}
