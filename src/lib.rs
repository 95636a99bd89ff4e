//! Per-neuron concurrent engine for spiking neural networks.
//!
//! A [`neuron::Neuron`] is an autonomous cooperative task: it integrates
//! timestamped [`signal::NeuralSignal`]s through a pluggable
//! [`dendritic::DendriticStrategy`], fires when its membrane accumulator
//! crosses threshold, and participates in spike-timing-dependent plasticity
//! ([`stdp`]) and activity-dependent homeostasis ([`homeostasis`]). It never
//! owns the synapses or "matrix" environment it cooperates with — those are
//! reached only through the [`callbacks::NeuronCallbacks`] capability
//! interface injected at construction.
//!
//! This crate does not implement synapse storage, network assembly, or
//! neuron-factory presets; it is the single-neuron runtime those layers are
//! built on top of.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod callbacks;
pub mod config;
pub mod dendritic;
pub mod diagnostics;
pub mod error;
pub mod history;
pub mod homeostasis;
pub mod ids;
pub mod lifecycle;
pub mod mailbox;
pub mod membrane;
pub mod neuron;
pub mod plasticity;
pub mod route;
pub mod signal;
pub mod stdp;
pub mod synapse_info;
pub mod time;

pub use callbacks::{NeuronCallbacks, NoopCallbacks, SynapseCreateConfig, SynapseHandle};
pub use config::{DendriticMode, NeuronConfig, NeuronConfigBuilder};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use error::{NeuronError, Result};
pub use ids::{LigandKind, NeuronId, SignalKind, SynapseDirection, SynapseId};
pub use lifecycle::ComponentState;
pub use neuron::{new_neuron, ConnectionMetrics, Neuron};
pub use plasticity::PlasticityAdjustment;
pub use route::OutputRoute;
pub use signal::NeuralSignal;
pub use synapse_info::{SynapseInfo, SynapseQuery};
pub use time::{Clock, Duration, Instant, ManualClock, SignedDuration, SystemClock};

/// Crate version, for matrix-side compatibility checks against this engine.
pub const NEURON_CORE_VERSION: u32 = 1;
