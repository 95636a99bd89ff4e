//! The neuron runtime: mailbox, soma task, and public API.
//!
//! This is the component every other module in this crate exists to serve.
//! A [`Neuron`] is a cheap, `Clone`-able handle onto an `Arc<Inner>`; the
//! soma task itself is `tokio::spawn`ed against that same `Arc` so the
//! handle can be held by callers while the task independently drains the
//! mailbox. `Inner` exclusively owns `MembraneState`, the dendritic
//! strategy's buffers and the output-route table — every mutation of those
//! happens either inside the soma task or behind one of their short,
//! dedicated critical sections (never both at once from outside the task).

use crate::callbacks::{ComponentInfo, NeuronCallbacks, NoopCallbacks, SynapseCreateConfig};
use crate::config::{DendriticMode, NeuronConfig, NeuronConfigBuilder};
use crate::dendritic::DendriticStrategy;
use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::error::{NeuronError, Result};
use crate::history::PreSpikeHistory;
use crate::homeostasis::{HomeostasisController, HomeostasisParams};
use crate::ids::{LigandKind, NeuronId, SignalKind, SynapseId};
use crate::lifecycle::ComponentState;
use crate::mailbox::Mailbox;
use crate::membrane::MembraneState;
use crate::plasticity::PlasticityAdjustment;
use crate::route::OutputRoute;
use crate::signal::NeuralSignal;
use crate::stdp::StdpUnit;
use crate::synapse_info::SynapseQuery;
use crate::time::{Clock, Duration, Instant, SystemClock};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Default bounded mailbox capacity, used by [`new_neuron`].
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Default grace period `stop()` allows the soma task to finish draining
/// its mailbox before it is forcibly cancelled.
pub const DEFAULT_STOP_GRACE_PERIOD: Duration = Duration::from_millis(50);

/// How often the soma task wakes on its own (independent of mailbox
/// arrivals) to check STDP delivery, homeostasis ticks, scaling and
/// pruning cadences, and to flush a dendritic strategy's `tick`.
const DEFAULT_HOUSEKEEPING_PERIOD: Duration = Duration::from_millis(1);

/// A snapshot of a neuron's outgoing wiring, for introspection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionMetrics {
    /// Number of registered outgoing routes.
    pub outgoing_count: usize,
    /// Sum of the current weight reported by every outgoing route.
    pub total_outgoing_weight: f64,
}

struct Inner {
    config: NeuronConfig,
    clock: Arc<dyn Clock>,
    membrane: Mutex<MembraneState>,
    dendritic: Mutex<DendriticStrategy>,
    routes: RwLock<HashMap<SynapseId, OutputRoute>>,
    stdp: StdpUnit,
    homeostasis: HomeostasisController,
    diagnostics: Arc<Diagnostics>,
    mailbox: Mailbox,
    callbacks: RwLock<Arc<dyn NeuronCallbacks>>,
    state: RwLock<ComponentState>,
    soma_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: Notify,
    grace_period: Duration,
    receptors: RwLock<HashSet<LigandKind>>,
    released_ligands: RwLock<HashSet<LigandKind>>,
    position: RwLock<Option<(f64, f64, f64)>>,
    metadata: RwLock<HashMap<String, String>>,
    /// Local bookkeeping mirror of pre-synaptic arrivals, kept alongside
    /// [`StdpUnit`]'s own history for introspection (`connection_count`-style
    /// queries); feedback delivery itself goes through the matrix, not this.
    recent_arrivals: Mutex<PreSpikeHistory>,
}

/// A per-neuron concurrent engine: the soma task, its plasticity
/// subsystems, and the public API a matrix or test harness drives it with.
///
/// Cheap to clone; every clone refers to the same underlying soma task and
/// state.
#[derive(Clone)]
pub struct Neuron {
    inner: Arc<Inner>,
}

/// Construct a neuron from its required parameters. Remaining configuration
/// is applied via setters and [`Neuron::set_callbacks`].
///
/// Returns an error if the parameters violate [`NeuronConfig::validate`]
/// (e.g. a non-positive decay rate).
#[allow(clippy::too_many_arguments)]
pub fn new_neuron(
    id: NeuronId,
    threshold: f64,
    decay_rate: f64,
    refractory: Duration,
    fire_factor: f64,
    target_rate: f64,
    homeostasis_strength: f64,
) -> Result<Neuron> {
    let config = NeuronConfigBuilder::new(
        id,
        threshold,
        decay_rate,
        refractory,
        fire_factor,
        target_rate,
        homeostasis_strength,
    )
    .build()?;
    Ok(Neuron::from_config(config, Arc::new(SystemClock::new())))
}

impl Neuron {
    /// Construct a neuron from a fully-built [`NeuronConfig`] and an
    /// explicit [`Clock`], the shape tests use to inject a
    /// [`crate::time::ManualClock`].
    pub fn from_config(config: NeuronConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_mailbox_capacity(config, clock, DEFAULT_MAILBOX_CAPACITY)
    }

    /// Like [`Neuron::from_config`] but with an explicit mailbox capacity.
    pub fn with_mailbox_capacity(config: NeuronConfig, clock: Arc<dyn Clock>, capacity: usize) -> Self {
        let now = clock.now();
        let diagnostics = Arc::new(Diagnostics::new());
        let homeostasis = HomeostasisController::new(HomeostasisParams {
            strength: config.homeostasis_strength,
            target_rate: config.target_firing_rate,
            averaging_horizon: Duration::from_millis(1000),
            synaptic_scaling_enabled: config.enable_synaptic_scaling,
            target_input_strength: config.target_input_strength,
            scaling_rate: config.scaling_rate,
            scaling_interval: config.scaling_check_interval,
            min_weight: 0.0,
            max_weight: f64::MAX,
            pruning_enabled: config.enable_auto_pruning,
            pruning_interval: config.pruning_check_interval,
            pruning_weight_threshold: 0.0,
            pruning_min_age: Duration::ZERO,
        });
        if config.enable_auto_homeostasis {
            homeostasis.enable_auto_tick(config.auto_homeostasis_interval);
        }
        let inner = Inner {
            dendritic: Mutex::new(DendriticStrategy::from_mode(config.dendritic_mode)),
            stdp: StdpUnit::new(
                config.enable_stdp_feedback,
                config.stdp_feedback_delay,
                config.stdp_learning_rate,
                config.stdp_window,
            ),
            homeostasis,
            mailbox: Mailbox::new(capacity, diagnostics.clone()),
            membrane: Mutex::new(MembraneState::new(
                config.threshold_base,
                config.decay_rate,
                config.reset_value,
                now,
            )),
            routes: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(Arc::new(NoopCallbacks) as Arc<dyn NeuronCallbacks>),
            state: RwLock::new(ComponentState::Created),
            soma_handle: Mutex::new(None),
            shutdown: Notify::new(),
            grace_period: DEFAULT_STOP_GRACE_PERIOD,
            receptors: RwLock::new(config.receptors.clone()),
            released_ligands: RwLock::new(config.released_ligands.clone()),
            position: RwLock::new(config.position),
            metadata: RwLock::new(HashMap::new()),
            recent_arrivals: Mutex::new(PreSpikeHistory::with_window(config.stdp_window)),
            diagnostics,
            clock,
            config,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Override the grace period `stop()` allows the soma task to finish
    /// draining before it is forcibly cancelled.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.grace_period = grace_period;
        }
        self
    }

    /// Neuron identifier.
    pub fn id(&self) -> NeuronId {
        self.inner.config.id
    }

    /// Opaque neuron-type tag (named `kind` since `type` is a Rust keyword).
    pub fn kind(&self) -> u16 {
        self.inner.config.neuron_type
    }

    /// Diagnostics counters for this neuron.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.inner.diagnostics.snapshot()
    }

    /// Install the matrix-facing callback interface. Intended to be called
    /// before [`Neuron::start`]; calling it after start is permitted (the
    /// soma task always reads the current value) but matrix-dependent
    /// operations issued by the outgoing soma task in the meantime simply
    /// see whatever was installed at the time.
    pub fn set_callbacks(&self, callbacks: Arc<dyn NeuronCallbacks>) {
        *self.inner.callbacks.write() = callbacks;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ComponentState {
        *self.inner.state.read()
    }

    /// Whether the soma task is actively draining its mailbox.
    pub fn is_active(&self) -> bool {
        self.inner.state.read().is_running()
    }

    /// Require the soma task to be running, for direct-caller operations
    /// that only make sense against a live neuron.
    fn ensure_running(&self) -> Result<()> {
        if self.inner.state.read().is_running() {
            Ok(())
        } else {
            Err(NeuronError::NotRunning {
                neuron_id: self.inner.config.id.raw(),
            })
        }
    }

    /// Start the soma task. Fails with [`NeuronError::AlreadyRunning`] if
    /// called twice, or after the neuron has stopped (re-entry into
    /// `Running` is forbidden).
    pub fn start(&self) -> Result<()> {
        let mut state = self.inner.state.write();
        if !state.can_start() {
            return Err(NeuronError::AlreadyRunning {
                neuron_id: self.inner.config.id.raw(),
            });
        }
        *state = ComponentState::Running;
        drop(state);

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            Inner::run(inner).await;
        });
        *self.inner.soma_handle.lock() = Some(handle);
        Ok(())
    }

    /// Stop the soma task, using the default grace period. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        self.stop_with_grace(self.inner.grace_period).await
    }

    /// Stop the soma task, bounding the drain by an explicit grace period.
    pub async fn stop_with_grace(&self, grace_period: Duration) -> Result<()> {
        {
            let mut state = self.inner.state.write();
            match *state {
                ComponentState::Stopped | ComponentState::Errored => return Ok(()),
                ComponentState::Created => {
                    *state = ComponentState::Stopped;
                    return Ok(());
                }
                ComponentState::Stopping => {}
                ComponentState::Running => *state = ComponentState::Stopping,
            }
        }
        self.inner.shutdown.notify_one();

        let handle = self.inner.soma_handle.lock().take();
        if let Some(handle) = handle {
            let abort_handle = handle.abort_handle();
            match tokio::time::timeout(grace_period.as_std(), handle).await {
                Ok(_) => {
                    let mut state = self.inner.state.write();
                    if *state != ComponentState::Errored {
                        *state = ComponentState::Stopped;
                    }
                }
                Err(_elapsed) => {
                    log::error!(
                        "neuron {} did not drain within grace period, cancelling",
                        self.inner.config.id
                    );
                    abort_handle.abort();
                    *self.inner.state.write() = ComponentState::Errored;
                }
            }
        }
        Ok(())
    }

    /// Enqueue a signal for asynchronous processing. Non-blocking; safe to
    /// call from any task. On mailbox overflow the oldest pending signal is
    /// dropped and a counter is incremented — never surfaced as an error.
    pub fn receive(&self, signal: NeuralSignal) {
        self.inner.mailbox.send(signal);
    }

    /// Swap the dendritic integration strategy. Rejected while the current
    /// strategy holds buffered, undelivered input.
    pub fn set_dendritic_mode(&self, mode: DendriticMode) -> Result<()> {
        self.inner.dendritic.lock().swap(mode)
    }

    /// Register an outgoing connection.
    pub fn add_output_route(&self, route: OutputRoute) {
        self.inner.routes.write().insert(route.synapse_id, route);
    }

    /// Remove a previously registered outgoing connection.
    pub fn remove_output_route(&self, id: SynapseId) {
        self.inner.routes.write().remove(&id);
    }

    /// Current firing threshold (base, adapted by homeostasis).
    pub fn current_threshold(&self) -> f64 {
        self.inner.membrane.lock().threshold_current
    }

    /// Immutable base threshold fixed at construction.
    pub fn get_base_threshold(&self) -> f64 {
        self.inner.config.threshold_base
    }

    /// Override the current threshold directly, bypassing homeostatic
    /// adaptation. Serialized against the soma loop by the membrane's short
    /// critical section.
    pub fn set_threshold(&self, threshold: f64) {
        self.inner.membrane.lock().threshold_current = threshold;
    }

    /// Recent activity level: the same firing-rate EWMA homeostasis tracks,
    /// mirrored onto `MembraneState` for introspection without touching the
    /// homeostasis controller's lock.
    pub fn activity_level(&self) -> f64 {
        self.inner.membrane.lock().activity_ewma
    }

    /// The homeostatic controller's own firing-rate estimate, Hz. Equal to
    /// [`Neuron::activity_level`] by construction; exposed separately as its
    /// own named introspection point.
    pub fn current_firing_rate(&self) -> f64 {
        self.inner.homeostasis.current_rate()
    }

    /// A proxy for intracellular calcium concentration, standing in for the
    /// activity-dependent signal real calcium imaging would report. This
    /// crate does not model calcium dynamics; it reuses the firing-rate
    /// EWMA, the same activity signal homeostasis already tracks.
    pub fn calcium_level(&self) -> f64 {
        self.activity_level()
    }

    /// Number of registered outgoing routes.
    pub fn connection_count(&self) -> usize {
        self.inner.routes.read().len()
    }

    /// Number of pre-synaptic arrivals currently held in the local
    /// bookkeeping history (bounded by the STDP window and capacity).
    pub fn pre_spike_history_len(&self) -> usize {
        self.inner.recent_arrivals.lock().len()
    }

    /// Outgoing-wiring metrics: count and total weight across every
    /// registered route (each weight read fresh from its synapse).
    pub fn get_connection_metrics(&self) -> ConnectionMetrics {
        let routes = self.inner.routes.read();
        let total_outgoing_weight = routes.values().map(|r| r.weight()).sum();
        ConnectionMetrics {
            outgoing_count: routes.len(),
            total_outgoing_weight,
        }
    }

    /// Replace the set of ligand kinds this neuron's receptors respond to.
    pub fn set_receptors(&self, receptors: HashSet<LigandKind>) {
        *self.inner.receptors.write() = receptors;
    }

    /// Replace the set of ligand kinds released on firing.
    pub fn set_released_ligands(&self, ligands: HashSet<LigandKind>) {
        *self.inner.released_ligands.write() = ligands;
    }

    /// Set the neuron's spatial position.
    pub fn set_position(&self, position: (f64, f64, f64)) {
        *self.inner.position.write() = Some(position);
    }

    /// Insert or replace one metadata key/value pair.
    pub fn update_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.metadata.write().insert(key.into(), value.into());
    }

    /// Read back a metadata value, if set.
    pub fn metadata(&self, key: &str) -> Option<String> {
        self.inner.metadata.read().get(key).cloned()
    }

    /// Enable the synaptic scaler at a given target strength, rate and
    /// cadence.
    pub fn enable_synaptic_scaling(&self, target: f64, rate: f64, interval: Duration) {
        self.inner.homeostasis.enable_synaptic_scaling(target, rate, interval);
    }

    /// Enable STDP feedback on fire, with a delay and default learning
    /// rate.
    pub fn enable_stdp_feedback(&self, delay: Duration, rate: f64) {
        self.inner.stdp.enable(delay, rate);
    }

    /// Enable a timer-driven threshold-adaptation tick independent of
    /// fires.
    pub fn enable_auto_homeostasis(&self, interval: Duration) {
        self.inner.homeostasis.enable_auto_tick(interval);
    }

    /// Enable periodic pruning of dysfunctional incoming synapses.
    pub fn enable_auto_pruning(&self, interval: Duration) {
        self.inner.homeostasis.enable_pruning(interval);
    }

    /// Force an immediate STDP feedback delivery, bypassing the normal
    /// schedule-then-tick path. Returns the number of adjustments
    /// attempted. Fails with [`NeuronError::NotRunning`] if the soma task
    /// has not been started (or has since stopped).
    pub async fn send_stdp_feedback(&self) -> Result<usize> {
        self.ensure_running()?;
        let now = self.inner.clock.now();
        let callbacks = self.inner.callbacks.read().clone();
        Ok(self.inner.stdp.deliver_now(now, callbacks.as_ref()).await)
    }

    /// Force an immediate synaptic-scaling pass. Fails with
    /// [`NeuronError::NotRunning`] if the soma task is not running.
    pub async fn perform_homeostasis_scaling(&self) -> Result<()> {
        self.ensure_running()?;
        let now = self.inner.clock.now();
        let callbacks = self.inner.callbacks.read().clone();
        self.inner
            .homeostasis
            .run_scaling_pass(now, callbacks.as_ref(), &self.inner.diagnostics)
            .await;
        Ok(())
    }

    /// Force an immediate pruning pass over dysfunctional incoming
    /// synapses. Fails with [`NeuronError::NotRunning`] if the soma task is
    /// not running.
    pub async fn prune_dysfunctional_synapses(&self) -> Result<()> {
        self.ensure_running()?;
        let now = self.inner.clock.now();
        let callbacks = self.inner.callbacks.read().clone();
        self.inner
            .homeostasis
            .run_pruning_pass(now, callbacks.as_ref(), &self.inner.diagnostics)
            .await;
        Ok(())
    }

    /// Convenience wiring helper: ask the matrix to create a synapse from
    /// this neuron to `target`. Fails with [`NeuronError::NotRunning`] if
    /// the soma task is not running, otherwise returns whatever
    /// [`NeuronCallbacks::create_synapse`] returns, verbatim — including
    /// [`NeuronError::CallbackUnavailable`] when no matrix is installed.
    pub async fn connect_to_neuron(&self, target: NeuronId, weight: f64, synapse_type: u16) -> Result<SynapseId> {
        self.ensure_running()?;
        let callbacks = self.inner.callbacks.read().clone();
        let delay = callbacks.get_spatial_delay(target).await;
        callbacks
            .create_synapse(SynapseCreateConfig {
                source_id: self.inner.config.id,
                target_id: target,
                weight,
                synapse_type,
                delay,
                position: *self.inner.position.read(),
            })
            .await
    }

    /// Nearby components within a radius, as reported by the matrix. Fails
    /// with [`NeuronError::NotRunning`] if the soma task is not running.
    pub async fn find_nearby(&self, radius: f64) -> Result<Vec<ComponentInfo>> {
        self.ensure_running()?;
        let callbacks = self.inner.callbacks.read().clone();
        Ok(callbacks.find_nearby(radius).await)
    }
}

impl Inner {
    async fn run(self: Arc<Self>) {
        let housekeeping_period = self.housekeeping_period().as_std();
        let mut ticker = tokio::time::interval(housekeeping_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await; // first tick fires immediately; consume it

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => break,
                signal = self.mailbox.recv() => {
                    self.process_signal(signal).await;
                }
                _ = ticker.tick() => {
                    self.run_housekeeping().await;
                }
            }
            if self.state.read().is_terminal() {
                break;
            }
        }
        self.graceful_drain_and_report().await;
    }

    /// The shortest cadence any enabled timer-driven feature needs,
    /// clamped to a sane minimum so the loop never busy-spins.
    fn housekeeping_period(&self) -> Duration {
        let mut period = DEFAULT_HOUSEKEEPING_PERIOD;
        if self.stdp.is_enabled() {
            period = min_duration(period, self.stdp.feedback_delay());
        }
        if self.config.enable_auto_homeostasis {
            period = min_duration(period, self.config.auto_homeostasis_interval);
        }
        if self.config.enable_synaptic_scaling {
            period = min_duration(period, self.config.scaling_check_interval);
        }
        if self.config.enable_auto_pruning {
            period = min_duration(period, self.config.pruning_check_interval);
        }
        if period.as_nanos() == 0 {
            period = Duration::from_micros(100);
        }
        period
    }

    async fn process_signal(self: &Arc<Self>, signal: NeuralSignal) {
        let now = self.clock.now();

        if let Some(syn_id) = signal.synapse_id {
            self.recent_arrivals.lock().record(syn_id, signal.timestamp);
            self.stdp.record_pre_spike(syn_id, signal.timestamp);
        }

        {
            let mut membrane = self.membrane.lock();
            if now < membrane.last_update {
                drop(membrane);
                self.fail_invariant("clock moved backwards since last update").await;
                return;
            }
            membrane.apply_leak(now);
        }

        let jittered = self.apply_jitter(signal);
        let contribution = self.dendritic.lock().handle(jittered);
        if let Some(contribution) = contribution {
            self.apply_contribution(now, contribution).await;
        }
    }

    /// Additive membrane noise and temporal jitter, applied before the
    /// signal reaches the dendritic strategy.
    fn apply_jitter(&self, signal: NeuralSignal) -> NeuralSignal {
        if self.config.membrane_noise == 0.0 && self.config.temporal_jitter == Duration::ZERO {
            return signal;
        }
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut jittered = signal;
        if self.config.membrane_noise != 0.0 {
            jittered.value += rng.gen_range(-self.config.membrane_noise..=self.config.membrane_noise);
        }
        if self.config.temporal_jitter != Duration::ZERO {
            let jitter_ns = rng.gen_range(0..=self.config.temporal_jitter.as_nanos());
            jittered.timestamp = jittered.timestamp.checked_add(Duration::from_nanos(jitter_ns));
        }
        jittered
    }

    async fn run_housekeeping(self: &Arc<Self>) {
        let now = self.clock.now();

        let due = self.dendritic.lock().tick(now);
        if let Some(contribution) = due {
            self.apply_contribution(now, contribution).await;
        }

        let callbacks = self.callbacks.read().clone();
        let delivered = self.stdp.check_and_deliver(now, callbacks.as_ref()).await;
        if delivered > 0 {
            for _ in 0..delivered {
                self.diagnostics.record_plasticity_delivered();
            }
        }

        if self.homeostasis.auto_tick_due(now) {
            let mut membrane = self.membrane.lock();
            let base = membrane.threshold_base;
            let current = membrane.threshold_current;
            membrane.threshold_current = self.homeostasis.run_auto_tick(now, base, current);
        }

        if self.homeostasis.scaling_due(now) {
            self.homeostasis.run_scaling_pass(now, callbacks.as_ref(), &self.diagnostics).await;
        }

        if self.homeostasis.pruning_due(now) {
            self.homeostasis.run_pruning_pass(now, callbacks.as_ref(), &self.diagnostics).await;
        }
    }

    /// Integrate a dendritic contribution and fire if threshold is crossed
    /// and the neuron is not refractory. Shared by both signal-triggered
    /// and timer-triggered (`tick`) contributions.
    async fn apply_contribution(self: &Arc<Self>, now: Instant, contribution: f64) {
        let fired = {
            let mut membrane = self.membrane.lock();
            membrane.integrate(contribution);
            if membrane.is_refractory(now) {
                false
            } else if membrane.crosses_threshold() {
                membrane.apply_fire_reset(now, self.config.refractory_period);
                let base = membrane.threshold_base;
                let current = membrane.threshold_current;
                membrane.threshold_current = self.homeostasis.on_fire(now, base, current);
                membrane.activity_ewma = self.homeostasis.current_rate();
                true
            } else {
                false
            }
        };
        if fired {
            self.on_fire(now).await;
        }
    }

    async fn on_fire(self: &Arc<Self>, now: Instant) {
        self.diagnostics.record_fire();

        let routes: Vec<OutputRoute> = self.routes.read().values().cloned().collect();
        for route in &routes {
            let weight = route.weight();
            let out = NeuralSignal::new(self.config.fire_factor * weight, now, self.config.id, route.target_id())
                .via_synapse(route.synapse_id);
            let route = route.clone();
            let synapse_id = route.synapse_id;
            let result = std::panic::catch_unwind(AssertUnwindSafe(move || route.transmit(out)));
            if result.is_err() {
                self.diagnostics.record_callback_panic();
                log::warn!("neuron {}: output route {} panicked on transmit", self.config.id, synapse_id);
            }
        }

        self.stdp.schedule_feedback(now);

        let callbacks = self.callbacks.read().clone();

        self.guarded("report_health", callbacks.report_health(self.activity_level_raw(), routes.len()))
            .await;
        self.guarded(
            "send_electrical_signal",
            callbacks.send_electrical_signal(SignalKind::ACTION_POTENTIAL, &[]),
        )
        .await;

        let ligands: Vec<LigandKind> = self.released_ligands.read().iter().copied().collect();
        for ligand in ligands {
            if self
                .guarded("release_chemical", callbacks.release_chemical(ligand, 1.0))
                .await
                .map(|r| r.is_err())
                .unwrap_or(true)
            {
                self.diagnostics.record_callback_error();
            }
        }
    }

    fn activity_level_raw(&self) -> f64 {
        self.membrane.lock().activity_ewma
    }

    /// Run a fire-path callback future, catching a panic at the call
    /// boundary instead of letting it unwind into the soma task. Returns
    /// `None` (and counts the panic) if the callback panicked.
    async fn guarded<T>(&self, name: &'static str, fut: impl std::future::Future<Output = T>) -> Option<T> {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(value) => Some(value),
            Err(_) => {
                self.diagnostics.record_callback_panic();
                log::warn!("neuron {}: callback `{}` panicked", self.config.id, name);
                None
            }
        }
    }

    async fn fail_invariant(self: &Arc<Self>, reason: &str) {
        log::error!("neuron {}: invariant violated: {}", self.config.id, reason);
        let old = *self.state.read();
        *self.state.write() = ComponentState::Errored;
        let callbacks = self.callbacks.read().clone();
        self.guarded(
            "report_state_change",
            callbacks.report_state_change(old, ComponentState::Errored),
        )
        .await;
    }

    async fn graceful_drain_and_report(self: Arc<Self>) {
        if *self.state.read() == ComponentState::Errored {
            // An invariant violation already transitioned the neuron and
            // reported the state change; do not keep draining.
            return;
        }
        let pending = self.mailbox.drain();
        for signal in pending {
            if self.state.read().is_terminal() {
                break;
            }
            self.process_signal(signal).await;
        }
        let old = *self.state.read();
        if !old.is_terminal() {
            let callbacks = self.callbacks.read().clone();
            self.guarded(
                "report_state_change",
                callbacks.report_state_change(old, ComponentState::Stopped),
            )
            .await;
        }
    }
}

fn min_duration(a: Duration, b: Duration) -> Duration {
    if a.as_nanos() <= b.as_nanos() {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::SynapseCreateConfig;
    use crate::synapse_info::SynapseInfo;
    use crate::time::ManualClock;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct TestCallbacks {
        health_calls: AtomicU64,
        create_synapse_fails: bool,
        synapses: parking_lot::Mutex<Vec<SynapseInfo>>,
        applied: parking_lot::Mutex<Vec<(SynapseId, PlasticityAdjustment)>>,
    }

    #[async_trait]
    impl NeuronCallbacks for TestCallbacks {
        async fn create_synapse(&self, _config: SynapseCreateConfig) -> Result<SynapseId> {
            if self.create_synapse_fails {
                Err(NeuronError::callback_error("create_synapse", "matrix refused"))
            } else {
                Ok(SynapseId::new(1))
            }
        }
        async fn delete_synapse(&self, _id: SynapseId) -> Result<()> {
            Ok(())
        }
        async fn list_synapses(&self, _query: SynapseQuery) -> Vec<SynapseInfo> {
            self.synapses.lock().clone()
        }
        async fn get_synapse(&self, _id: SynapseId) -> Result<std::sync::Arc<dyn crate::callbacks::SynapseHandle>> {
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
        async fn report_health(&self, _activity: f64, _connection_count: usize) {
            self.health_calls.fetch_add(1, Ordering::Relaxed);
        }
        async fn report_state_change(&self, _old: ComponentState, _new: ComponentState) {}
    }

    fn test_config(threshold: f64) -> NeuronConfig {
        NeuronConfigBuilder::new(
            NeuronId::new(1),
            threshold,
            0.1,
            Duration::from_millis(1),
            1.0,
            5.0,
            0.0,
        )
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn single_fire_above_threshold_invokes_route_and_health() {
        let clock = Arc::new(ManualClock::new());
        let neuron = Neuron::from_config(test_config(1.0), clock.clone());
        let cb = Arc::new(TestCallbacks::default());
        neuron.set_callbacks(cb.clone());
        neuron.start().unwrap();

        let received = Arc::new(AtomicUsize::new(0));
        let r = received.clone();
        let route = OutputRoute::new(
            SynapseId::new(10),
            Arc::new(move |sig: NeuralSignal| {
                assert_eq!(sig.value, 1.0);
                r.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(|| 1.0),
            Arc::new(|| Duration::ZERO),
            Arc::new(|| NeuronId::new(2)),
        );
        neuron.add_output_route(route);

        neuron.receive(NeuralSignal::new(1.5, clock.now(), NeuronId::new(99), NeuronId::new(1)));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(received.load(Ordering::SeqCst), 1);
        assert_eq!(cb.health_calls.load(Ordering::Relaxed), 1);
        neuron.stop().await.unwrap();
    }

    #[tokio::test]
    async fn sub_threshold_signal_does_not_fire() {
        let clock = Arc::new(ManualClock::new());
        let neuron = Neuron::from_config(test_config(1.0), clock.clone());
        neuron.start().unwrap();
        neuron.receive(NeuralSignal::new(0.3, clock.now(), NeuronId::new(99), NeuronId::new(1)));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(neuron.diagnostics().fires, 0);
        neuron.stop().await.unwrap();
    }

    #[tokio::test]
    async fn refractory_lockout_limits_to_one_fire() {
        let clock = Arc::new(ManualClock::new());
        let neuron = Neuron::from_config(test_config(1.0), clock.clone());
        neuron.start().unwrap();
        neuron.receive(NeuralSignal::new(2.0, clock.now(), NeuronId::new(99), NeuronId::new(1)));
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        neuron.receive(NeuralSignal::new(2.0, clock.now(), NeuronId::new(99), NeuronId::new(1)));
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(neuron.diagnostics().fires, 1);
        neuron.stop().await.unwrap();
    }

    #[tokio::test]
    async fn degrades_gracefully_with_failing_create_synapse() {
        let clock = Arc::new(ManualClock::new());
        let neuron = Neuron::from_config(test_config(1.0), clock.clone());
        let cb = Arc::new(TestCallbacks {
            create_synapse_fails: true,
            ..Default::default()
        });
        neuron.set_callbacks(cb);
        neuron.start().unwrap();

        let err = neuron.connect_to_neuron(NeuronId::new(2), 0.5, 0).await.unwrap_err();
        assert!(matches!(err, NeuronError::CallbackError { .. }));

        // The soma task must still be alive and still fire.
        neuron.receive(NeuralSignal::new(1.5, clock.now(), NeuronId::new(99), NeuronId::new(1)));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(neuron.diagnostics().fires, 1);
        neuron.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_twice_fails_already_running() {
        let neuron = Neuron::from_config(test_config(1.0), Arc::new(ManualClock::new()));
        neuron.start().unwrap();
        assert!(matches!(neuron.start(), Err(NeuronError::AlreadyRunning { .. })));
        neuron.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let neuron = Neuron::from_config(test_config(1.0), Arc::new(ManualClock::new()));
        neuron.start().unwrap();
        neuron.stop().await.unwrap();
        neuron.stop().await.unwrap();
        assert_eq!(neuron.state(), ComponentState::Stopped);
    }

    #[tokio::test]
    async fn noop_callbacks_do_not_crash_soma_loop() {
        let clock = Arc::new(ManualClock::new());
        let neuron = Neuron::from_config(test_config(1.0), clock.clone());
        neuron.start().unwrap();
        neuron.receive(NeuralSignal::new(1.5, clock.now(), NeuronId::new(99), NeuronId::new(1)));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(neuron.diagnostics().fires, 1);
        assert!(neuron.is_active());
        neuron.stop().await.unwrap();
    }
}
