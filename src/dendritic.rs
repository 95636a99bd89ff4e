//! Dendritic integration strategies.
//!
//! Modeled as a tagged union rather than a trait object, since the four variants share one operation
//! set and runtime swapping needs to inspect whether the *current* variant
//! is quiescent before allowing a swap.

use crate::config::{CoincidenceConfig, DendriticMode};
use crate::error::{NeuronError, Result};
use crate::signal::NeuralSignal;
use crate::time::{Duration, Instant};
use std::collections::VecDeque;

/// A pluggable pre-soma input-shaping strategy.
///
/// Strategies are stateless across neuron restarts: they may hold internal
/// per-neuron buffers, but must tolerate [`DendriticStrategy::reset`] between
/// stop and restart.
#[derive(Debug, Clone)]
pub enum DendriticStrategy {
    /// Direct-to-soma injection, no buffering.
    Passive,
    /// Buffers signals within a window and emits their sum.
    TemporalSummation {
        window: Duration,
        buffer: VecDeque<NeuralSignal>,
    },
    /// Non-linear excitatory/inhibitory combination.
    ShuntingInhibition {
        k: f64,
        window: Duration,
        spatial_decay_factor: Option<f64>,
        buffer: VecDeque<NeuralSignal>,
    },
    /// Supra-linear NMDA-like dendritic spike with optional coincidence
    /// detection.
    ActiveDendrite {
        window: Duration,
        dendritic_threshold: f64,
        amplification: f64,
        coincidence: Option<CoincidenceConfig>,
        buffer: VecDeque<NeuralSignal>,
    },
}

impl DendriticStrategy {
    /// Build the runtime strategy from its static configuration.
    pub fn from_mode(mode: DendriticMode) -> Self {
        match mode {
            DendriticMode::Passive => DendriticStrategy::Passive,
            DendriticMode::TemporalSummation { window } => DendriticStrategy::TemporalSummation {
                window,
                buffer: VecDeque::new(),
            },
            DendriticMode::ShuntingInhibition {
                k,
                window,
                spatial_decay_factor,
            } => DendriticStrategy::ShuntingInhibition {
                k,
                window,
                spatial_decay_factor,
                buffer: VecDeque::new(),
            },
            DendriticMode::ActiveDendrite {
                window,
                dendritic_threshold,
                amplification,
                coincidence,
            } => DendriticStrategy::ActiveDendrite {
                window,
                dendritic_threshold,
                amplification,
                coincidence,
                buffer: VecDeque::new(),
            },
        }
    }

    /// Strategy name, for diagnostics/logging.
    pub fn name(&self) -> &'static str {
        match self {
            DendriticStrategy::Passive => "passive",
            DendriticStrategy::TemporalSummation { .. } => "temporal_summation",
            DendriticStrategy::ShuntingInhibition { .. } => "shunting_inhibition",
            DendriticStrategy::ActiveDendrite { .. } => "active_dendrite",
        }
    }

    /// Whether the strategy currently holds no buffered, undelivered input
    /// — the precondition for `set_dendritic_mode` to swap it out.
    pub fn is_quiescent(&self) -> bool {
        match self {
            DendriticStrategy::Passive => true,
            DendriticStrategy::TemporalSummation { buffer, .. } => buffer.is_empty(),
            DendriticStrategy::ShuntingInhibition { buffer, .. } => buffer.is_empty(),
            DendriticStrategy::ActiveDendrite { buffer, .. } => buffer.is_empty(),
        }
    }

    /// Clear any buffered state. Called between stop and restart.
    pub fn reset(&mut self) {
        match self {
            DendriticStrategy::Passive => {}
            DendriticStrategy::TemporalSummation { buffer, .. } => buffer.clear(),
            DendriticStrategy::ShuntingInhibition { buffer, .. } => buffer.clear(),
            DendriticStrategy::ActiveDendrite { buffer, .. } => buffer.clear(),
        }
    }

    /// Hand one arriving signal to the strategy; returns an immediate
    /// contribution if the strategy emits on every signal (or emits because
    /// this signal evicted the window), or `None` if the signal was only
    /// buffered.
    pub fn handle(&mut self, signal: NeuralSignal) -> Option<f64> {
        match self {
            DendriticStrategy::Passive => Some(signal.value),

            DendriticStrategy::TemporalSummation { window, buffer } => {
                evict_outside_window(buffer, signal.timestamp, *window);
                buffer.push_back(signal);
                // Emit as soon as the oldest buffered signal exits the
                // window on arrival of this one.
                if let Some(oldest) = buffer.front() {
                    if signal.timestamp.saturating_since(oldest.timestamp) >= *window {
                        let sum: f64 = buffer.iter().map(|s| s.value).sum();
                        buffer.clear();
                        return Some(sum);
                    }
                }
                None
            }

            DendriticStrategy::ShuntingInhibition {
                k,
                window,
                spatial_decay_factor,
                buffer,
            } => {
                evict_outside_window(buffer, signal.timestamp, *window);
                buffer.push_back(signal);
                let excit: f64 = buffer.iter().filter(|s| s.value > 0.0).map(|s| s.value).sum();
                let inhib: f64 = buffer
                    .iter()
                    .filter(|s| s.value < 0.0)
                    .map(|s| -s.value)
                    .sum();
                let mut contribution = excit / (1.0 + k * inhib);
                if let Some(decay) = spatial_decay_factor {
                    contribution *= decay;
                }
                Some(contribution)
            }

            DendriticStrategy::ActiveDendrite {
                window,
                dendritic_threshold,
                amplification,
                coincidence,
                buffer,
            } => {
                evict_outside_window(buffer, signal.timestamp, *window);
                buffer.push_back(signal);
                let sum: f64 = buffer.iter().map(|s| s.value).sum();
                if sum.abs() < *dendritic_threshold {
                    return None;
                }
                let mut contribution = sum * *amplification;
                if let Some(cc) = coincidence {
                    let coincident = buffer
                        .iter()
                        .filter(|s| signal.timestamp.saturating_since(s.timestamp) <= cc.within)
                        .count();
                    if coincident >= cc.required_inputs {
                        contribution *= 1.0 + cc.extra_amplification;
                    }
                }
                buffer.clear();
                Some(contribution)
            }
        }
    }

    /// Timer tick, for strategies that emit on a schedule rather than only
    /// on signal arrival. Passive is inert; the windowed strategies flush
    /// if their oldest buffered signal has aged out.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        match self {
            DendriticStrategy::Passive => None,
            DendriticStrategy::TemporalSummation { window, buffer } => {
                evict_outside_window(buffer, now, *window);
                if buffer.is_empty() {
                    return None;
                }
                let oldest = buffer.front().unwrap();
                if now.saturating_since(oldest.timestamp) >= *window {
                    let sum: f64 = buffer.iter().map(|s| s.value).sum();
                    buffer.clear();
                    Some(sum)
                } else {
                    None
                }
            }
            DendriticStrategy::ShuntingInhibition { buffer, window, .. } => {
                evict_outside_window(buffer, now, *window);
                None
            }
            DendriticStrategy::ActiveDendrite { buffer, window, .. } => {
                evict_outside_window(buffer, now, *window);
                None
            }
        }
    }

    /// Attempt to swap to a new strategy. Fails if the current strategy is
    /// not quiescent.
    pub fn swap(&mut self, mode: DendriticMode) -> Result<()> {
        if !self.is_quiescent() {
            return Err(NeuronError::DendriticNotQuiescent);
        }
        *self = DendriticStrategy::from_mode(mode);
        Ok(())
    }
}

fn evict_outside_window(buffer: &mut VecDeque<NeuralSignal>, now: Instant, window: Duration) {
    while let Some(front) = buffer.front() {
        if now.saturating_since(front.timestamp) > window {
            buffer.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NeuronId;

    fn sig(value: f64, t_ns: u64) -> NeuralSignal {
        NeuralSignal::new(value, Instant::from_nanos(t_ns), NeuronId::new(1), NeuronId::new(2))
    }

    #[test]
    fn passive_forwards_value_unchanged() {
        let mut s = DendriticStrategy::Passive;
        assert_eq!(s.handle(sig(1.5, 0)), Some(1.5));
        assert!(s.is_quiescent());
    }

    #[test]
    fn temporal_summation_buffers_then_sums() {
        let mut s = DendriticStrategy::TemporalSummation {
            window: Duration::from_millis(2),
            buffer: VecDeque::new(),
        };
        assert_eq!(s.handle(sig(0.3, 0)), None);
        assert!(!s.is_quiescent());
        // Still inside window: buffered, no emission yet.
        assert_eq!(s.handle(sig(0.3, 1_000_000)), None);
        // Exits window: emits the sum.
        let out = s.handle(sig(0.1, 3_000_000));
        assert!(out.is_some());
        assert!(s.is_quiescent());
    }

    #[test]
    fn shunting_inhibition_divides_by_inhibition() {
        let mut s = DendriticStrategy::ShuntingInhibition {
            k: 1.0,
            window: Duration::from_millis(5),
            spatial_decay_factor: None,
            buffer: VecDeque::new(),
        };
        let c1 = s.handle(sig(1.0, 0)).unwrap();
        assert_eq!(c1, 1.0);
        let c2 = s.handle(sig(-0.5, 1_000_000)).unwrap();
        // excit=1.0, inhib=0.5 => 1.0 / (1 + 1*0.5)
        assert!((c2 - (1.0 / 1.5)).abs() < 1e-9);
    }

    #[test]
    fn active_dendrite_requires_threshold_crossing() {
        let mut s = DendriticStrategy::ActiveDendrite {
            window: Duration::from_millis(5),
            dendritic_threshold: 1.0,
            amplification: 2.0,
            coincidence: None,
            buffer: VecDeque::new(),
        };
        assert_eq!(s.handle(sig(0.3, 0)), None);
        let out = s.handle(sig(0.8, 1_000_000));
        assert_eq!(out, Some((0.3 + 0.8) * 2.0));
        assert!(s.is_quiescent());
    }

    #[test]
    fn swap_rejected_while_buffered() {
        let mut s = DendriticStrategy::TemporalSummation {
            window: Duration::from_millis(5),
            buffer: VecDeque::new(),
        };
        s.handle(sig(0.1, 0));
        assert!(s.swap(DendriticMode::Passive).is_err());
        s.reset();
        assert!(s.swap(DendriticMode::Passive).is_ok());
    }
}
