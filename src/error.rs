//! Error types for the neuron engine.
//!
//! A `thiserror` enum with named variants and constructor helpers, rather
//! than string errors. Internal, non-error outcomes (an out-of-window
//! plasticity delivery, a clamped weight) are deliberately *not* variants
//! here — they are modeled as plain return values where they occur (see
//! `stdp.rs`, `homeostasis.rs`), since they must never propagate as
//! failures.

use thiserror::Error;

/// Result type for neuron operations.
pub type Result<T> = std::result::Result<T, NeuronError>;

/// Errors surfaced by the neuron's public, direct-caller API.
///
/// Fire-path side effects (outbound callbacks, STDP delivery, homeostasis
/// ticks) never propagate these; they are caught at the soma boundary,
/// counted in [`crate::diagnostics::Diagnostics`], and discarded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NeuronError {
    /// `start()` called on a neuron whose soma task is already running.
    #[error("neuron {neuron_id} is already running")]
    AlreadyRunning {
        /// The neuron in question.
        neuron_id: u64,
    },

    /// An operation requiring a running soma task was attempted on a neuron
    /// that is `Created`, `Stopping`, `Stopped` or `Errored`.
    #[error("neuron {neuron_id} is not running")]
    NotRunning {
        /// The neuron in question.
        neuron_id: u64,
    },

    /// A capability needed by a direct-caller operation is absent (the
    /// callback boundary is the no-op implementation).
    #[error("capability `{capability}` is unavailable")]
    CallbackUnavailable {
        /// Name of the missing capability, e.g. "create_synapse".
        capability: &'static str,
    },

    /// A callback returned an error.
    #[error("callback `{capability}` failed: {reason}")]
    CallbackError {
        /// Name of the capability that failed.
        capability: &'static str,
        /// Opaque reason string from the callback.
        reason: String,
    },

    /// An unrecoverable invariant was violated (e.g. a negative duration
    /// after a clock correction). The neuron transitions to `Errored` and
    /// the soma task exits.
    #[error("invariant violated: {reason}")]
    InvariantViolation {
        /// Description of the violated invariant.
        reason: String,
    },

    /// `set_dendritic_mode` was called while the current strategy has
    /// buffered, undelivered input and cannot be swapped quiescently.
    #[error("dendritic strategy is not quiescent, cannot swap modes")]
    DendriticNotQuiescent,
}

impl NeuronError {
    /// Build a [`NeuronError::CallbackError`] from any displayable cause.
    pub fn callback_error(capability: &'static str, reason: impl ToString) -> Self {
        Self::CallbackError {
            capability,
            reason: reason.to_string(),
        }
    }

    /// Build a [`NeuronError::InvariantViolation`].
    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }
}
