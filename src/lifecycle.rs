//! The neuron's linear lifecycle state machine.

use std::fmt;

/// Lifecycle state of a neuron's soma task.
///
/// Transitions are linear except that re-entry into `Running` after `Stopped`
/// is forbidden, and `Errored` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    /// Constructed, callbacks may still be installed, soma task not spawned.
    Created,
    /// Soma task is draining the mailbox.
    Running,
    /// `stop()` was called; the soma task is draining its grace period.
    Stopping,
    /// Soma task has exited cleanly.
    Stopped,
    /// Soma task exited due to an unrecoverable invariant violation.
    Errored,
}

impl ComponentState {
    /// Whether `start()` may be called from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, ComponentState::Created)
    }

    /// Whether the soma task is actively draining its mailbox.
    pub fn is_running(&self) -> bool {
        matches!(self, ComponentState::Running)
    }

    /// Whether this state is terminal (no further transitions are valid).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComponentState::Stopped | ComponentState::Errored)
    }

    /// Validate a proposed transition, per the linear state machine.
    pub fn can_transition_to(&self, next: ComponentState) -> bool {
        use ComponentState::*;
        match (self, next) {
            (Created, Running) => true,
            (Created, Errored) => true,
            (Running, Stopping) => true,
            (Running, Errored) => true,
            (Stopping, Stopped) => true,
            (Stopping, Errored) => true,
            // Stopped and Errored are terminal; no outgoing transitions,
            // including re-entry into Running.
            _ => false,
        }
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentState::Created => "created",
            ComponentState::Running => "running",
            ComponentState::Stopping => "stopping",
            ComponentState::Stopped => "stopped",
            ComponentState::Errored => "errored",
        };
        write!(f, "{s}")
    }
}
