//! The adjustment the STDP unit hands to a synapse.

use crate::time::SignedDuration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A plasticity instruction delivered to a single synapse.
///
/// Sign convention: `delta_t = t_pre - t_post`.
/// `delta_t < 0` (pre before post) is potentiation (LTP); `delta_t > 0`
/// (pre after post) is depression (LTD). This convention is global and
/// binding — every producer and consumer of [`PlasticityAdjustment`] in this
/// crate agrees on it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlasticityAdjustment {
    /// `t_pre - t_post`, signed. Negative potentiates, positive depresses.
    pub delta_t: SignedDuration,
    /// Override for the magnitude of the weight change, if the caller wants
    /// to bypass the synapse's own STDP curve.
    pub weight_change_override: Option<f64>,
    /// Override for the learning rate used to scale the default curve.
    pub learning_rate_override: Option<f64>,
}

impl PlasticityAdjustment {
    /// Construct an adjustment from a timing delta alone.
    pub fn from_delta(delta_t: SignedDuration) -> Self {
        Self {
            delta_t,
            weight_change_override: None,
            learning_rate_override: None,
        }
    }

    /// `true` when this adjustment is on the potentiation (LTP) side.
    pub fn is_potentiating(&self) -> bool {
        self.delta_t.is_negative()
    }
}
