//! Monotonic time for the soma loop.
//!
//! A live soma task needs *a* notion of "now", so it asks a [`Clock`] rather
//! than calling `std::time::Instant::now()` directly. Tests inject a
//! [`ManualClock`] so refractory periods, STDP windows and homeostasis
//! convergence can be driven without real sleeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point in time, nanoseconds since an arbitrary monotonic epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instant(pub u64);

impl Instant {
    /// The epoch instant.
    pub const ZERO: Self = Self(0);

    /// Construct an instant from a raw nanosecond count.
    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    /// Raw nanosecond count since the epoch.
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Elapsed duration since an earlier instant, saturating at zero.
    pub fn saturating_since(&self, earlier: Instant) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Instant offset forward by a duration, saturating at `u64::MAX`.
    pub fn checked_add(&self, d: Duration) -> Self {
        Self(self.0.saturating_add(d.as_nanos()))
    }
}

/// A span of time, nanoseconds, never negative (use signed deltas for STDP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Duration(pub u64);

impl Duration {
    /// The zero duration.
    pub const ZERO: Self = Self(0);

    /// Construct from raw nanoseconds.
    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    /// Construct from whole milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms * 1_000_000)
    }

    /// Construct from whole microseconds.
    pub const fn from_micros(us: u64) -> Self {
        Self(us * 1_000)
    }

    /// Raw nanosecond count.
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Fractional seconds, for rate computations.
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Convert to a `std::time::Duration`, for handing to `tokio::time`
    /// APIs (interval ticks, the stop grace-period timeout) which know
    /// nothing about this crate's [`Clock`] abstraction.
    pub const fn as_std(&self) -> std::time::Duration {
        std::time::Duration::from_nanos(self.0)
    }
}

/// A signed duration, used for STDP's `delta_t = t_pre - t_post`.
///
/// Positive means the left-hand instant is later than the right-hand one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignedDuration(pub i64);

impl SignedDuration {
    /// `a - b`, signed, nanoseconds.
    pub fn between(a: Instant, b: Instant) -> Self {
        Self(a.0 as i64 - b.0 as i64)
    }

    /// Raw nanosecond count (negative means `a` preceded `b`).
    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    /// Absolute value as an unsigned [`Duration`].
    pub fn magnitude(&self) -> Duration {
        Duration::from_nanos(self.0.unsigned_abs())
    }

    /// `true` for delta_t < 0 (pre before post — LTP side of the window).
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

/// Source of "now" for a soma task.
///
/// Implementations must be monotonic: successive calls to `now()` from the
/// same task never go backwards. Cheap to call — it sits on the hot path of
/// every dequeued signal.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Wall-clock implementation backed by `std::time::Instant`.
#[derive(Debug, Default)]
pub struct SystemClock {
    origin: std::time::Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is "now".
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::from_nanos(self.origin.elapsed().as_nanos() as u64)
    }
}

/// A clock whose value is advanced explicitly, for deterministic tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    ns: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a manual clock starting at [`Instant::ZERO`].
    pub fn new() -> Self {
        Self {
            ns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance the clock by a duration and return the new instant.
    pub fn advance(&self, d: Duration) -> Instant {
        let new = self.ns.fetch_add(d.as_nanos(), Ordering::SeqCst) + d.as_nanos();
        Instant::from_nanos(new)
    }

    /// Set the clock to an absolute instant. Must not move it backwards.
    pub fn set(&self, at: Instant) {
        self.ns.store(at.as_nanos(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        Instant::from_nanos(self.ns.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_duration_sign_convention() {
        let t_pre = Instant::from_nanos(90);
        let t_post = Instant::from_nanos(100);
        let delta = SignedDuration::between(t_pre, t_post);
        assert!(delta.is_negative());
        assert_eq!(delta.as_nanos(), -10);
    }

    #[test]
    fn manual_clock_is_monotonic_and_explicit() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Instant::ZERO);
        let t1 = clock.advance(Duration::from_millis(5));
        assert_eq!(t1.as_nanos(), 5_000_000);
        assert!(clock.now() >= t1);
    }
}
