//! Millisecond-resolution timestamp used throughout the message envelope and replica.
//!
//! Kept as a newtype (mirrors the teacher's `UnixTimestamp`) so a raw `u64` amount,
//! id, or count can never be accidentally compared against wall-clock time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the Unix epoch, as set by the authoring device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Days elapsed between `self` and a later `now`, as a float (used by the
    /// relevance scorer's exponential decay term).
    pub fn days_since(self, now: Timestamp) -> f64 {
        now.0.saturating_sub(self.0) as f64 / 86_400_000.0
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Timestamp(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Injected wall-clock capability, so tests can drive deterministic scoring and
/// message timestamps without touching the system clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The production [`Clock`], backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_since_is_zero_at_same_instant() {
        let t = Timestamp(1_000);
        assert_eq!(t.days_since(t), 0.0);
    }

    #[test]
    fn days_since_is_monotonic_in_now() {
        let t = Timestamp(0);
        let a = t.days_since(Timestamp(86_400_000));
        let b = t.days_since(Timestamp(86_400_000 * 2));
        assert!(b > a);
        assert!((a - 1.0).abs() < 1e-9);
    }

    #[test]
    fn days_since_saturates_instead_of_underflowing() {
        let t = Timestamp(10_000);
        assert_eq!(t.days_since(Timestamp(0)), 0.0);
    }
}
