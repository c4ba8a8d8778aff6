//! Injectable monotonic time source.
//!
//! All bucket accounting is expressed in whole milliseconds read from a
//! [`Clock`]. Production code uses [`SystemClock`]; tests inject a
//! [`ManualClock`] so that every decision sequence is fully deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic source of elapsed milliseconds.
///
/// Readings must never decrease across calls on the same instance.
pub trait Clock: Send + Sync {
    /// Current monotonic reading in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Monotonic clock backed by [`Instant`].
///
/// Readings are milliseconds since the clock was constructed, so they are
/// immune to wall-clock adjustments.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock anchored at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to.
///
/// Cloning shares the underlying counter, so a test can keep a handle to the
/// clock it hands to the limiter and advance time mid-scenario.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by a duration (truncated to whole milliseconds).
    pub fn advance(&self, duration: Duration) {
        self.advance_millis(duration.as_millis() as u64);
    }

    /// Advance the clock by a number of milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now_millis();
        let second = clock.now_millis();
        assert!(second >= first);
    }

    #[test]
    fn test_manual_clock_starts_at_zero() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_millis(), 0);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        clock.advance_millis(250);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_millis(), 1250);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance_millis(42);
        assert_eq!(clock.now_millis(), 42);
    }
}
