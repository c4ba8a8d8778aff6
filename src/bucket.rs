//! Token bucket state and accounting.

use crate::policy::Policy;

/// Per-(policy, key) token bucket state.
///
/// The bucket is plain data; the owning limiter serializes access to it, so
/// refill and acquire execute as a single critical section per bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    /// Currently available request credits, `0 <= tokens <= capacity`
    tokens: f64,
    /// Monotonic millisecond timestamp of the last accounting update
    last_refill_ms: u64,
}

impl TokenBucket {
    /// Create a bucket seeded with the full budget.
    pub fn full(policy: &Policy, now_ms: u64) -> Self {
        Self {
            tokens: policy.capacity,
            last_refill_ms: now_ms,
        }
    }

    /// Regenerate tokens for the time elapsed since the last update.
    ///
    /// Tokens clamp at the policy capacity; `last_refill_ms` never moves
    /// backwards even if the caller passes a stale reading.
    pub fn refill(&mut self, policy: &Policy, now_ms: u64) {
        let elapsed = now_ms.saturating_sub(self.last_refill_ms);
        if elapsed > 0 {
            let regenerated = elapsed as f64 * policy.refill_per_ms;
            self.tokens = (self.tokens + regenerated).min(policy.capacity);
            self.last_refill_ms = now_ms;
        }
    }

    /// Take one token if a whole token is available.
    ///
    /// A rejected acquire leaves the balance untouched; there is no penalty
    /// beyond the implicit wait.
    pub fn try_acquire(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Milliseconds until a whole token will be available, rounded up.
    ///
    /// The hint is advisory: time keeps advancing after the measurement, so
    /// the true wait may be slightly shorter, never meaningfully longer.
    pub fn retry_after_ms(&self, policy: &Policy) -> u64 {
        let deficit = (1.0 - self.tokens).max(0.0);
        (deficit / policy.refill_per_ms).ceil() as u64
    }

    /// Current token balance.
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Timestamp of the last accounting update.
    pub fn last_refill_ms(&self) -> u64 {
        self.last_refill_ms
    }
}
