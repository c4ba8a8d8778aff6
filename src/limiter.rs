//! Core rate limiter implementation.

use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::bucket::TokenBucket;
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TollgateError};
use crate::key::BucketKey;
use crate::policy::PolicySet;

/// The outcome of a rate limit check.
///
/// Rejection is an ordinary value, not an error: callers branch on
/// `allowed` and, when rejecting, relay `retry_after_ms` so a well-behaved
/// client can schedule a retry instead of hot-looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request was admitted
    pub allowed: bool,
    /// Advisory wait before retrying, present only on rejection
    pub retry_after_ms: Option<u64>,
}

impl Decision {
    /// An admitted request.
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after_ms: None,
        }
    }

    /// A rejected request with an advisory retry delay.
    pub fn rejected(retry_after_ms: u64) -> Self {
        Self {
            allowed: false,
            retry_after_ms: Some(retry_after_ms),
        }
    }

    /// Whether the request was admitted.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// The core rate limiter that manages per-key token buckets.
///
/// This struct is thread-safe and can be shared across request handlers. All
/// bucket state lives behind a single mutex; `check` holds it only for one
/// map lookup and one arithmetic update, so the critical section is constant
/// time and never blocks on I/O.
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Registered policies, fixed at construction
    policies: PolicySet,
    /// Token buckets indexed by (policy, requester key)
    buckets: Mutex<HashMap<BucketKey, TokenBucket>>,
    /// Monotonic time source
    clock: C,
    /// Optional cap on bucket count; `None` means buckets live for the
    /// process lifetime
    max_buckets: Option<usize>,
}

impl RateLimiter<SystemClock> {
    /// Create a rate limiter with the given policies and the system clock.
    pub fn new(policies: PolicySet) -> Self {
        Self::with_clock(policies, SystemClock::new())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a rate limiter with an explicit clock.
    ///
    /// Tests inject a [`crate::clock::ManualClock`] here to make decision
    /// sequences deterministic.
    pub fn with_clock(policies: PolicySet, clock: C) -> Self {
        Self {
            policies,
            buckets: Mutex::new(HashMap::new()),
            clock,
            max_buckets: None,
        }
    }

    /// Cap the number of live buckets.
    ///
    /// When the cap is reached, creating a bucket for a new key first evicts
    /// the least-recently-refilled bucket. Without a cap, high-cardinality
    /// keys grow the map without bound.
    pub fn with_max_buckets(mut self, max_buckets: usize) -> Self {
        self.max_buckets = Some(max_buckets);
        self
    }

    /// Check the rate limit for a requester key under a named policy.
    ///
    /// Admits the request if the bucket holds at least one token, consuming
    /// it; otherwise returns a rejection carrying the advisory retry delay.
    /// The bucket for a new (policy, key) pair is created seeded with the
    /// full budget.
    ///
    /// # Errors
    ///
    /// `UnknownPolicy` if `policy_name` was never registered, `Config` if
    /// `key` is empty. Both are caller bugs, not per-request conditions.
    pub fn check(&self, policy_name: &str, key: &str) -> Result<Decision> {
        let policy = *self
            .policies
            .get(policy_name)
            .ok_or_else(|| TollgateError::UnknownPolicy {
                name: policy_name.to_string(),
            })?;

        if key.is_empty() {
            return Err(TollgateError::Config(
                "Rate limit key must be non-empty".to_string(),
            ));
        }

        let bucket_key = BucketKey::new(policy_name, key);
        let now = self.clock.now_millis();

        trace!(key = %bucket_key, now_ms = now, "Checking rate limit");

        let mut buckets = self.buckets.lock();

        if let Some(max) = self.max_buckets {
            if !buckets.contains_key(&bucket_key) && buckets.len() >= max {
                Self::evict_least_recently_refilled(&mut buckets);
            }
        }

        let bucket = match buckets.entry(bucket_key.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(
                    key = %bucket_key,
                    capacity = policy.capacity,
                    "Creating new token bucket"
                );
                entry.insert(TokenBucket::full(&policy, now))
            }
        };

        bucket.refill(&policy, now);

        if bucket.try_acquire() {
            Ok(Decision::allowed())
        } else {
            let retry_after_ms = bucket.retry_after_ms(&policy);
            debug!(
                key = %bucket_key,
                retry_after_ms,
                "Rate limit exceeded"
            );
            Ok(Decision::rejected(retry_after_ms))
        }
    }

    /// Remove the bucket whose accounting was updated longest ago.
    fn evict_least_recently_refilled(buckets: &mut HashMap<BucketKey, TokenBucket>) {
        let oldest = buckets
            .iter()
            .min_by_key(|(_, bucket)| bucket.last_refill_ms())
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            debug!(key = %key, "Evicting least-recently-refilled bucket");
            buckets.remove(&key);
        }
    }

    /// Current token balance for a (policy, key) pair, adjusted for elapsed
    /// time but without mutating the bucket.
    ///
    /// Returns `None` if no bucket exists for the pair.
    pub fn tokens_remaining(&self, policy_name: &str, key: &str) -> Option<f64> {
        let policy = *self.policies.get(policy_name)?;
        let bucket_key = BucketKey::new(policy_name, key);
        let now = self.clock.now_millis();

        let buckets = self.buckets.lock();
        buckets.get(&bucket_key).map(|bucket| {
            let mut preview = bucket.clone();
            preview.refill(&policy, now);
            preview.tokens()
        })
    }

    /// The registered policies.
    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    /// Get the number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Drop all bucket state.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.buckets.lock().clear();
    }
}
