//! Rate limit policy configuration.
//!
//! A policy pairs a burst capacity with a continuous refill rate. Policies are
//! a closed set, registered by name before the limiter takes traffic, so a
//! lookup failure at check time is a deployment error rather than a runtime
//! condition. Policies can be built in code or loaded from a YAML file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TollgateError};

/// An immutable rate limit policy.
///
/// `capacity` bounds the burst admissible from a full bucket;
/// `refill_per_ms` is the sustained admitted rate in tokens per millisecond.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    /// Maximum tokens a bucket may hold
    pub capacity: f64,
    /// Tokens regenerated per elapsed millisecond
    pub refill_per_ms: f64,
}

impl Policy {
    /// Create a policy from a capacity and a per-millisecond refill rate.
    pub fn new(capacity: f64, refill_per_ms: f64) -> Result<Self> {
        let policy = Self {
            capacity,
            refill_per_ms,
        };
        policy.validate("<unnamed>")?;
        Ok(policy)
    }

    /// Create a policy that regenerates `tokens` every `interval`.
    ///
    /// `Policy::per(10.0, 1.0, Duration::from_secs(300))` allows a burst of 10
    /// and a sustained rate of one request per five minutes.
    pub fn per(capacity: f64, tokens: f64, interval: Duration) -> Result<Self> {
        let interval_ms = interval.as_millis();
        if interval_ms == 0 {
            return Err(TollgateError::Config(
                "Refill interval must be at least one millisecond".to_string(),
            ));
        }
        Self::new(capacity, tokens / interval_ms as f64)
    }

    /// Steady-state minimum spacing between admitted requests once the burst
    /// is exhausted.
    pub fn sustained_spacing(&self) -> Duration {
        Duration::from_millis((1.0 / self.refill_per_ms).ceil() as u64)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.capacity.is_finite() && self.capacity > 0.0) {
            return Err(TollgateError::Config(format!(
                "Policy '{}': capacity must be a positive finite number, got {}",
                name, self.capacity
            )));
        }
        if !(self.refill_per_ms.is_finite() && self.refill_per_ms > 0.0) {
            return Err(TollgateError::Config(format!(
                "Policy '{}': refill rate must be a positive finite number, got {}",
                name, self.refill_per_ms
            )));
        }
        Ok(())
    }
}

/// A named set of rate limit policies.
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: HashMap<String, Policy>,
}

/// Serialized form of a policy set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PolicyFile {
    /// Map of policy name to policy rule
    #[serde(default)]
    policies: HashMap<String, PolicyRule>,
}

/// Serialized form of a single policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyRule {
    /// Maximum tokens the bucket may hold (burst allowance)
    capacity: f64,
    /// Refill cadence for this policy
    refill: RefillRule,
}

/// How quickly a policy regenerates tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RefillRule {
    /// Tokens regenerated per interval
    tokens: f64,
    /// Interval length in milliseconds
    interval_ms: u64,
}

impl PolicySet {
    /// Create an empty policy set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default presets carried over from the source system.
    ///
    /// `report`: burst of 10, one token per five minutes.
    /// `admin_review`: burst of 30, one token per minute.
    pub fn presets() -> Self {
        let mut set = Self::new();
        set.insert(
            "report",
            Policy::per(10.0, 1.0, Duration::from_secs(300)).unwrap(),
        );
        set.insert(
            "admin_review",
            Policy::per(30.0, 1.0, Duration::from_secs(60)).unwrap(),
        );
        set
    }

    /// Register a policy under a name, replacing any existing entry.
    pub fn insert(&mut self, name: &str, policy: Policy) {
        self.policies.insert(name.to_string(), policy);
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    /// Names of all registered policies.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Whether the set contains no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Number of registered policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Load a policy set from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a policy set from a YAML string.
    ///
    /// Every entry is validated; an invalid capacity or refill rule fails the
    /// whole load so that a misconfigured policy can never degrade into a
    /// silently-always-allow or silently-always-deny limiter.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: PolicyFile = serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(format!("Failed to parse policy config: {}", e)))?;

        let mut set = Self::new();
        for (name, rule) in file.policies {
            if rule.refill.interval_ms == 0 {
                return Err(TollgateError::Config(format!(
                    "Policy '{}': refill interval_ms must be positive",
                    name
                )));
            }
            if !(rule.refill.tokens.is_finite() && rule.refill.tokens > 0.0) {
                return Err(TollgateError::Config(format!(
                    "Policy '{}': refill tokens must be a positive finite number, got {}",
                    name, rule.refill.tokens
                )));
            }
            let policy = Policy {
                capacity: rule.capacity,
                refill_per_ms: rule.refill.tokens / rule.refill.interval_ms as f64,
            };
            policy.validate(&name)?;
            set.insert(&name, policy);
        }
        Ok(set)
    }
}
