//! Bucket key generation and requester identification.

/// A key that uniquely identifies a rate limit bucket.
///
/// The key is composed of the policy name and the caller-supplied requester
/// key, so accounting is partitioned per (policy, requester) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// The policy this bucket belongs to
    pub policy: String,
    /// Opaque requester identifier (IP address, account id, composite string)
    pub key: String,
}

impl BucketKey {
    /// Create a new bucket key from a policy name and requester key.
    pub fn new(policy: &str, key: &str) -> Self {
        Self {
            policy: policy.to_string(),
            key: key.to_string(),
        }
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.policy, self.key)
    }
}

/// Derive a requester key from a forwarded-for style header value.
///
/// Proxies append hops to the header, so the first comma-separated entry is
/// the original client. Returns `None` when no usable value is present.
pub fn client_key_from_forwarded(header: &str) -> Option<String> {
    let first = header.split(',').next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

/// Join key parts into a single stable composite key.
///
/// Useful when accounting should partition on more than one dimension, such
/// as (account id, client address).
pub fn compose_key(parts: &[&str]) -> String {
    parts.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_key_display() {
        let key = BucketKey::new("report", "1.2.3.4");
        assert_eq!(key.to_string(), "report:1.2.3.4");
    }

    #[test]
    fn test_bucket_key_equality() {
        assert_eq!(
            BucketKey::new("report", "1.2.3.4"),
            BucketKey::new("report", "1.2.3.4")
        );
        assert_ne!(
            BucketKey::new("report", "1.2.3.4"),
            BucketKey::new("admin_review", "1.2.3.4")
        );
    }

    #[test]
    fn test_forwarded_takes_first_entry() {
        assert_eq!(
            client_key_from_forwarded("1.2.3.4, 10.0.0.1, 172.16.0.1"),
            Some("1.2.3.4".to_string())
        );
    }

    #[test]
    fn test_forwarded_trims_whitespace() {
        assert_eq!(
            client_key_from_forwarded("  1.2.3.4  "),
            Some("1.2.3.4".to_string())
        );
    }

    #[test]
    fn test_forwarded_single_value() {
        assert_eq!(
            client_key_from_forwarded("203.0.113.7"),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn test_forwarded_empty_is_none() {
        assert_eq!(client_key_from_forwarded(""), None);
        assert_eq!(client_key_from_forwarded("  , 10.0.0.1"), None);
    }

    #[test]
    fn test_compose_key() {
        assert_eq!(compose_key(&["acct_42", "1.2.3.4"]), "acct_42:1.2.3.4");
        assert_eq!(compose_key(&["solo"]), "solo");
    }
}
