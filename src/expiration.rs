// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! TTL resolution for write operations.
//!
//! Values are passed through without range checks; the store rejects
//! out-of-range TTLs and that surfaces as [`crate::KvError::InvalidArgument`].

/// Resolve the TTL (seconds) applied to a write.
#[inline]
#[must_use]
pub fn effective_ttl(override_secs: Option<i64>, default_secs: i64) -> i64 {
    override_secs.unwrap_or(default_secs)
}

/// Per-facade expiration default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    default_ttl: i64,
}

impl ExpirationPolicy {
    #[must_use]
    pub fn new(default_ttl: i64) -> Self {
        Self { default_ttl }
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    #[inline]
    pub fn resolve(&self, override_secs: Option<i64>) -> i64 {
        effective_ttl(override_secs, self.default_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        assert_eq!(effective_ttl(Some(5), 60), 5);
    }

    #[test]
    fn test_default_when_absent() {
        assert_eq!(effective_ttl(None, 60), 60);
    }

    #[test]
    fn test_no_validation_of_odd_values() {
        // zero and negative are the store's problem
        assert_eq!(effective_ttl(Some(0), 60), 0);
        assert_eq!(effective_ttl(Some(-1), 60), -1);
    }

    #[test]
    fn test_policy_resolve() {
        let policy = ExpirationPolicy::new(300);
        assert_eq!(policy.default_ttl(), 300);
        assert_eq!(policy.resolve(None), 300);
        assert_eq!(policy.resolve(Some(10)), 10);
    }
}
