//! Distributed lock handles.
//!
//! A lock is a namespaced key written with `SET key token NX EX timeout`.
//! There is no auto-renewal: the holder releases it explicitly or lets the
//! timeout lapse.

/// Compare-and-delete: only the token holder may release.
pub const RELEASE_SCRIPT: &str =
    "if redis.call('GET', KEYS[1]) == ARGV[1] then return redis.call('DEL', KEYS[1]) else return 0 end";

/// An acquired lock. Dropping it does not release the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockGuard {
    name: String,
    key: String,
    token: String,
    timeout_secs: u64,
}

impl LockGuard {
    pub(crate) fn new(name: &str, key: String, timeout_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            key,
            token: uuid::Uuid::new_v4().to_string(),
            timeout_secs,
        }
    }

    /// Lock name as passed by the caller.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical key holding the lock.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}
