// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Command facade: namespacing and TTL normalization over a store handle.
//!
//! [`CommandFacade`] rewrites every key argument through its
//! [`KeyNamespacer`] and follows every write with exactly one `EXPIRE` per
//! written key, using the TTL resolved by its [`ExpirationPolicy`].
//!
//! Multi-step operations (write, then expire) are separate round trips. An
//! error from any step is returned as-is; the caller cannot tell from the
//! error which earlier steps committed, and a crash between the write and
//! the `EXPIRE` leaves the key without a TTL.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use keyspace_router::{CommandFacade, ExpirationPolicy, InMemoryStore, KeyNamespacer, KvOperations};
//!
//! # #[tokio::main]
//! # async fn main() -> keyspace_router::Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let facade = CommandFacade::new(store.clone(), KeyNamespacer::new("orders"), ExpirationPolicy::new(60));
//!
//! facade.set("order.1", "pending", None).await?;
//! assert_eq!(facade.get("order.1").await?, Some("pending".to_string()));
//! assert!(store.contains_key("{orders}:order.1"));
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod lock;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::{cmd, from_redis_value, Cmd, FromRedisValue, Value};
use tracing::{debug, info};

use crate::error::{KvError, Result};
use crate::expiration::ExpirationPolicy;
use crate::metrics::{self, LatencyTimer};
use crate::namespace::KeyNamespacer;
use crate::storage::traits::{StoreConnection, Topology};

pub use dispatch::CommandKind;
pub use lock::LockGuard;

/// Keys per `DEL` when clearing a namespace.
const FLUSH_CHUNK: usize = 512;

/// The logical operation set shared by every client variant.
#[async_trait]
pub trait KvOperations: Send + Sync {
    /// Current namespace tag (empty when keys are not namespaced).
    fn namespace(&self) -> Result<&str>;

    /// Re-tag future calls. Keys already written are not migrated.
    fn set_namespace(&mut self, tag: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<i64>) -> Result<()>;

    /// Values aligned with `keys`; missing keys yield `None`.
    async fn batch_get(&self, keys: &[&str]) -> Result<Vec<Option<String>>>;

    /// One `MSET`, then one `EXPIRE` per key. Not atomic.
    async fn batch_set(&self, pairs: &[(&str, &str)], ttl: Option<i64>) -> Result<()>;

    /// Returns the number of keys removed.
    async fn delete(&self, keys: &[&str]) -> Result<u64>;

    /// Returns the number of fields created.
    async fn hash_set(&self, key: &str, field: &str, value: &str, ttl: Option<i64>) -> Result<u64>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    async fn hash_multi_get(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>>;

    async fn hash_multi_set(&self, key: &str, pairs: &[(&str, &str)], ttl: Option<i64>) -> Result<()>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    async fn increment(&self, key: &str) -> Result<i64>;

    async fn decrement(&self, key: &str) -> Result<i64>;

    /// Seconds to live; -2 when the key is missing, -1 when it has no TTL.
    async fn time_to_live(&self, key: &str) -> Result<i64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool>;

    /// Logical keys matching `pattern` within the namespace, across every
    /// node in cluster mode. Sorted, without duplicates.
    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>>;

    async fn list_hash_fields(&self, key: &str) -> Result<Vec<String>>;

    /// Try once to take the lock; `None` if someone else holds it.
    async fn acquire_lock(&self, name: &str, timeout_secs: u64) -> Result<Option<LockGuard>>;

    /// Release a lock still owned by `guard`. Returns false if it expired
    /// or was taken over.
    async fn release_lock(&self, guard: &LockGuard) -> Result<bool>;

    /// Remove every key of the current namespace (the whole database when
    /// namespacing is disabled).
    async fn flush_namespace(&self) -> Result<()>;

    /// Remove every key in the store, ignoring namespaces. Only safe for
    /// single-tenant deployments.
    async fn flush_all(&self) -> Result<()>;

    /// Generic dispatch by command name. See [`CommandKind`].
    async fn execute(&self, command: &str, args: &[&str], ttl: Option<i64>) -> Result<Value>;
}

/// Namespacing, TTL-applying facade over one store handle.
pub struct CommandFacade {
    store: Arc<dyn StoreConnection>,
    namespacer: KeyNamespacer,
    expiration: ExpirationPolicy,
}

impl CommandFacade {
    pub fn new(store: Arc<dyn StoreConnection>, namespacer: KeyNamespacer, expiration: ExpirationPolicy) -> Self {
        Self { store, namespacer, expiration }
    }

    pub fn topology(&self) -> Topology {
        self.store.topology()
    }

    pub fn namespacer(&self) -> &KeyNamespacer {
        &self.namespacer
    }

    pub fn expiration(&self) -> ExpirationPolicy {
        self.expiration
    }

    /// Close the underlying store handle. [`crate::KvClient::shutdown`]
    /// calls this exactly once per handle.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }

    fn key(&self, logical: &str) -> String {
        self.namespacer.physical_key(logical)
    }

    async fn run(&self, cmd: &Cmd, label: &str) -> Result<Value> {
        let _timer = LatencyTimer::new(label);
        let result = self.store.query(cmd).await;
        metrics::record_command(label, result.is_ok());
        result
    }

    async fn run_as<T: FromRedisValue>(&self, cmd: &Cmd, label: &str) -> Result<T> {
        let reply = self.run(cmd, label).await?;
        Ok(from_redis_value(&reply)?)
    }

    async fn apply_ttl(&self, physical_key: &str, ttl: i64) -> Result<bool> {
        self.run_as(cmd("EXPIRE").arg(physical_key).arg(ttl), "EXPIRE").await
    }

    /// `KEYS` on every primary, flattened into sorted, unique physical keys.
    async fn scan_physical(&self, physical_pattern: &str) -> Result<Vec<String>> {
        let mut keys_cmd = cmd("KEYS");
        keys_cmd.arg(physical_pattern);

        let _timer = LatencyTimer::new("KEYS");
        let result = self.store.query_all_primaries(&keys_cmd).await;
        metrics::record_command("KEYS", result.is_ok());

        let mut keys = Vec::new();
        for reply in result? {
            let node_keys: Vec<String> = from_redis_value(&reply)?;
            keys.extend(node_keys);
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl KvOperations for CommandFacade {
    fn namespace(&self) -> Result<&str> {
        Ok(self.namespacer.tag())
    }

    fn set_namespace(&mut self, tag: &str) -> Result<()> {
        info!(from = %self.namespacer.tag(), to = %tag, "Namespace re-tagged");
        self.namespacer.set_tag(tag);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run_as(cmd("GET").arg(self.key(key)), "GET").await
    }

    #[tracing::instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str, ttl: Option<i64>) -> Result<()> {
        let physical = self.key(key);
        self.run(cmd("SET").arg(&physical).arg(value), "SET").await?;
        self.apply_ttl(&physical, self.expiration.resolve(ttl)).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(count = keys.len()))]
    async fn batch_get(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        metrics::record_batch_size("MGET", keys.len());
        let physical: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let values: Vec<Option<String>> = self.run_as(cmd("MGET").arg(&physical), "MGET").await?;
        if values.len() != keys.len() {
            return Err(KvError::UnexpectedReply(format!(
                "MGET returned {} values for {} keys",
                values.len(),
                keys.len()
            )));
        }
        Ok(values)
    }

    #[tracing::instrument(skip(self, pairs), fields(count = pairs.len()))]
    async fn batch_set(&self, pairs: &[(&str, &str)], ttl: Option<i64>) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        metrics::record_batch_size("MSET", pairs.len());

        let physical: Vec<(String, &str)> = pairs.iter().map(|(k, v)| (self.key(k), *v)).collect();
        let mut mset = cmd("MSET");
        for (key, value) in &physical {
            mset.arg(key).arg(*value);
        }
        self.run(&mset, "MSET").await?;

        let ttl = self.expiration.resolve(ttl);
        for (key, _) in &physical {
            self.apply_ttl(key, ttl).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(count = keys.len()))]
    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        metrics::record_batch_size("DEL", keys.len());
        let physical: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        self.run_as(cmd("DEL").arg(&physical), "DEL").await
    }

    #[tracing::instrument(skip(self, value))]
    async fn hash_set(&self, key: &str, field: &str, value: &str, ttl: Option<i64>) -> Result<u64> {
        let physical = self.key(key);
        let added: u64 = self.run_as(cmd("HSET").arg(&physical).arg(field).arg(value), "HSET").await?;
        self.apply_ttl(&physical, self.expiration.resolve(ttl)).await?;
        Ok(added)
    }

    #[tracing::instrument(skip(self))]
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.run_as(cmd("HGET").arg(self.key(key)).arg(field), "HGET").await
    }

    #[tracing::instrument(skip(self))]
    async fn hash_multi_get(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        self.run_as(cmd("HMGET").arg(self.key(key)).arg(fields), "HMGET").await
    }

    #[tracing::instrument(skip(self, pairs), fields(count = pairs.len()))]
    async fn hash_multi_set(&self, key: &str, pairs: &[(&str, &str)], ttl: Option<i64>) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let physical = self.key(key);
        let mut hset = cmd("HSET");
        hset.arg(&physical);
        for (field, value) in pairs {
            hset.arg(*field).arg(*value);
        }
        self.run(&hset, "HSET").await?;
        self.apply_ttl(&physical, self.expiration.resolve(ttl)).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.run_as(cmd("HGETALL").arg(self.key(key)), "HGETALL").await
    }

    #[tracing::instrument(skip(self))]
    async fn increment(&self, key: &str) -> Result<i64> {
        self.run_as(cmd("INCR").arg(self.key(key)), "INCR").await
    }

    #[tracing::instrument(skip(self))]
    async fn decrement(&self, key: &str) -> Result<i64> {
        self.run_as(cmd("DECR").arg(self.key(key)), "DECR").await
    }

    #[tracing::instrument(skip(self))]
    async fn time_to_live(&self, key: &str) -> Result<i64> {
        self.run_as(cmd("TTL").arg(self.key(key)), "TTL").await
    }

    #[tracing::instrument(skip(self))]
    async fn exists(&self, key: &str) -> Result<bool> {
        self.run_as(cmd("EXISTS").arg(self.key(key)), "EXISTS").await
    }

    #[tracing::instrument(skip(self))]
    async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        self.apply_ttl(&self.key(key), seconds).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let physical = self.scan_physical(&self.namespacer.pattern(pattern)).await?;
        Ok(physical
            .iter()
            .map(|k| self.namespacer.logical_key(k).to_string())
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn list_hash_fields(&self, key: &str) -> Result<Vec<String>> {
        // a hash lives on exactly one node, so no fan-out
        self.run_as(cmd("HKEYS").arg(self.key(key)), "HKEYS").await
    }

    #[tracing::instrument(skip(self))]
    async fn acquire_lock(&self, name: &str, timeout_secs: u64) -> Result<Option<LockGuard>> {
        let guard = LockGuard::new(name, self.key(name), timeout_secs);
        let reply: Option<String> = self
            .run_as(
                cmd("SET")
                    .arg(guard.key())
                    .arg(guard.token())
                    .arg("NX")
                    .arg("EX")
                    .arg(timeout_secs),
                "LOCK",
            )
            .await?;
        debug!(acquired = reply.is_some(), "Lock attempt");
        Ok(reply.map(|_| guard))
    }

    #[tracing::instrument(skip(self), fields(lock = %guard.name()))]
    async fn release_lock(&self, guard: &LockGuard) -> Result<bool> {
        self.run_as(
            cmd("EVAL")
                .arg(lock::RELEASE_SCRIPT)
                .arg(1)
                .arg(guard.key())
                .arg(guard.token()),
            "UNLOCK",
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(namespace = %self.namespacer.tag()))]
    async fn flush_namespace(&self) -> Result<()> {
        if !self.namespacer.is_enabled() {
            self.run(&cmd("FLUSHDB"), "FLUSHDB").await?;
            return Ok(());
        }

        let keys = self.scan_physical(&self.namespacer.namespace_pattern()).await?;
        for chunk in keys.chunks(FLUSH_CHUNK) {
            self.run(cmd("DEL").arg(chunk), "DEL").await?;
        }
        info!(removed = keys.len(), "Namespace flushed");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn flush_all(&self) -> Result<()> {
        self.run(&cmd("FLUSHALL"), "FLUSHALL").await?;
        info!("Store flushed (all namespaces)");
        Ok(())
    }

    #[tracing::instrument(skip(self, args), fields(argc = args.len()))]
    async fn execute(&self, command: &str, args: &[&str], ttl: Option<i64>) -> Result<Value> {
        self.dispatch(command, args, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryStore;

    fn facade(tag: &str) -> (Arc<InMemoryStore>, CommandFacade) {
        let store = Arc::new(InMemoryStore::new());
        let facade = CommandFacade::new(store.clone(), KeyNamespacer::new(tag), ExpirationPolicy::new(120));
        (store, facade)
    }

    #[tokio::test]
    async fn test_set_issues_one_expire_with_default() {
        let (store, facade) = facade("t");
        facade.set("k", "v", None).await.unwrap();

        let expires = store.commands("EXPIRE");
        assert_eq!(expires, vec![vec!["EXPIRE".to_string(), "{t}:k".into(), "120".into()]]);
    }

    #[tokio::test]
    async fn test_set_override_ttl() {
        let (store, facade) = facade("t");
        facade.set("k", "v", Some(5)).await.unwrap();
        assert_eq!(store.commands("EXPIRE")[0][2], "5");
        assert_eq!(facade.time_to_live("k").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_empty_batches_skip_round_trip() {
        let (store, facade) = facade("t");
        assert!(facade.batch_get(&[]).await.unwrap().is_empty());
        facade.batch_set(&[], None).await.unwrap();
        assert_eq!(facade.delete(&[]).await.unwrap(), 0);
        assert!(facade.hash_multi_get("h", &[]).await.unwrap().is_empty());
        facade.hash_multi_set("h", &[], None).await.unwrap();
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn test_hash_fields_are_not_namespaced() {
        let (store, facade) = facade("t");
        facade.hash_set("h", "field", "1", None).await.unwrap();
        assert_eq!(
            store.commands("HSET")[0],
            vec!["HSET".to_string(), "{t}:h".into(), "field".into(), "1".into()]
        );
        assert_eq!(facade.list_hash_fields("h").await.unwrap(), vec!["field".to_string()]);
    }

    #[tokio::test]
    async fn test_counters_do_not_expire() {
        let (store, facade) = facade("t");
        assert_eq!(facade.increment("c").await.unwrap(), 1);
        assert_eq!(facade.increment("c").await.unwrap(), 2);
        assert_eq!(facade.decrement("c").await.unwrap(), 1);
        assert!(store.commands("EXPIRE").is_empty());
        assert_eq!(facade.time_to_live("c").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_invalid_ttl_surfaces_store_rejection() {
        let store = Arc::new(InMemoryStore::new());
        let facade = CommandFacade::new(store, KeyNamespacer::new("t"), ExpirationPolicy::new(60));
        facade.set("k", "v", None).await.unwrap();
        let err = facade.run(cmd("EXPIRE").arg("{t}:k").arg("soon"), "EXPIRE").await.unwrap_err();
        assert!(matches!(err, KvError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_flush_namespace_leaves_other_tenants() {
        let store = Arc::new(InMemoryStore::new());
        let a = CommandFacade::new(store.clone(), KeyNamespacer::new("a"), ExpirationPolicy::new(60));
        let b = CommandFacade::new(store.clone(), KeyNamespacer::new("b"), ExpirationPolicy::new(60));
        a.set("x", "1", None).await.unwrap();
        a.set("y", "1", None).await.unwrap();
        b.set("x", "2", None).await.unwrap();

        a.flush_namespace().await.unwrap();

        assert_eq!(a.get("x").await.unwrap(), None);
        assert_eq!(b.get("x").await.unwrap(), Some("2".to_string()));
        assert!(store.commands("FLUSHDB").is_empty());
    }

    #[tokio::test]
    async fn test_flush_namespace_without_tag_flushes_db() {
        let (store, facade) = facade("");
        facade.set("x", "1", None).await.unwrap();
        facade.flush_namespace().await.unwrap();
        assert_eq!(store.commands("FLUSHDB").len(), 1);
        assert!(store.is_empty());
    }
}
