// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Client selection by topology.
//!
//! [`KvClient`] is the one handle the host process constructs, passes to its
//! callers, and shuts down. It picks cluster or standalone mode from
//! [`KvConfig`] and forwards every [`KvOperations`] call to the active
//! variant, so callers never branch on topology.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──initialize()──▶ active ──shutdown()──▶ inactive
//! ```
//!
//! While inactive every operation fails with [`KvError::UninitializedClient`].
//!
//! # Example
//!
//! ```rust,no_run
//! use keyspace_router::{KvClient, KvConfig, KvOperations};
//!
//! # #[tokio::main]
//! # async fn main() -> keyspace_router::Result<()> {
//! let config = KvConfig {
//!     cluster_nodes: Some("10.0.0.1:7000,10.0.0.2:7000".into()),
//!     database: "orders".into(),
//!     ..Default::default()
//! };
//!
//! let mut client = KvClient::connect(&config).await?;
//! client.set("order.1", "pending", None).await?;
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::Value;
use tracing::{info, warn};

use crate::config::KvConfig;
use crate::error::{KvError, Result};
use crate::expiration::ExpirationPolicy;
use crate::facade::{CommandFacade, KvOperations, LockGuard};
use crate::namespace::KeyNamespacer;
use crate::storage::cluster::ClusterStore;
use crate::storage::standalone::{StandaloneOptions, StandaloneStore};
use crate::storage::traits::{StoreConnection, Topology};

/// The facade behind a live client.
pub enum ActiveClient {
    /// Namespaced by the configured database id.
    Cluster(CommandFacade),
    /// Single-tenant: keys are never namespaced.
    Standalone(CommandFacade),
}

impl ActiveClient {
    /// Wrap a store in the variant matching its topology. Standalone stores
    /// ignore `namespace`.
    pub fn from_store(store: Arc<dyn StoreConnection>, namespace: &str, default_ttl_secs: i64) -> Self {
        let expiration = ExpirationPolicy::new(default_ttl_secs);
        match store.topology() {
            Topology::Cluster => Self::Cluster(CommandFacade::new(store, KeyNamespacer::new(namespace), expiration)),
            Topology::Standalone => {
                Self::Standalone(CommandFacade::new(store, KeyNamespacer::disabled(), expiration))
            }
        }
    }

    pub fn topology(&self) -> Topology {
        match self {
            Self::Cluster(_) => Topology::Cluster,
            Self::Standalone(_) => Topology::Standalone,
        }
    }

    pub fn facade(&self) -> &CommandFacade {
        match self {
            Self::Cluster(f) | Self::Standalone(f) => f,
        }
    }
}

#[derive(Default)]
pub struct KvClient {
    active: Option<ActiveClient>,
}

impl KvClient {
    /// An uninitialized client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(config: &KvConfig) -> Result<Self> {
        let mut client = Self::new();
        client.initialize(config).await?;
        Ok(client)
    }

    /// Use an already-built facade.
    #[must_use]
    pub fn from_active(active: ActiveClient) -> Self {
        crate::metrics::set_client_active(active.topology().as_str(), true);
        Self { active: Some(active) }
    }

    /// Connect according to `config`. A previously active handle is shut
    /// down first so only one is ever live.
    #[tracing::instrument(skip(self, config), fields(cluster = config.is_cluster()))]
    pub async fn initialize(&mut self, config: &KvConfig) -> Result<()> {
        self.shutdown().await;

        let seeds = config.seed_nodes()?;
        let store: Arc<dyn StoreConnection> = if seeds.is_empty() {
            info!(host = %config.host, port = config.port, "Initializing standalone client");
            let options = StandaloneOptions {
                host: config.host.clone(),
                port: config.port,
                password: config.password.clone(),
                db_index: config.db_index,
                pool_size: config.pool_size,
            };
            Arc::new(StandaloneStore::connect(&options).await?)
        } else {
            info!(seeds = seeds.len(), namespace = %config.database, "Initializing cluster client");
            Arc::new(ClusterStore::connect(&seeds, config.password.as_deref()).await?)
        };

        let active = ActiveClient::from_store(store, &config.database, config.default_ttl_secs);
        crate::metrics::set_client_active(active.topology().as_str(), true);
        self.active = Some(active);
        Ok(())
    }

    /// Close the active store handle. Safe to call when never started or
    /// already stopped.
    pub async fn shutdown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let topology = active.topology();
        if let Err(e) = active.facade().close().await {
            warn!(error = %e, %topology, "Error closing store handle");
        }
        crate::metrics::set_client_active(topology.as_str(), false);
        info!(%topology, "Client shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    pub fn topology(&self) -> Option<Topology> {
        self.active.as_ref().map(ActiveClient::topology)
    }

    fn facade(&self) -> Result<&CommandFacade> {
        self.active
            .as_ref()
            .map(ActiveClient::facade)
            .ok_or(KvError::UninitializedClient)
    }
}

#[async_trait]
impl KvOperations for KvClient {
    fn namespace(&self) -> Result<&str> {
        self.facade()?.namespace()
    }

    fn set_namespace(&mut self, tag: &str) -> Result<()> {
        match self.active.as_mut() {
            None => Err(KvError::UninitializedClient),
            Some(ActiveClient::Cluster(facade)) => facade.set_namespace(tag),
            Some(ActiveClient::Standalone(_)) => {
                warn!(tag, "Standalone mode does not namespace keys; tag ignored");
                Ok(())
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.facade()?.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<i64>) -> Result<()> {
        self.facade()?.set(key, value, ttl).await
    }

    async fn batch_get(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        self.facade()?.batch_get(keys).await
    }

    async fn batch_set(&self, pairs: &[(&str, &str)], ttl: Option<i64>) -> Result<()> {
        self.facade()?.batch_set(pairs, ttl).await
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        self.facade()?.delete(keys).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str, ttl: Option<i64>) -> Result<u64> {
        self.facade()?.hash_set(key, field, value, ttl).await
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.facade()?.hash_get(key, field).await
    }

    async fn hash_multi_get(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        self.facade()?.hash_multi_get(key, fields).await
    }

    async fn hash_multi_set(&self, key: &str, pairs: &[(&str, &str)], ttl: Option<i64>) -> Result<()> {
        self.facade()?.hash_multi_set(key, pairs, ttl).await
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.facade()?.hash_get_all(key).await
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        self.facade()?.increment(key).await
    }

    async fn decrement(&self, key: &str) -> Result<i64> {
        self.facade()?.decrement(key).await
    }

    async fn time_to_live(&self, key: &str) -> Result<i64> {
        self.facade()?.time_to_live(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.facade()?.exists(key).await
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        self.facade()?.expire(key, seconds).await
    }

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.facade()?.list_keys(pattern).await
    }

    async fn list_hash_fields(&self, key: &str) -> Result<Vec<String>> {
        self.facade()?.list_hash_fields(key).await
    }

    async fn acquire_lock(&self, name: &str, timeout_secs: u64) -> Result<Option<LockGuard>> {
        self.facade()?.acquire_lock(name, timeout_secs).await
    }

    async fn release_lock(&self, guard: &LockGuard) -> Result<bool> {
        self.facade()?.release_lock(guard).await
    }

    async fn flush_namespace(&self) -> Result<()> {
        self.facade()?.flush_namespace().await
    }

    async fn flush_all(&self) -> Result<()> {
        self.facade()?.flush_all().await
    }

    async fn execute(&self, command: &str, args: &[&str], ttl: Option<i64>) -> Result<Value> {
        self.facade()?.execute(command, args, ttl).await
    }
}
