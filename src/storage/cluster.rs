//! Hash-partitioned cluster connection.
//!
//! Single-key and same-slot multi-key commands are routed by the cluster
//! client. Scan-style commands (`KEYS`) are not local to one node, so
//! [`StoreConnection::query_all_primaries`] sends them to every primary
//! and concatenates the replies.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::cluster_routing::{MultipleNodeRoutingInfo, ResponsePolicy, RoutingInfo};
use redis::{Cmd, Value};
use tracing::info;

use super::traits::{StoreConnection, Topology};
use crate::config::SeedNode;
use crate::error::{KvError, Result};
use crate::resilience::retry::{retry, RetryConfig};

pub struct ClusterStore {
    connection: ClusterConnection,
    closed: AtomicBool,
}

impl ClusterStore {
    /// Connect through the given seeds. The seed list is only used to
    /// discover the topology and is not kept afterwards.
    pub async fn connect(seeds: &[SeedNode], password: Option<&str>) -> Result<Self> {
        Self::connect_with_retry(seeds, password, &RetryConfig::startup()).await
    }

    pub async fn connect_with_retry(
        seeds: &[SeedNode],
        password: Option<&str>,
        retry_config: &RetryConfig,
    ) -> Result<Self> {
        if seeds.is_empty() {
            return Err(KvError::Config("cluster mode needs at least one seed node".into()));
        }

        let mut builder = ClusterClientBuilder::new(seeds.iter().map(SeedNode::url));
        if let Some(password) = password {
            builder = builder.password(password.to_string());
        }
        let client = builder.build()?;

        let connection = retry("redis_cluster_connect", retry_config, || async {
            client.get_async_connection().await
        })
        .await
        .map_err(|e| {
            crate::metrics::record_connection_error(Topology::Cluster.as_str());
            KvError::from(e)
        })?;

        info!(seeds = seeds.len(), "Connected to store cluster");

        Ok(Self {
            connection,
            closed: AtomicBool::new(false),
        })
    }

    fn live_connection(&self) -> Result<ClusterConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(KvError::UninitializedClient);
        }
        Ok(self.connection.clone())
    }

    fn observe(err: redis::RedisError) -> KvError {
        let err = KvError::from(err);
        if err.is_connection() {
            crate::metrics::record_connection_error(Topology::Cluster.as_str());
        }
        err
    }
}

#[async_trait]
impl StoreConnection for ClusterStore {
    async fn query(&self, cmd: &Cmd) -> Result<Value> {
        let mut conn = self.live_connection()?;
        let reply: Value = cmd.query_async(&mut conn).await.map_err(Self::observe)?;
        Ok(reply)
    }

    async fn query_all_primaries(&self, cmd: &Cmd) -> Result<Vec<Value>> {
        let mut conn = self.live_connection()?;
        let routing = RoutingInfo::MultiNode((
            MultipleNodeRoutingInfo::AllMasters,
            Some(ResponsePolicy::CombineArrays),
        ));
        let merged = conn.route_command(cmd, routing).await.map_err(Self::observe)?;
        Ok(vec![merged])
    }

    fn topology(&self) -> Topology {
        Topology::Cluster
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
