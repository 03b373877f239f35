//! Single-node store connection.
//!
//! Wraps a multiplexed [`ConnectionManager`] (which reconnects on its own)
//! and bounds the number of in-flight commands with a semaphore sized by
//! the configured pool limit.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Cmd, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, Value};
use tokio::sync::Semaphore;
use tracing::info;

use super::traits::{StoreConnection, Topology};
use crate::error::{KvError, Result};
use crate::resilience::retry::{retry, RetryConfig};

/// Endpoint settings for [`StandaloneStore::connect`].
#[derive(Debug, Clone)]
pub struct StandaloneOptions {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db_index: i64,
    pub pool_size: usize,
}

pub struct StandaloneStore {
    connection: ConnectionManager,
    permits: Semaphore,
}

impl StandaloneStore {
    pub async fn connect(options: &StandaloneOptions) -> Result<Self> {
        Self::connect_with_retry(options, &RetryConfig::startup()).await
    }

    pub async fn connect_with_retry(options: &StandaloneOptions, retry_config: &RetryConfig) -> Result<Self> {
        if options.pool_size == 0 {
            return Err(KvError::Config("pool_size must be at least 1".into()));
        }

        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(options.host.clone(), options.port),
            redis: RedisConnectionInfo {
                db: options.db_index,
                password: options.password.clone(),
                ..Default::default()
            },
        };
        let client = Client::open(info)?;

        let connection = retry("redis_connect", retry_config, || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e| {
            crate::metrics::record_connection_error(Topology::Standalone.as_str());
            KvError::from(e)
        })?;

        info!(
            host = %options.host,
            port = options.port,
            db = options.db_index,
            pool_size = options.pool_size,
            "Connected to standalone store"
        );

        Ok(Self {
            connection,
            permits: Semaphore::new(options.pool_size),
        })
    }
}

#[async_trait]
impl StoreConnection for StandaloneStore {
    async fn query(&self, cmd: &Cmd) -> Result<Value> {
        // Closed semaphore == closed store
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| KvError::UninitializedClient)?;

        let mut conn = self.connection.clone();
        let reply: Value = cmd.query_async(&mut conn).await.map_err(|e| {
            let err = KvError::from(e);
            if err.is_connection() {
                crate::metrics::record_connection_error(Topology::Standalone.as_str());
            }
            err
        })?;
        Ok(reply)
    }

    fn topology(&self) -> Topology {
        Topology::Standalone
    }

    async fn close(&self) -> Result<()> {
        self.permits.close();
        Ok(())
    }
}
