//! Configuration for the client selector.
//!
//! The presence of `cluster_nodes` selects cluster mode; otherwise the
//! standalone fields are used.
//!
//! # Example
//!
//! ```
//! use keyspace_router::KvConfig;
//!
//! // Standalone defaults
//! let config = KvConfig::default();
//! assert_eq!(config.port, 6379);
//! assert!(!config.is_cluster());
//!
//! // Cluster, namespaced by database id
//! let config = KvConfig {
//!     cluster_nodes: Some("10.0.0.1:7000,10.0.0.2:7000".into()),
//!     database: "orders".into(),
//!     default_ttl_secs: 600,
//!     ..Default::default()
//! };
//! assert!(config.is_cluster());
//! assert_eq!(config.seed_nodes().unwrap().len(), 2);
//! ```

use serde::Deserialize;

use crate::error::{KvError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct KvConfig {
    /// Comma-separated `host:port` seeds. Non-empty selects cluster mode.
    #[serde(default)]
    pub cluster_nodes: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Logical database id, used as the namespace tag in cluster mode.
    #[serde(default)]
    pub database: String,

    /// TTL applied to writes that don't pass their own
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: i64,

    /// Standalone endpoint
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub db_index: i64,

    /// Max in-flight commands on the standalone connection
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_ttl_secs() -> i64 { 3600 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 6379 }
fn default_pool_size() -> usize { 10 }

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            cluster_nodes: None,
            password: None,
            database: String::new(),
            default_ttl_secs: default_ttl_secs(),
            host: default_host(),
            port: default_port(),
            db_index: 0,
            pool_size: default_pool_size(),
        }
    }
}

/// One cluster seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedNode {
    pub host: String,
    pub port: u16,
}

impl SeedNode {
    fn parse(raw: &str) -> Result<Self> {
        let (host, port) = raw
            .rsplit_once(':')
            .ok_or_else(|| KvError::Config(format!("Seed node '{}' is not host:port", raw)))?;
        if host.is_empty() {
            return Err(KvError::Config(format!("Seed node '{}' has no host", raw)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| KvError::Config(format!("Seed node '{}' has invalid port: {}", raw, e)))?;
        Ok(Self { host: host.to_string(), port })
    }

    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

impl KvConfig {
    /// Parse `cluster_nodes`, skipping blank entries. An unset or blank list
    /// yields an empty vec.
    pub fn seed_nodes(&self) -> Result<Vec<SeedNode>> {
        match self.cluster_nodes.as_deref() {
            None => Ok(Vec::new()),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(SeedNode::parse)
                .collect(),
        }
    }

    pub fn is_cluster(&self) -> bool {
        self.cluster_nodes
            .as_deref()
            .is_some_and(|raw| raw.split(',').any(|s| !s.trim().is_empty()))
    }
}
