use async_trait::async_trait;
use redis::{Cmd, Value};

use crate::error::Result;

/// Deployment shape of the store behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Standalone,
    Cluster,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::Cluster => "cluster",
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live handle to the store. Commands arrive fully built, with keys
/// already namespaced; implementations only move them over the wire.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Issue one command and return the raw reply.
    async fn query(&self, cmd: &Cmd) -> Result<Value>;

    /// Issue a command on every slot-owning node and return one reply per
    /// node (or one already-merged reply).
    ///
    /// Single-node stores just run the command once.
    async fn query_all_primaries(&self, cmd: &Cmd) -> Result<Vec<Value>> {
        Ok(vec![self.query(cmd).await?])
    }

    fn topology(&self) -> Topology;

    /// Stop accepting commands. The underlying sockets are released once
    /// the last reference to the handle is dropped.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
