//! # Keyspace Router
//!
//! A thin data-access layer over a Redis-compatible store that behaves the
//! same whether the store is one node or a hash-partitioned cluster.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        KvClient                             │
//! │  • Picks cluster / standalone from KvConfig                │
//! │  • One live handle, explicit shutdown                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CommandFacade                          │
//! │  • KeyNamespacer: "{tag}:key" (hash tag → one slot)        │
//! │  • ExpirationPolicy: one EXPIRE per written key            │
//! │  • Dispatch table for execute(name, args)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StoreConnection                         │
//! │  • ClusterStore (fan-out KEYS to every primary)            │
//! │  • StandaloneStore (bounded in-flight commands)            │
//! │  • InMemoryStore (tests, embedding)                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keyspace_router::{KvClient, KvConfig, KvOperations};
//!
//! #[tokio::main]
//! async fn main() -> keyspace_router::Result<()> {
//!     let config = KvConfig {
//!         cluster_nodes: Some("127.0.0.1:7000,127.0.0.1:7001".into()),
//!         database: "sessions".into(),
//!         default_ttl_secs: 900,
//!         ..Default::default()
//!     };
//!
//!     let mut client = KvClient::connect(&config).await?;
//!
//!     client.batch_set(&[("s.1", "alice"), ("s.2", "bob")], None).await?;
//!     let values = client.batch_get(&["s.1", "s.2", "s.3"]).await?;
//!     assert_eq!(values, vec![Some("alice".into()), Some("bob".into()), None]);
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees and gaps
//!
//! - Write-then-expire sequences are separate round trips and not atomic.
//! - `execute` only expires `SET`, `HSET` and `HMSET`; see
//!   [`facade::dispatch`].
//! - Errors are returned unchanged; nothing is retried after a command has
//!   been sent.

pub mod config;
pub mod error;
pub mod namespace;
pub mod expiration;
pub mod storage;
pub mod facade;
pub mod client;
pub mod resilience;
pub mod metrics;

pub use config::{KvConfig, SeedNode};
pub use error::{KvError, Result};
pub use namespace::KeyNamespacer;
pub use expiration::{effective_ttl, ExpirationPolicy};
pub use storage::traits::{StoreConnection, Topology};
pub use storage::cluster::ClusterStore;
pub use storage::standalone::{StandaloneOptions, StandaloneStore};
pub use storage::memory::InMemoryStore;
pub use facade::{CommandFacade, CommandKind, KvOperations, LockGuard};
pub use client::{ActiveClient, KvClient};
pub use resilience::retry::RetryConfig;
pub use metrics::LatencyTimer;
