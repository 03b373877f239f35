//! Store connections.
//!
//! - [`cluster`]: hash-partitioned cluster, fan-out for scans
//! - [`standalone`]: single node with an in-flight limit
//! - [`memory`]: in-process store for tests and embedding

pub mod traits;
pub mod cluster;
pub mod standalone;
pub mod memory;
