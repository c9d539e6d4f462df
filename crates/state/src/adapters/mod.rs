//! Reference adapters implementing `ports::TrieDatabase` / `SnapshotStorage`.
//!
//! Production deployments supply their own (RocksDB, etc.) — see spec S1
//! ("the CLI / configuration loading / on-disk database choice" is out of
//! scope for the core). The in-memory adapter here is what tests and the
//! sync loop use by default.

pub mod memory_db;

pub use memory_db::*;
