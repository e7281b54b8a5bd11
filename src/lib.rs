//! Per-shard storage engine adapter for a range-partitioned KV system.
//!
//! This crate sits between an embedded ordered KV store and the
//! replication/rebalancing layers of a distributed key-value system. On
//! top of plain KV access it provides the three operations those layers
//! need:
//!
//! - **Split planning** — scan a key range and propose cut keys so the
//!   resulting sub-ranges approximate a target byte budget
//! - **Snapshot extraction** — stream a shard's key range, applied-log
//!   index and metadata record into a self-describing file, all read from
//!   a single point-in-time view
//! - **Snapshot application** — replace a shard's contents with those of a
//!   previously extracted snapshot file
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │     Replication / Rebalancing Layers        │
//! └─────────────────────────────────────────────┘
//!        │ split_check       │ create_snapshot / apply_snapshot
//!        ▼                   ▼
//! ┌─────────────────────────────────────────────┐
//! │              ShardStorage                   │
//! │  • KV façade (get/set/scan/…)               │
//! │  • split planner                            │
//! │  • snapshot extractor / applier             │
//! └─────────────────────────────────────────────┘
//!    │ KvStore trait                │ Vfs trait
//!    ▼                              ▼
//! ┌──────────────────┐   ┌─────────────────────┐
//! │ Ordered KV store │   │ Snapshot files      │
//! │ (memory/rocksdb) │   │ (db.data)           │
//! └──────────────────┘   └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use strata::{keys, MemoryStore, ShardDescriptor, ShardLocalState, ShardSnapshots, ShardStorage};
//! use std::path::Path;
//!
//! fn main() -> strata::Result<()> {
//!     let storage = ShardStorage::new(MemoryStore::new());
//!
//!     // The shard's reserved records normally come from the replication
//!     // layer applying its log.
//!     let state = ShardLocalState::running(ShardDescriptor::new(1, b"a".to_vec(), b"z".to_vec()));
//!     storage.set(&keys::metadata_key(1, 1), &state.encode()?, false)?;
//!     storage.set(&keys::applied_index_key(1), &42u64.to_be_bytes(), false)?;
//!     storage.set(b"fruit", b"pear", true)?;
//!
//!     // Ship the shard elsewhere.
//!     let applied = storage.create_snapshot(1, Path::new("/tmp/snap-1"))?;
//!     assert_eq!(applied, 42);
//!
//!     let receiver = ShardStorage::new(MemoryStore::new());
//!     receiver.apply_snapshot(1, Path::new("/tmp/snap-1"))?;
//!     assert_eq!(receiver.get(b"fruit")?, b"pear");
//!     Ok(())
//! }
//! ```
//!
//! # Consistency model
//!
//! Every record in a snapshot file — the six header fields and the whole
//! body — is read through one point-in-time view of the store, so the
//! receiver reconstructs the shard exactly as it existed when the view was
//! acquired, regardless of concurrent writes. Application is **not**
//! crash-atomic: a crash mid-apply leaves the shard indeterminate until
//! the replication layer redelivers the snapshot. The single trailing
//! durability barrier is the precondition for declaring the shard applied.

pub mod error;
pub mod fs;
pub mod keys;
pub mod snapshot;
pub mod split;
pub mod storage;
pub mod store;
pub mod types;

// Re-export the main types for convenience.
pub use error::{Error, Result};
pub use fs::{SystemFs, Vfs};
pub use snapshot::{FormatError, ShardSnapshots, SNAPSHOT_FILE};
pub use split::SplitStats;
pub use storage::ShardStorage;
pub use store::{KvStore, MemoryStore, ScanHandler, StoreStats, StoreView, WriteBatch};
#[cfg(feature = "rocksdb-store")]
pub use store::{RocksStore, RocksStoreConfig};
pub use types::{
    Replica, ReplicaRole, ShardDescriptor, ShardEpoch, ShardId, ShardLocalState, ShardState,
};
