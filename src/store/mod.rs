//! Store-agnostic KV surface consumed by the shard storage layer.
//!
//! The traits here state the semantic contract an engine must honor; the
//! shard layer depends on these rather than on a concrete store. Two
//! engines ship with the crate: [`MemoryStore`] and, behind the
//! `rocksdb-store` feature, a RocksDB-backed one.

pub mod memory;
#[cfg(feature = "rocksdb-store")]
pub mod rocks;

pub use memory::{MemoryStore, MemoryView};
#[cfg(feature = "rocksdb-store")]
pub use rocks::{RocksStore, RocksStoreConfig};

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::error::Result;

/// Callback invoked per entry during a scan.
///
/// Returning `Ok(false)` stops the scan early; an error aborts it and is
/// surfaced to the scan's caller verbatim. The borrowed key and value
/// slices are valid only for the duration of the call — retain them by
/// copying.
pub type ScanHandler<'a> = dyn FnMut(&[u8], &[u8]) -> Result<bool> + 'a;

/// Point-in-time read view of a store.
///
/// All reads through one view observe the same state regardless of
/// concurrent writes. Views are scoped resources exclusively owned by the
/// operation that acquired them; dropping the view releases it.
pub trait StoreView {
    /// Point lookup inside the view. `None` when the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Ascending bounded iteration inside the view over `[start, end)`.
    /// A `None` bound is unbounded on that side.
    fn scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        handler: &mut ScanHandler<'_>,
    ) -> Result<()>;
}

/// Ordered KV store capable of backing shard storage.
///
/// Keys are ordered lexicographically by byte sequence. Ranges are
/// half-open `[start, end)`; for the range operations an empty `start` or
/// `end` means unbounded on that side. The store is shared across
/// operations and provides its own internal synchronization.
pub trait KvStore {
    /// Point-in-time view type handed out by [`KvStore::view`].
    type View<'a>: StoreView
    where
        Self: 'a;

    /// Latest-value point lookup. A missing key yields an empty value, not
    /// an error.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;

    /// Write one key. With `sync`, the write is durable before returning.
    fn set(&self, key: &[u8], value: &[u8], sync: bool) -> Result<()>;

    /// Remove one key. Sync semantics as [`KvStore::set`].
    fn delete(&self, key: &[u8], sync: bool) -> Result<()>;

    /// Atomically remove every key in `[start, end)`.
    fn range_delete(&self, start: &[u8], end: &[u8], sync: bool) -> Result<()>;

    /// Ascending iteration over `[start, end)` against the live store.
    fn scan(&self, start: &[u8], end: &[u8], handler: &mut ScanHandler<'_>) -> Result<()>;

    /// Ascending iteration over every key starting with `prefix`.
    fn prefix_scan(&self, prefix: &[u8], handler: &mut ScanHandler<'_>) -> Result<()>;

    /// Smallest key `>= key` together with its value.
    fn seek(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>>;

    /// Acquire a point-in-time view.
    fn view(&self) -> Result<Self::View<'_>>;

    /// Builder for an atomic multi-key commit, applied with
    /// [`KvStore::write`].
    fn write_batch(&self) -> WriteBatch {
        WriteBatch::default()
    }

    /// Atomically apply a batch. Sync semantics as [`KvStore::set`].
    fn write(&self, batch: WriteBatch, sync: bool) -> Result<()>;

    /// Durability barrier across all previously accepted writes.
    fn sync(&self) -> Result<()>;

    /// Usage counters for this store.
    fn stats(&self) -> StoreStats;
}

/// One buffered mutation inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub(crate) enum BatchOp {
    Set { key: Bytes, value: Bytes },
    Delete { key: Bytes },
    DeleteRange { start: Bytes, end: Bytes },
}

/// Buffered mutations committed atomically with [`KvStore::write`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Buffer a key write.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Set {
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
        });
    }

    /// Buffer a key removal.
    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(BatchOp::Delete {
            key: Bytes::copy_from_slice(key),
        });
    }

    /// Buffer removal of every key in `[start, end)`.
    pub fn delete_range(&mut self, start: &[u8], end: &[u8]) {
        self.ops.push(BatchOp::DeleteRange {
            start: Bytes::copy_from_slice(start),
            end: Bytes::copy_from_slice(end),
        });
    }

    /// Number of buffered operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no buffered operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drop buffered operations so the batch can be reused.
    pub fn reset(&mut self) {
        self.ops.clear();
    }

    pub(crate) fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Point-in-time usage counters reported by a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Keys written since the store was opened.
    pub written_keys: u64,
    /// Key plus value bytes written.
    pub written_bytes: u64,
    /// Keys read (including misses).
    pub read_keys: u64,
    /// Key plus value bytes read.
    pub read_bytes: u64,
    /// Explicit durability barriers issued.
    pub sync_count: u64,
}

/// Shared counter block behind [`KvStore::stats`].
#[derive(Debug, Default)]
pub(crate) struct Counters {
    written_keys: AtomicU64,
    written_bytes: AtomicU64,
    read_keys: AtomicU64,
    read_bytes: AtomicU64,
    sync_count: AtomicU64,
}

impl Counters {
    pub(crate) fn record_write(&self, key: &[u8], value: &[u8]) {
        self.written_keys.fetch_add(1, Ordering::Relaxed);
        self.written_bytes
            .fetch_add((key.len() + value.len()) as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, key: &[u8], value: &[u8]) {
        self.read_keys.fetch_add(1, Ordering::Relaxed);
        self.read_bytes
            .fetch_add((key.len() + value.len()) as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_sync(&self) {
        self.sync_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StoreStats {
        StoreStats {
            written_keys: self.written_keys.load(Ordering::Relaxed),
            written_bytes: self.written_bytes.load(Ordering::Relaxed),
            read_keys: self.read_keys.load(Ordering::Relaxed),
            read_bytes: self.read_bytes.load(Ordering::Relaxed),
            sync_count: self.sync_count.load(Ordering::Relaxed),
        }
    }
}
