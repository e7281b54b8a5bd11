//! RocksDB-backed store engine.
//!
//! Maps the [`KvStore`] contract onto RocksDB: point-in-time views are
//! RocksDB snapshots, range deletes go through a write batch, and the
//! durability barrier is a WAL flush. Enabled with the `rocksdb-store`
//! feature.

use std::path::{Path, PathBuf};

use rocksdb::{
    DBIteratorWithThreadMode, Direction, IteratorMode, Options, ReadOptions,
    SnapshotWithThreadMode, WriteBatch as RocksWriteBatch, WriteOptions, DB,
};
use tracing::info;

use super::{BatchOp, Counters, KvStore, ScanHandler, StoreStats, StoreView, WriteBatch};
use crate::error::{Error, Result};

/// Configuration for a RocksDB-backed store.
#[derive(Debug, Clone)]
pub struct RocksStoreConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Create the database if it does not exist.
    pub create_if_missing: bool,
    /// Maximum number of open files.
    pub max_open_files: i32,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
}

impl RocksStoreConfig {
    /// Create a config for the given database directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            max_open_files: 1000,
            write_buffer_size: 64 * 1024 * 1024,
        }
    }

    /// Set whether to create a missing database.
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Set the write buffer size.
    pub fn with_write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }
}

/// [`KvStore`] backed by a RocksDB database.
pub struct RocksStore {
    db: DB,
    counters: Counters,
}

fn store_err(e: rocksdb::Error) -> Error {
    Error::Store(e.to_string())
}

fn write_opts(sync: bool) -> WriteOptions {
    let mut opts = WriteOptions::default();
    opts.set_sync(sync);
    opts
}

/// Drive a RocksDB iterator through the shared handler protocol, guarding
/// the exclusive `end` bound explicitly.
fn drive_iter<D: rocksdb::DBAccess>(
    iter: DBIteratorWithThreadMode<'_, D>,
    end: &[u8],
    handler: &mut ScanHandler<'_>,
) -> Result<()> {
    for item in iter {
        let (key, value) = item.map_err(store_err)?;
        if !end.is_empty() && key.as_ref() >= end {
            break;
        }
        if !handler(&key, &value)? {
            break;
        }
    }
    Ok(())
}

fn range_read_opts(end: &[u8]) -> ReadOptions {
    let mut opts = ReadOptions::default();
    if !end.is_empty() {
        opts.set_iterate_upper_bound(end.to_vec());
    }
    opts
}

fn start_mode(start: &[u8]) -> IteratorMode<'_> {
    if start.is_empty() {
        IteratorMode::Start
    } else {
        IteratorMode::From(start, Direction::Forward)
    }
}

impl RocksStore {
    /// Open (or create) the database described by `config`.
    pub fn open(config: RocksStoreConfig) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);

        let db = DB::open(&opts, &config.path).map_err(store_err)?;
        info!(path = ?config.path, "opened rocksdb store");

        Ok(Self {
            db,
            counters: Counters::default(),
        })
    }

    /// Database directory.
    pub fn path(&self) -> &Path {
        self.db.path()
    }
}

impl KvStore for RocksStore {
    type View<'a> = RocksView<'a>
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let value = self.db.get(key).map_err(store_err)?.unwrap_or_default();
        self.counters.record_read(key, &value);
        Ok(value)
    }

    fn set(&self, key: &[u8], value: &[u8], sync: bool) -> Result<()> {
        self.counters.record_write(key, value);
        self.db
            .put_opt(key, value, &write_opts(sync))
            .map_err(store_err)
    }

    fn delete(&self, key: &[u8], sync: bool) -> Result<()> {
        self.db.delete_opt(key, &write_opts(sync)).map_err(store_err)
    }

    fn range_delete(&self, start: &[u8], end: &[u8], sync: bool) -> Result<()> {
        let mut batch = RocksWriteBatch::default();
        if end.is_empty() {
            // No native unbounded range delete; enumerate the tail instead.
            let iter = self.db.iterator(start_mode(start));
            for item in iter {
                let (key, _) = item.map_err(store_err)?;
                batch.delete(key);
            }
        } else {
            batch.delete_range(start, end);
        }
        self.db.write_opt(batch, &write_opts(sync)).map_err(store_err)
    }

    fn scan(&self, start: &[u8], end: &[u8], handler: &mut ScanHandler<'_>) -> Result<()> {
        let iter = self.db.iterator_opt(start_mode(start), range_read_opts(end));
        drive_iter(iter, end, handler)
    }

    fn prefix_scan(&self, prefix: &[u8], handler: &mut ScanHandler<'_>) -> Result<()> {
        let iter = self.db.iterator(start_mode(prefix));
        for item in iter {
            let (key, value) = item.map_err(store_err)?;
            if !key.starts_with(prefix) {
                break;
            }
            if !handler(&key, &value)? {
                break;
            }
        }
        Ok(())
    }

    fn seek(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let mut iter = self.db.iterator(start_mode(key));
        match iter.next() {
            Some(item) => {
                let (key, value) = item.map_err(store_err)?;
                Ok(Some((key.into_vec(), value.into_vec())))
            }
            None => Ok(None),
        }
    }

    fn view(&self) -> Result<RocksView<'_>> {
        Ok(RocksView {
            snapshot: self.db.snapshot(),
        })
    }

    fn write(&self, batch: WriteBatch, sync: bool) -> Result<()> {
        let mut rocks_batch = RocksWriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Set { key, value } => {
                    self.counters.record_write(&key, &value);
                    rocks_batch.put(&key, &value);
                }
                BatchOp::Delete { key } => rocks_batch.delete(&key),
                BatchOp::DeleteRange { start, end } => rocks_batch.delete_range(&start, &end),
            }
        }
        self.db
            .write_opt(rocks_batch, &write_opts(sync))
            .map_err(store_err)
    }

    fn sync(&self) -> Result<()> {
        self.counters.record_sync();
        self.db.flush_wal(true).map_err(store_err)
    }

    fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }
}

/// Point-in-time view over a [`RocksStore`], backed by a RocksDB snapshot.
pub struct RocksView<'a> {
    snapshot: SnapshotWithThreadMode<'a, DB>,
}

impl StoreView for RocksView<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.snapshot.get(key).map_err(store_err)
    }

    fn scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        handler: &mut ScanHandler<'_>,
    ) -> Result<()> {
        let start = start.unwrap_or_default();
        let end = end.unwrap_or_default();
        let iter = self
            .snapshot
            .iterator_opt(start_mode(start), range_read_opts(end));
        drive_iter(iter, end, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn open_store(dir: &TempDir) -> RocksStore {
        RocksStore::open(RocksStoreConfig::new(dir.path())).unwrap()
    }

    fn collect(store: &RocksStore, start: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        store
            .scan(start, end, &mut |k, v| {
                out.push((k.to_vec(), v.to_vec()));
                Ok(true)
            })
            .unwrap();
        out
    }

    #[test]
    fn test_get_missing_key_is_empty() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        assert!(store.get(b"absent").unwrap().is_empty());

        store.set(b"k", b"v", false).unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"v");
    }

    #[test]
    fn test_scan_is_ordered_and_half_open() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        for key in [&b"c"[..], b"a", b"d", b"b"] {
            store.set(key, b"v", false).unwrap();
        }

        let keys: Vec<_> = collect(&store, b"a", b"d")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_scan_empty_bounds_are_unbounded() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.set(b"a", b"1", false).unwrap();
        store.set(b"z", b"2", false).unwrap();

        assert_eq!(collect(&store, b"", b"").len(), 2);
        assert_eq!(collect(&store, b"b", b"").len(), 1);
        assert_eq!(collect(&store, b"", b"b").len(), 1);
        assert!(collect(&store, b"z0", b"a").is_empty());
    }

    #[test]
    fn test_range_delete_bounded() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        for key in [&b"a"[..], b"b", b"c", b"d"] {
            store.set(key, b"v", false).unwrap();
        }

        store.range_delete(b"b", b"d", false).unwrap();

        assert_eq!(store.get(b"a").unwrap(), b"v");
        assert!(store.get(b"b").unwrap().is_empty());
        assert!(store.get(b"c").unwrap().is_empty());
        assert_eq!(store.get(b"d").unwrap(), b"v");
    }

    #[test]
    fn test_range_delete_unbounded_end() {
        // The empty-end bound takes the enumerate-and-delete path.
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        for key in [&b"a"[..], b"b", b"c"] {
            store.set(key, b"v", false).unwrap();
        }

        store.range_delete(b"b", b"", false).unwrap();

        assert_eq!(store.get(b"a").unwrap(), b"v");
        assert!(store.get(b"b").unwrap().is_empty());
        assert!(store.get(b"c").unwrap().is_empty());
    }

    #[test]
    fn test_prefix_scan() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        for key in [&b"app"[..], b"apple", b"apply", b"banana"] {
            store.set(key, b"v", false).unwrap();
        }

        let mut keys = Vec::new();
        store
            .prefix_scan(b"appl", &mut |k, _| {
                keys.push(k.to_vec());
                Ok(true)
            })
            .unwrap();
        assert_eq!(keys, vec![b"apple".to_vec(), b"apply".to_vec()]);
    }

    #[test]
    fn test_seek() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.set(b"b", b"1", false).unwrap();
        store.set(b"d", b"2", false).unwrap();

        let (key, value) = store.seek(b"c").unwrap().unwrap();
        assert_eq!(key, b"d");
        assert_eq!(value, b"2");
        assert!(store.seek(b"e").unwrap().is_none());
    }

    #[test]
    fn test_view_is_point_in_time() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.set(b"k", b"old", false).unwrap();

        let view = store.view().unwrap();
        store.set(b"k", b"new", false).unwrap();
        store.set(b"later", b"x", false).unwrap();

        assert_eq!(view.get(b"k").unwrap().unwrap(), b"old");
        assert!(view.get(b"later").unwrap().is_none());
        assert_eq!(store.get(b"k").unwrap(), b"new");
    }

    #[test]
    fn test_view_scan_bounds() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        for key in [&b"a"[..], b"b", b"c"] {
            store.set(key, b"v", false).unwrap();
        }
        let view = store.view().unwrap();

        let mut keys = Vec::new();
        view.scan(Some(b"b"), None, &mut |k, _| {
            keys.push(k.to_vec());
            Ok(true)
        })
        .unwrap();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);

        keys.clear();
        view.scan(None, Some(b"b"), &mut |k, _| {
            keys.push(k.to_vec());
            Ok(true)
        })
        .unwrap();
        assert_eq!(keys, vec![b"a".to_vec()]);
    }

    #[test]
    fn test_write_batch_applies_atomically() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);
        store.set(b"stale", b"x", false).unwrap();

        let mut batch = store.write_batch();
        batch.set(b"a", b"1");
        batch.set(b"b", b"2");
        batch.delete_range(b"a", b"b");
        batch.delete(b"stale");
        store.write(batch, false).unwrap();

        assert!(store.get(b"a").unwrap().is_empty());
        assert_eq!(store.get(b"b").unwrap(), b"2");
        assert!(store.get(b"stale").unwrap().is_empty());
    }
}
