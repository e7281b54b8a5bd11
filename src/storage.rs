//! Shard storage adapter over an ordered KV store.
//!
//! [`ShardStorage`] wraps a [`KvStore`] and a [`Vfs`] and adds the three
//! operations the replication and rebalancing layers need on top of plain
//! KV access:
//!
//! - [`split_check`](ShardStorage::split_check) — scan a range and propose
//!   cut keys approximating a target byte budget,
//! - [`create_snapshot`](ShardSnapshots::create_snapshot) — stream a
//!   shard's reserved records and user pairs into a self-describing file,
//!   all read from one point-in-time view,
//! - [`apply_snapshot`](ShardSnapshots::apply_snapshot) — replace a
//!   shard's contents with those of a snapshot file.
//!
//! Everything else is a uniform pass-through to the wrapped store.
//!
//! Snapshot extraction and application run to completion on the caller's
//! thread and may block on store or file I/O throughout. Concurrent
//! snapshots of different shards are independent; concurrent snapshots of
//! the same shard must be serialized by the caller.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fs::{SystemFs, Vfs};
use crate::keys;
use crate::snapshot::{self, FormatError, ShardSnapshots, SNAPSHOT_FILE};
use crate::split::{SplitAccumulator, SplitStats};
use crate::store::{KvStore, ScanHandler, StoreStats, StoreView, WriteBatch};
use crate::types::{ShardId, ShardLocalState};

/// Storage adapter for one node's shard data.
pub struct ShardStorage<S, F = SystemFs> {
    kv: S,
    fs: F,
}

impl<S: KvStore> ShardStorage<S> {
    /// Wrap a store, using the operating-system filesystem for snapshots.
    pub fn new(kv: S) -> Self {
        Self { kv, fs: SystemFs }
    }
}

impl<S: KvStore, F: Vfs> ShardStorage<S, F> {
    /// Wrap a store with a caller-provided filesystem.
    pub fn with_fs(kv: S, fs: F) -> Self {
        Self { kv, fs }
    }

    /// The wrapped store.
    pub fn kv(&self) -> &S {
        &self.kv
    }

    /// Latest-value point lookup; missing keys yield an empty value.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.kv.get(key)
    }

    /// Write one key.
    pub fn set(&self, key: &[u8], value: &[u8], sync: bool) -> Result<()> {
        self.kv.set(key, value, sync)
    }

    /// Remove one key.
    pub fn delete(&self, key: &[u8], sync: bool) -> Result<()> {
        self.kv.delete(key, sync)
    }

    /// Atomically remove every key in `[start, end)`.
    pub fn range_delete(&self, start: &[u8], end: &[u8], sync: bool) -> Result<()> {
        self.kv.range_delete(start, end, sync)
    }

    /// Ascending iteration over `[start, end)`.
    pub fn scan(&self, start: &[u8], end: &[u8], handler: &mut ScanHandler<'_>) -> Result<()> {
        self.kv.scan(start, end, handler)
    }

    /// Ascending iteration over every key starting with `prefix`.
    pub fn prefix_scan(&self, prefix: &[u8], handler: &mut ScanHandler<'_>) -> Result<()> {
        self.kv.prefix_scan(prefix, handler)
    }

    /// Smallest key `>= key` together with its value.
    pub fn seek(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.kv.seek(key)
    }

    /// Acquire a point-in-time view of the store.
    pub fn view(&self) -> Result<S::View<'_>> {
        self.kv.view()
    }

    /// Builder for an atomic multi-key commit.
    pub fn write_batch(&self) -> WriteBatch {
        self.kv.write_batch()
    }

    /// Atomically apply a batch.
    pub fn write(&self, batch: WriteBatch, sync: bool) -> Result<()> {
        self.kv.write(batch, sync)
    }

    /// Durability barrier across all previously accepted writes.
    pub fn sync(&self) -> Result<()> {
        self.kv.sync()
    }

    /// Usage counters of the wrapped store.
    pub fn stats(&self) -> StoreStats {
        self.kv.stats()
    }

    /// Scan `[start, end)` and propose cut keys so that each resulting
    /// segment accumulates roughly `target_size` bytes. Returns the
    /// range's total byte volume, its entry count and the cut keys; a
    /// range whose total stays under the target yields no cuts.
    ///
    /// Scan errors discard any partial result.
    pub fn split_check(&self, start: &[u8], end: &[u8], target_size: u64) -> Result<SplitStats> {
        let mut acc = SplitAccumulator::new(target_size);
        self.kv.scan(start, end, &mut |key, value| {
            acc.observe(key, value);
            Ok(true)
        })?;
        Ok(acc.finish())
    }

    /// Stream the snapshot header and body into `file`. All reads go
    /// through one view acquired here, so every record in the file is
    /// drawn from the same point in time.
    fn write_snapshot<W: Write>(&self, shard_id: ShardId, file: &mut W) -> Result<u64> {
        let view = self.kv.view()?;

        let applied_key = keys::applied_index_key(shard_id);
        let applied_value = view
            .get(&applied_key)?
            .ok_or(Error::NoAppliedIndex(shard_id))?;
        let (metadata_key, metadata_value) = shard_metadata_record(&view, shard_id)?;

        let state = ShardLocalState::decode(&metadata_value)?;
        let applied_index = snapshot::decode_applied_index(&applied_value)?;
        let start = state.shard.start;
        let end = state.shard.end;
        debug!(
            shard_id,
            applied_index,
            start = ?start,
            end = ?end,
            "located shard records for snapshot"
        );

        snapshot::write_blob(file, &start)?;
        snapshot::write_blob(file, &end)?;
        snapshot::write_blob(file, &applied_key)?;
        snapshot::write_blob(file, &applied_value)?;
        snapshot::write_blob(file, &metadata_key)?;
        snapshot::write_blob(file, &metadata_value)?;

        let lower = (!start.is_empty()).then_some(start.as_slice());
        let upper = (!end.is_empty()).then_some(end.as_slice());
        let mut entries = 0u64;
        view.scan(lower, upper, &mut |key, value| {
            // The upper bound already excludes `end`; guard anyway so a
            // misbehaving view cannot leak foreign keys into the file.
            if !end.is_empty() && key >= end.as_slice() {
                return Ok(false);
            }
            snapshot::write_blob(file, key)?;
            snapshot::write_blob(file, value)?;
            entries += 1;
            Ok(true)
        })?;
        file.flush()?;

        debug!(shard_id, entries, "snapshot body written");
        Ok(applied_index)
    }
}

/// Locate the shard's metadata record inside the view: iterate forward
/// from the metadata prefix and keep the last entry whose key still
/// decodes to this shard, which is the highest metadata version. Key and
/// value are copied before the iteration advances.
fn shard_metadata_record<V: StoreView>(
    view: &V,
    shard_id: ShardId,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let prefix = keys::metadata_key(shard_id, 0);
    let mut found: Option<(Vec<u8>, Vec<u8>)> = None;
    view.scan(Some(&prefix), None, &mut |key, value| {
        match keys::shard_id_from_metadata_key(key) {
            Ok(id) if id == shard_id => {
                found = Some((key.to_vec(), value.to_vec()));
                Ok(true)
            }
            _ => Ok(false),
        }
    })?;
    found.ok_or(Error::NoMetadata(shard_id))
}

/// Read a header blob that must be present.
fn header_blob<R: Read>(file: &mut R, field: &'static str) -> Result<Vec<u8>> {
    snapshot::read_blob(file)?.ok_or(Error::Format(FormatError::MissingHeader(field)))
}

/// Read a range-bound header blob; absent and empty are both format
/// errors, which existing snapshot files rely on.
fn range_blob<R: Read>(file: &mut R, missing: FormatError) -> Result<Vec<u8>> {
    match snapshot::read_blob(file)? {
        Some(blob) if !blob.is_empty() => Ok(blob),
        _ => Err(missing.into()),
    }
}

impl<S: KvStore, F: Vfs> ShardSnapshots for ShardStorage<S, F> {
    fn create_snapshot(&self, shard_id: ShardId, path: &Path) -> Result<u64> {
        self.fs.mkdir_all(path)?;
        let file_path = self.fs.path_join(path, SNAPSHOT_FILE);
        info!(shard_id, path = ?file_path, "creating shard snapshot");

        let mut file = BufWriter::new(self.fs.create(&file_path)?);
        let result = self.write_snapshot(shard_id, &mut file);
        drop(file);

        match result {
            Ok(applied_index) => {
                info!(shard_id, applied_index, "shard snapshot created");
                Ok(applied_index)
            }
            Err(err) => {
                // Leave nothing half-written behind. The original error
                // wins; a cleanup failure is only logged.
                if let Err(cleanup) = self.fs.remove_file(&file_path) {
                    warn!(
                        shard_id,
                        path = ?file_path,
                        error = %cleanup,
                        "failed to remove partial snapshot file"
                    );
                }
                Err(err)
            }
        }
    }

    fn apply_snapshot(&self, shard_id: ShardId, path: &Path) -> Result<()> {
        let file_path = self.fs.path_join(path, SNAPSHOT_FILE);
        info!(shard_id, path = ?file_path, "applying shard snapshot");
        let mut file = BufReader::new(self.fs.open(&file_path)?);

        let start = range_blob(&mut file, FormatError::MissingStart)?;
        let end = range_blob(&mut file, FormatError::MissingEnd)?;
        let applied_key = header_blob(&mut file, "applied index key")?;
        let applied_value = header_blob(&mut file, "applied index value")?;
        let metadata_key = header_blob(&mut file, "metadata key")?;
        let metadata_value = header_blob(&mut file, "metadata value")?;

        // The file is authoritative, but a metadata record that decodes
        // cleanly and names another shard is a routing mistake; reject it
        // before touching the store.
        if let Ok(state) = ShardLocalState::decode(&metadata_value) {
            if state.shard.id != shard_id {
                return Err(Error::ShardMismatch {
                    expected: shard_id,
                    actual: state.shard.id,
                });
            }
        }

        self.kv.range_delete(&start, &end, false)?;
        self.kv.set(&applied_key, &applied_value, false)?;
        self.kv.set(&metadata_key, &metadata_value, false)?;

        let mut restored = 0u64;
        loop {
            let Some(key) = snapshot::read_blob(&mut file)? else {
                break;
            };
            let value = match snapshot::read_blob(&mut file)? {
                Some(value) if !value.is_empty() => value,
                _ => return Err(FormatError::MissingValue.into()),
            };
            self.kv.set(&key, &value, false)?;
            restored += 1;
        }

        self.kv.sync()?;
        info!(shard_id, restored, "shard snapshot applied");
        Ok(())
    }
}
