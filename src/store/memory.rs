//! In-memory ordered store.
//!
//! Backs unit tests and small embedded deployments. Keys live in a
//! `BTreeMap` guarded by a `parking_lot::RwLock`. A view is a structural
//! clone of the map taken under the read lock, which gives real
//! point-in-time semantics; keys and values are refcounted [`Bytes`], so
//! the clone shares payloads instead of copying them.

use std::collections::BTreeMap;
use std::ops::Bound;

use bytes::Bytes;
use parking_lot::RwLock;

use super::{BatchOp, Counters, KvStore, ScanHandler, StoreStats, StoreView, WriteBatch};
use crate::error::Result;

type Map = BTreeMap<Bytes, Bytes>;

/// Ordered in-memory KV store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<Map>,
    counters: Counters,
}

/// Map half-open `[start, end)` byte bounds onto `BTreeMap` range bounds.
/// Empty bounds are unbounded.
fn bounds<'a>(start: &'a [u8], end: &'a [u8]) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
    let lo = if start.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Included(start)
    };
    let hi = if end.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Excluded(end)
    };
    (lo, hi)
}

/// An inverted range selects nothing; it must not reach `BTreeMap::range`,
/// which panics on it.
fn is_inverted(start: &[u8], end: &[u8]) -> bool {
    !start.is_empty() && !end.is_empty() && start >= end
}

fn scan_map(
    map: &Map,
    lo: Bound<&[u8]>,
    hi: Bound<&[u8]>,
    handler: &mut ScanHandler<'_>,
) -> Result<()> {
    for (key, value) in map.range::<[u8], _>((lo, hi)) {
        if !handler(key, value)? {
            break;
        }
    }
    Ok(())
}

fn delete_range_locked(map: &mut Map, start: &[u8], end: &[u8]) {
    if is_inverted(start, end) {
        return;
    }
    let (lo, hi) = bounds(start, end);
    let doomed: Vec<Bytes> = map
        .range::<[u8], _>((lo, hi))
        .map(|(key, _)| key.clone())
        .collect();
    for key in doomed {
        map.remove(&key);
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    type View<'a> = MemoryView
    where
        Self: 'a;

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let value = self
            .map
            .read()
            .get(key)
            .map(|v| v.to_vec())
            .unwrap_or_default();
        self.counters.record_read(key, &value);
        Ok(value)
    }

    fn set(&self, key: &[u8], value: &[u8], _sync: bool) -> Result<()> {
        self.counters.record_write(key, value);
        self.map
            .write()
            .insert(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn delete(&self, key: &[u8], _sync: bool) -> Result<()> {
        self.map.write().remove(key);
        Ok(())
    }

    fn range_delete(&self, start: &[u8], end: &[u8], _sync: bool) -> Result<()> {
        delete_range_locked(&mut self.map.write(), start, end);
        Ok(())
    }

    fn scan(&self, start: &[u8], end: &[u8], handler: &mut ScanHandler<'_>) -> Result<()> {
        if is_inverted(start, end) {
            return Ok(());
        }
        let (lo, hi) = bounds(start, end);
        scan_map(&self.map.read(), lo, hi, handler)
    }

    fn prefix_scan(&self, prefix: &[u8], handler: &mut ScanHandler<'_>) -> Result<()> {
        let map = self.map.read();
        for (key, value) in map.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }
            if !handler(key, value)? {
                break;
            }
        }
        Ok(())
    }

    fn seek(&self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .map
            .read()
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.to_vec(), v.to_vec())))
    }

    fn view(&self) -> Result<MemoryView> {
        Ok(MemoryView {
            map: self.map.read().clone(),
        })
    }

    fn write(&self, batch: WriteBatch, _sync: bool) -> Result<()> {
        let mut map = self.map.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Set { key, value } => {
                    self.counters.record_write(&key, &value);
                    map.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    map.remove(&key);
                }
                BatchOp::DeleteRange { start, end } => {
                    delete_range_locked(&mut map, &start, &end);
                }
            }
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.counters.record_sync();
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }
}

/// Point-in-time view over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryView {
    map: Map,
}

impl StoreView for MemoryView {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.get(key).map(|v| v.to_vec()))
    }

    fn scan(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        handler: &mut ScanHandler<'_>,
    ) -> Result<()> {
        if let (Some(s), Some(e)) = (start, end) {
            if s >= e {
                return Ok(());
            }
        }
        let lo = start.map_or(Bound::Unbounded, Bound::Included);
        let hi = end.map_or(Bound::Unbounded, Bound::Excluded);
        scan_map(&self.map, lo, hi, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(store: &MemoryStore, start: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
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
        let store = MemoryStore::new();
        assert!(store.get(b"absent").unwrap().is_empty());
    }

    #[test]
    fn test_set_get_delete() {
        let store = MemoryStore::new();
        store.set(b"k", b"v", false).unwrap();
        assert_eq!(store.get(b"k").unwrap(), b"v");

        store.delete(b"k", false).unwrap();
        assert!(store.get(b"k").unwrap().is_empty());
    }

    #[test]
    fn test_scan_is_ordered_and_half_open() {
        let store = MemoryStore::new();
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
        let store = MemoryStore::new();
        store.set(b"a", b"1", false).unwrap();
        store.set(b"z", b"2", false).unwrap();

        assert_eq!(collect(&store, b"", b"").len(), 2);
        assert_eq!(collect(&store, b"b", b"").len(), 1);
        assert_eq!(collect(&store, b"", b"b").len(), 1);
    }

    #[test]
    fn test_scan_inverted_range_is_empty() {
        let store = MemoryStore::new();
        store.set(b"m", b"v", false).unwrap();
        assert!(collect(&store, b"z", b"a").is_empty());
    }

    #[test]
    fn test_scan_stops_when_handler_says_so() {
        let store = MemoryStore::new();
        for key in [&b"a"[..], b"b", b"c"] {
            store.set(key, b"v", false).unwrap();
        }

        let mut seen = 0;
        store
            .scan(b"", b"", &mut |_, _| {
                seen += 1;
                Ok(seen < 2)
            })
            .unwrap();
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_prefix_scan() {
        let store = MemoryStore::new();
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
    fn test_range_delete() {
        let store = MemoryStore::new();
        for key in [&b"a"[..], b"b", b"c", b"d"] {
            store.set(key, b"v", false).unwrap();
        }

        store.range_delete(b"b", b"d", false).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(b"a").unwrap(), b"v");
        assert!(store.get(b"b").unwrap().is_empty());
        assert!(store.get(b"c").unwrap().is_empty());
        assert_eq!(store.get(b"d").unwrap(), b"v");
    }

    #[test]
    fn test_seek() {
        let store = MemoryStore::new();
        store.set(b"b", b"1", false).unwrap();
        store.set(b"d", b"2", false).unwrap();

        let (key, value) = store.seek(b"c").unwrap().unwrap();
        assert_eq!(key, b"d");
        assert_eq!(value, b"2");

        assert_eq!(store.seek(b"b").unwrap().unwrap().0, b"b");
        assert!(store.seek(b"e").unwrap().is_none());
    }

    #[test]
    fn test_view_is_point_in_time() {
        let store = MemoryStore::new();
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
        let store = MemoryStore::new();
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
    fn test_write_batch_applies_in_order() {
        let store = MemoryStore::new();
        store.set(b"stale", b"x", false).unwrap();

        let mut batch = store.write_batch();
        batch.set(b"a", b"1");
        batch.set(b"b", b"2");
        batch.delete_range(b"a", b"b");
        batch.delete(b"stale");
        assert_eq!(batch.len(), 4);

        store.write(batch, false).unwrap();

        // The range delete ran after the sets, so only "a" was wiped.
        assert!(store.get(b"a").unwrap().is_empty());
        assert_eq!(store.get(b"b").unwrap(), b"2");
        assert!(store.get(b"stale").unwrap().is_empty());
    }

    #[test]
    fn test_stats_counters() {
        let store = MemoryStore::new();
        store.set(b"key", b"value", false).unwrap();
        store.get(b"key").unwrap();
        store.sync().unwrap();

        let stats = store.stats();
        assert_eq!(stats.written_keys, 1);
        assert_eq!(stats.written_bytes, 8);
        assert_eq!(stats.read_keys, 1);
        assert_eq!(stats.sync_count, 1);
    }
}
