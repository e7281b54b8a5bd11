//! Reserved-key layouts for per-shard system records.
//!
//! Two reserved key families live alongside user data in the same store:
//! the applied-index key (exactly one per shard) and the metadata keys (one
//! per metadata version). Shard ids and versions are encoded big-endian, so
//! lexicographic key order matches numeric order and all metadata keys of
//! one shard form a single contiguous block, ordered by version. A forward
//! scan from [`metadata_key`]`(shard_id, 0)` therefore enumerates exactly
//! that shard's metadata records, oldest version first.
//!
//! The layouts are stable across processes sharing a store.

use crate::error::{Error, Result};
use crate::types::ShardId;

/// First byte of every reserved key. User keyspaces must stay out of this
/// prefix.
const RESERVED_PREFIX: u8 = 0x01;

/// Tag byte for applied-index keys.
const TAG_APPLIED_INDEX: u8 = 0x01;

/// Tag byte for shard metadata keys.
const TAG_METADATA: u8 = 0x02;

/// prefix + tag + shard id
const APPLIED_INDEX_KEY_LEN: usize = 2 + 8;

/// prefix + tag + shard id + version
const METADATA_KEY_LEN: usize = 2 + 8 + 8;

/// Key storing the shard's applied-log index.
pub fn applied_index_key(shard_id: ShardId) -> Vec<u8> {
    let mut key = Vec::with_capacity(APPLIED_INDEX_KEY_LEN);
    key.push(RESERVED_PREFIX);
    key.push(TAG_APPLIED_INDEX);
    key.extend_from_slice(&shard_id.to_be_bytes());
    key
}

/// Key storing the shard metadata record for the given version.
pub fn metadata_key(shard_id: ShardId, version: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(METADATA_KEY_LEN);
    key.push(RESERVED_PREFIX);
    key.push(TAG_METADATA);
    key.extend_from_slice(&shard_id.to_be_bytes());
    key.extend_from_slice(&version.to_be_bytes());
    key
}

/// Extract the shard id back out of a metadata key.
pub fn shard_id_from_metadata_key(key: &[u8]) -> Result<ShardId> {
    if key.len() != METADATA_KEY_LEN || key[0] != RESERVED_PREFIX || key[1] != TAG_METADATA {
        return Err(Error::Key(format!("not a metadata key: {key:02x?}")));
    }
    let mut id = [0u8; 8];
    id.copy_from_slice(&key[2..10]);
    Ok(u64::from_be_bytes(id))
}
