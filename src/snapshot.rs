//! Shard snapshot file format.
//!
//! # File Format
//!
//! A shard snapshot is a flat stream of length-prefixed blobs: each blob is
//! a 4-byte big-endian length followed by that many payload bytes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │ shard start key                                 │
//! ├─────────────────────────────────────────────────┤
//! │ shard end key                                   │
//! ├─────────────────────────────────────────────────┤
//! │ applied-index key                               │
//! ├─────────────────────────────────────────────────┤
//! │ applied-index value (8-byte big-endian u64)     │
//! ├─────────────────────────────────────────────────┤
//! │ metadata key                                    │
//! ├─────────────────────────────────────────────────┤
//! │ metadata value (encoded shard-local state)      │
//! ├─────────────────────────────────────────────────┤
//! │ (user key, user value) pairs, ascending         │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! There is no magic number, version byte, checksum or trailer, and none
//! may be added without a migration path: files produced by older processes
//! must keep reading back byte-for-byte.
//!
//! End-of-stream is signalled only by EOF landing exactly at the start of a
//! length prefix. A zero-length blob is legal and is distinguishable from
//! end-of-stream solely by the presence of its length prefix; EOF anywhere
//! inside a prefix or payload is a [`FormatError`].

use std::io::{self, Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::error::{Error, Result};
use crate::types::ShardId;

/// Name of the snapshot data file inside the snapshot directory.
pub const SNAPSHOT_FILE: &str = "db.data";

/// Size of the length prefix in front of every blob.
const LEN_PREFIX: usize = 4;

/// Snapshot-file parse failures.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The start-key blob is absent or empty.
    #[error("missing start field")]
    MissingStart,

    /// The end-key blob is absent or empty.
    #[error("missing end field")]
    MissingEnd,

    /// A header blob is absent.
    #[error("missing {0} field")]
    MissingHeader(&'static str),

    /// A user key has no value blob, or the value is empty.
    #[error("missing value field")]
    MissingValue,

    /// EOF inside a length prefix or payload.
    #[error("unexpected end of file inside a record")]
    UnexpectedEof,
}

/// Write one length-prefixed blob.
pub fn write_blob<W: Write + ?Sized>(w: &mut W, data: &[u8]) -> Result<()> {
    w.write_all(&(data.len() as u32).to_be_bytes())?;
    w.write_all(data)?;
    Ok(())
}

/// Read one length-prefixed blob.
///
/// Returns `None` on clean end-of-stream, which is observed only when EOF
/// lands at offset 0 of the length prefix. A zero-length blob reads back as
/// `Some` of an empty vector.
pub fn read_blob<R: Read + ?Sized>(r: &mut R) -> Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; LEN_PREFIX];
    let mut filled = 0;
    while filled < LEN_PREFIX {
        match r.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(FormatError::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let total = u32::from_be_bytes(prefix) as usize;
    let mut data = vec![0u8; total];
    let mut read = 0;
    while read < total {
        match r.read(&mut data[read..]) {
            Ok(0) => return Err(FormatError::UnexpectedEof.into()),
            Ok(n) => read += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(data))
}

/// Encode an applied-log index the way it is stored and framed.
pub fn encode_applied_index(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

/// Decode an applied-index value.
///
/// The value comes from the store's applied-index record, not from a
/// snapshot file, so a bad length is a codec error rather than a
/// [`FormatError`].
pub fn decode_applied_index(value: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = value.try_into().map_err(|_| {
        Error::Codec(format!(
            "applied index value must be 8 bytes, got {}",
            value.len()
        ))
    })?;
    Ok(u64::from_be_bytes(bytes))
}

/// Shard snapshot extraction and application.
///
/// Implemented by [`ShardStorage`](crate::storage::ShardStorage) over the
/// framed byte-stream format above. Callers that stay behind this trait can
/// later be switched to an engine that ships pre-built sorted string tables
/// instead of a byte stream.
pub trait ShardSnapshots {
    /// Write a consistent snapshot of `shard_id` under the directory `path`
    /// and return the applied-log index captured in it. The caller persists
    /// that index as the snapshot's log watermark.
    fn create_snapshot(&self, shard_id: ShardId, path: &Path) -> Result<u64>;

    /// Replace the shard's current contents with those of a previously
    /// extracted snapshot under `path`.
    fn apply_snapshot(&self, shard_id: ShardId, path: &Path) -> Result<()>;
}
