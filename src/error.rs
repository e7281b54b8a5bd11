//! Error types for the shard storage layer.

use std::io;
use thiserror::Error;

use crate::snapshot::FormatError;
use crate::types::ShardId;

/// Result type alias for shard storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the shard storage layer.
///
/// Upstream logic relies on the variants staying distinct: a shard whose
/// metadata has not been written yet ([`Error::NoMetadata`]) is retried
/// later, while an I/O failure is escalated.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem errors from snapshot file handling.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Errors propagated verbatim from the underlying KV store.
    #[error("store error: {0}")]
    Store(String),

    /// A snapshot file that does not follow the framed layout.
    #[error("snapshot format error: {0}")]
    Format(#[from] FormatError),

    /// The shard has no metadata record under its metadata prefix.
    #[error("no metadata for shard {0}")]
    NoMetadata(ShardId),

    /// The shard has no applied-index record.
    #[error("no applied index for shard {0}")]
    NoAppliedIndex(ShardId),

    /// A stored record (shard-local state or applied index) failed to
    /// encode or decode.
    #[error("record codec error: {0}")]
    Codec(String),

    /// A reserved key did not match the expected layout.
    #[error("bad reserved key: {0}")]
    Key(String),

    /// A snapshot file whose metadata belongs to a different shard.
    #[error("snapshot is for shard {actual}, expected shard {expected}")]
    ShardMismatch {
        /// Shard the caller asked to apply.
        expected: ShardId,
        /// Shard recorded in the snapshot's metadata.
        actual: ShardId,
    },
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}
