//! Core types shared across the shard storage layer.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Shard identifier.
pub type ShardId = u64;

/// Role of a replica inside a shard's replica group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaRole {
    /// Full voting member of the replica group.
    Voter,
    /// Receives the log but does not vote.
    Learner,
}

/// A single replica of a shard, pinned to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    /// Replica id, unique within the cluster.
    pub id: u64,
    /// Store (node) the replica lives on.
    pub store_id: u64,
    /// Voting role.
    pub role: ReplicaRole,
}

impl Replica {
    /// Create a voting replica.
    pub fn new(id: u64, store_id: u64) -> Self {
        Self {
            id,
            store_id,
            role: ReplicaRole::Voter,
        }
    }
}

/// Lifecycle state of a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardState {
    /// Shard is being created and is not serving yet.
    Creating,
    /// Shard is serving reads and writes.
    Running,
    /// Shard is being destroyed.
    Removing,
}

/// Version information for a shard's definition.
///
/// `generation` increases when the key range changes (splits and merges),
/// `config_version` when the replica group changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEpoch {
    /// Replica-group configuration version.
    pub config_version: u64,
    /// Key-range generation.
    pub generation: u64,
}

/// Authoritative definition of a shard: its id, its half-open key range
/// `[start, end)` and its replica group.
///
/// An empty `start` or `end` means the range is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescriptor {
    /// Shard id.
    pub id: ShardId,
    /// Inclusive range start; empty means unbounded below.
    pub start: Vec<u8>,
    /// Exclusive range end; empty means unbounded above.
    pub end: Vec<u8>,
    /// Definition version.
    pub epoch: ShardEpoch,
    /// Replica group.
    pub replicas: Vec<Replica>,
}

impl ShardDescriptor {
    /// Create a descriptor with an empty replica group and zero epoch.
    pub fn new(id: ShardId, start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            start: start.into(),
            end: end.into(),
            epoch: ShardEpoch::default(),
            replicas: Vec::new(),
        }
    }

    /// Set the replica group.
    pub fn with_replicas(mut self, replicas: Vec<Replica>) -> Self {
        self.replicas = replicas;
        self
    }

    /// Set the epoch.
    pub fn with_epoch(mut self, epoch: ShardEpoch) -> Self {
        self.epoch = epoch;
        self
    }
}

/// Shard-local state record persisted in the KV store under the shard's
/// metadata key. This is the record the snapshot extractor reads the shard
/// range out of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardLocalState {
    /// Lifecycle state at the time the record was written.
    pub state: ShardState,
    /// Shard definition.
    pub shard: ShardDescriptor,
}

impl ShardLocalState {
    /// Create a record for a running shard.
    pub fn running(shard: ShardDescriptor) -> Self {
        Self {
            state: ShardState::Running,
            shard,
        }
    }

    /// Serialize the record. Encoding is deterministic, so records written
    /// by different processes sharing a store compare byte-for-byte.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a record.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}
