//! Storage abstraction for node lifecycle records.
//!
//! This module provides a trait-based storage abstraction with
//! pluggable backends (in-memory, SQLite). Stores are read-then-write
//! consistent per node: [`NodeStateStore::compare_and_swap`] writes only if
//! the stored state still matches what the caller last read.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryNodeStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteNodeStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;

use crate::core::state::NodeState;
use crate::core::types::{NodeId, UniverseId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A duplicate key was detected.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// The stored state no longer matches the expected state.
    #[error("conflict on node {node_id}: expected {expected}, found {actual}")]
    Conflict {
        node_id: NodeId,
        expected: NodeState,
        actual: NodeState,
    },

    /// Storage lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Generic storage error.
    #[error("storage error: {0}")]
    Other(String),
}

/// Durable lifecycle record of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node identifier.
    pub node_id: NodeId,
    /// Owning universe.
    pub universe_id: UniverseId,
    /// Current lifecycle state.
    pub state: NodeState,
    /// When the record was created.
    pub created_at: SystemTime,
    /// When the state was last written.
    pub updated_at: SystemTime,
}

impl NodeRecord {
    /// Create a freshly registered record in [`NodeState::Uncreated`].
    pub fn new(node_id: NodeId, universe_id: UniverseId) -> Self {
        let now = SystemTime::now();
        Self {
            node_id,
            universe_id,
            state: NodeState::Uncreated,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: start the record in a specific state.
    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }
}

/// Persistence for node lifecycle records.
#[async_trait]
pub trait NodeStateStore: Send + Sync {
    /// Insert a new record. Fails with `DuplicateKey` if the node exists.
    async fn insert(&self, record: NodeRecord) -> Result<(), StorageError>;

    /// Read a record.
    async fn read(&self, node_id: &NodeId) -> Result<NodeRecord, StorageError>;

    /// Write `new` if the stored state is still `expected`.
    ///
    /// Fails with `Conflict` if it is not, and `NotFound` if the node is absent.
    async fn compare_and_swap(
        &self,
        node_id: &NodeId,
        expected: NodeState,
        new: NodeState,
    ) -> Result<NodeRecord, StorageError>;

    /// Delete a record.
    async fn remove(&self, node_id: &NodeId) -> Result<(), StorageError>;

    /// List all records belonging to a universe, ordered by node id.
    async fn list_universe(&self, universe_id: &UniverseId)
    -> Result<Vec<NodeRecord>, StorageError>;
}
