//! In-memory storage implementation.
//!
//! Provides a thread-safe in-memory backend for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

use super::{NodeRecord, NodeStateStore, StorageError};
use crate::core::state::NodeState;
use crate::core::types::{NodeId, UniverseId};

/// In-memory storage backend.
///
/// Thread-safe storage using RwLock for concurrent access. The
/// compare-and-swap check and write happen under one write lock.
/// Data is not persisted across restarts.
pub struct InMemoryNodeStore {
    nodes: RwLock<HashMap<NodeId, NodeRecord>>,
}

impl InMemoryNodeStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStateStore for InMemoryNodeStore {
    async fn insert(&self, record: NodeRecord) -> Result<(), StorageError> {
        let mut nodes = self.nodes.write().map_err(|_| StorageError::LockPoisoned)?;
        if nodes.contains_key(&record.node_id) {
            return Err(StorageError::DuplicateKey(format!(
                "node: {}",
                record.node_id
            )));
        }
        nodes.insert(record.node_id.clone(), record);
        Ok(())
    }

    async fn read(&self, node_id: &NodeId) -> Result<NodeRecord, StorageError> {
        let nodes = self.nodes.read().map_err(|_| StorageError::LockPoisoned)?;
        nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("node: {}", node_id)))
    }

    async fn compare_and_swap(
        &self,
        node_id: &NodeId,
        expected: NodeState,
        new: NodeState,
    ) -> Result<NodeRecord, StorageError> {
        let mut nodes = self.nodes.write().map_err(|_| StorageError::LockPoisoned)?;
        let record = nodes
            .get_mut(node_id)
            .ok_or_else(|| StorageError::NotFound(format!("node: {}", node_id)))?;
        if record.state != expected {
            return Err(StorageError::Conflict {
                node_id: node_id.clone(),
                expected,
                actual: record.state,
            });
        }
        record.state = new;
        record.updated_at = SystemTime::now();
        Ok(record.clone())
    }

    async fn remove(&self, node_id: &NodeId) -> Result<(), StorageError> {
        let mut nodes = self.nodes.write().map_err(|_| StorageError::LockPoisoned)?;
        nodes
            .remove(node_id)
            .ok_or_else(|| StorageError::NotFound(format!("node: {}", node_id)))?;
        Ok(())
    }

    async fn list_universe(
        &self,
        universe_id: &UniverseId,
    ) -> Result<Vec<NodeRecord>, StorageError> {
        let nodes = self.nodes.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut result: Vec<_> = nodes
            .values()
            .filter(|r| &r.universe_id == universe_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        Ok(result)
    }
}
