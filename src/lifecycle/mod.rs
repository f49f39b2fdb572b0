//! Node lifecycle state machine.
//!
//! [`NodeStateMachine`] is the single authority over a node's lifecycle
//! state. Reads are open to anyone; every write goes through
//! [`transition`](NodeStateMachine::transition) or
//! [`advance_to`](NodeStateMachine::advance_to), which are only reachable
//! from the [`SubTaskExecutor`](crate::SubTaskExecutor).
//!
//! Writes are compare-and-swap against the state read at the start of the
//! call. Callers must still serialise subtasks per node; a violation of that
//! rule surfaces as [`StateTransitionError::Conflict`].

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::core::state::{NodeState, Transition};
use crate::core::types::{NodeId, UniverseId};
use crate::storage::{NodeRecord, NodeStateStore, StorageError};

/// Errors raised when a requested transition cannot be applied.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    /// The transition is not permitted by the lifecycle ordering.
    #[error("illegal transition for node {node_id}: {from} -> {to}")]
    Illegal {
        node_id: NodeId,
        from: NodeState,
        to: NodeState,
    },

    /// The stored state changed between read and write.
    #[error("concurrent update on node {node_id}: expected {expected}, found {actual}")]
    Conflict {
        node_id: NodeId,
        expected: NodeState,
        actual: NodeState,
    },

    /// The underlying store failed.
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for StateTransitionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict {
                node_id,
                expected,
                actual,
            } => StateTransitionError::Conflict {
                node_id,
                expected,
                actual,
            },
            other => StateTransitionError::Storage(other),
        }
    }
}

/// Authoritative per-node lifecycle state backed by a [`NodeStateStore`].
#[derive(Clone)]
pub struct NodeStateMachine {
    store: Arc<dyn NodeStateStore>,
}

impl NodeStateMachine {
    pub fn new(store: Arc<dyn NodeStateStore>) -> Self {
        Self { store }
    }

    /// Current lifecycle state of a node.
    pub async fn current_state(&self, node_id: &NodeId) -> Result<NodeState, StorageError> {
        Ok(self.store.read(node_id).await?.state)
    }

    /// Full stored record of a node.
    pub async fn record(&self, node_id: &NodeId) -> Result<NodeRecord, StorageError> {
        self.store.read(node_id).await
    }

    /// All nodes of a universe.
    pub async fn universe_nodes(
        &self,
        universe_id: &UniverseId,
    ) -> Result<Vec<NodeRecord>, StorageError> {
        self.store.list_universe(universe_id).await
    }

    pub(crate) async fn register(
        &self,
        node_id: NodeId,
        universe_id: UniverseId,
    ) -> Result<NodeRecord, StorageError> {
        let record = NodeRecord::new(node_id, universe_id);
        self.store.insert(record.clone()).await?;
        Ok(record)
    }

    pub(crate) async fn remove(&self, node_id: &NodeId) -> Result<(), StorageError> {
        self.store.remove(node_id).await
    }

    /// Move a node to `target`.
    ///
    /// Requesting the current state is an accepted no-op. Any other target
    /// must be legal per [`NodeState::can_transition_to`].
    pub(crate) async fn transition(
        &self,
        node_id: &NodeId,
        target: NodeState,
    ) -> Result<Transition, StateTransitionError> {
        let current = self.store.read(node_id).await?.state;
        if current == target {
            return Ok(Transition::Unchanged(current));
        }
        self.apply(node_id, current, target).await
    }

    /// Move a node forward to `target` unless it is already at or past it.
    pub(crate) async fn advance_to(
        &self,
        node_id: &NodeId,
        target: NodeState,
    ) -> Result<Transition, StateTransitionError> {
        let current = self.store.read(node_id).await?.state;
        if current.is_at_or_past(target) {
            debug!(%node_id, %current, %target, "node already at or past target state");
            return Ok(Transition::Unchanged(current));
        }
        self.apply(node_id, current, target).await
    }

    async fn apply(
        &self,
        node_id: &NodeId,
        current: NodeState,
        target: NodeState,
    ) -> Result<Transition, StateTransitionError> {
        if !current.can_transition_to(target) {
            return Err(StateTransitionError::Illegal {
                node_id: node_id.clone(),
                from: current,
                to: target,
            });
        }
        self.store
            .compare_and_swap(node_id, current, target)
            .await?;
        Ok(Transition::Changed {
            from: current,
            to: target,
        })
    }
}
