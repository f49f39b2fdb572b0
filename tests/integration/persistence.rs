//! SQLite persistence integration tests.
//!
//! Tests that verify lifecycle state survives executor restarts.

use crate::common::full_configure;
use nodeconf::testing::{ScriptedAdapter, seed_node};
use nodeconf::{
    ExecutionContext, NodeId, NodeState, SqliteNodeStore, SubTaskExecutor, Transition, UniverseId,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

async fn executor_at(path: &Path) -> SubTaskExecutor {
    let store = SqliteNodeStore::new(path).await.unwrap();
    SubTaskExecutor::new(Arc::new(ScriptedAdapter::new()), Arc::new(store))
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nodes.db");

    {
        let store = SqliteNodeStore::new(&db).await.unwrap();
        seed_node(&store, "N1", "u1", NodeState::Provisioned).await;
        store.close().await;
    }

    {
        let executor = executor_at(&db).await;
        let outcome = executor
            .execute(&ExecutionContext::new(), &full_configure("N1"))
            .await
            .unwrap();
        assert!(outcome.changed());
    }

    let executor = executor_at(&db).await;
    assert_eq!(
        executor
            .lifecycle()
            .current_state(&NodeId::new("N1"))
            .await
            .unwrap(),
        NodeState::SoftwareInstalled
    );

    let outcome = executor
        .execute(&ExecutionContext::new(), &full_configure("N1"))
        .await
        .unwrap();
    assert_eq!(outcome.transition, Transition::Unchanged(NodeState::SoftwareInstalled));
}

#[tokio::test]
async fn test_register_and_remove_persist() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nodes.db");

    {
        let executor = executor_at(&db).await;
        executor.register_node("N1", "u1").await.unwrap();
        executor.register_node("N2", "u1").await.unwrap();
        executor.remove_node(&NodeId::new("N1")).await.unwrap();
    }

    let executor = executor_at(&db).await;
    let nodes = executor
        .lifecycle()
        .universe_nodes(&UniverseId::new("u1"))
        .await
        .unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].node_id.as_str(), "N2");
    assert_eq!(nodes[0].state, NodeState::Uncreated);
}
