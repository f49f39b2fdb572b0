//! SQLite storage implementation.
//!
//! Provides persistent storage using SQLite database.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{NodeRecord, NodeStateStore, StorageError};
use crate::core::state::NodeState;
use crate::core::types::{NodeId, UniverseId};

type NodeRow = (String, String, String, String, String);

/// SQLite storage backend.
///
/// Provides persistent storage with automatic schema migration.
/// Compare-and-swap is a single conditional `UPDATE`.
pub struct SqliteNodeStore {
    pool: SqlitePool,
}

impl SqliteNodeStore {
    /// Create a new SQLite store with the given database path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path_str = path.as_ref().to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| StorageError::Other(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (useful for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        let schema = include_str!("../../migrations/001_node_states.sql");
        sqlx::raw_sql(schema)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Other(format!("migration failed: {}", e)))?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// Helper functions for time conversion
fn system_time_to_string(time: SystemTime) -> String {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

fn string_to_system_time(s: &str) -> SystemTime {
    s.parse::<u128>()
        .ok()
        .map(|millis| UNIX_EPOCH + Duration::from_millis(millis as u64))
        .unwrap_or(UNIX_EPOCH)
}

fn row_to_record(row: NodeRow) -> Result<NodeRecord, StorageError> {
    let state = NodeState::from_str(&row.2)
        .map_err(|e| StorageError::SerializationError(format!("node {}: {}", row.0, e)))?;
    Ok(NodeRecord {
        node_id: NodeId::new(row.0),
        universe_id: UniverseId::new(row.1),
        state,
        created_at: string_to_system_time(&row.3),
        updated_at: string_to_system_time(&row.4),
    })
}

#[async_trait]
impl NodeStateStore for SqliteNodeStore {
    async fn insert(&self, record: NodeRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO nodes (node_id, universe_id, state, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.node_id.as_str())
        .bind(record.universe_id.as_str())
        .bind(record.state.as_str())
        .bind(system_time_to_string(record.created_at))
        .bind(system_time_to_string(record.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                StorageError::DuplicateKey(format!("node: {}", record.node_id)),
            ),
            Err(e) => Err(StorageError::Other(e.to_string())),
        }
    }

    async fn read(&self, node_id: &NodeId) -> Result<NodeRecord, StorageError> {
        let row: NodeRow = sqlx::query_as(
            "SELECT node_id, universe_id, state, created_at, updated_at FROM nodes WHERE node_id = ?",
        )
        .bind(node_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?
        .ok_or_else(|| StorageError::NotFound(format!("node: {}", node_id)))?;

        row_to_record(row)
    }

    async fn compare_and_swap(
        &self,
        node_id: &NodeId,
        expected: NodeState,
        new: NodeState,
    ) -> Result<NodeRecord, StorageError> {
        let result = sqlx::query(
            "UPDATE nodes SET state = ?, updated_at = ? WHERE node_id = ? AND state = ?",
        )
        .bind(new.as_str())
        .bind(system_time_to_string(SystemTime::now()))
        .bind(node_id.as_str())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        let current = self.read(node_id).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict {
                node_id: node_id.clone(),
                expected,
                actual: current.state,
            });
        }
        Ok(current)
    }

    async fn remove(&self, node_id: &NodeId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM nodes WHERE node_id = ?")
            .bind(node_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("node: {}", node_id)));
        }
        Ok(())
    }

    async fn list_universe(
        &self,
        universe_id: &UniverseId,
    ) -> Result<Vec<NodeRecord>, StorageError> {
        let rows: Vec<NodeRow> = sqlx::query_as(
            "SELECT node_id, universe_id, state, created_at, updated_at FROM nodes WHERE universe_id = ? ORDER BY node_id",
        )
        .bind(universe_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        rows.into_iter().map(row_to_record).collect()
    }
}
