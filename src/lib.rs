//! nodeconf - idempotent node-configuration subtasks.
//!
//! A [`SubTaskExecutor`] runs one configure request against one node of a
//! universe through a [`CommandAdapter`], and on success advances the node's
//! lifecycle state as far as the request implies. Lifecycle state is kept in
//! a [`NodeStateStore`] and only moves forward, except for the operational
//! `Running`/`Stopped` toggle and explicit escalation to `Failed`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use nodeconf::{ExecutionContext, InMemoryNodeStore, ProcessAdapter, SubTaskExecutor, TaskParameters};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = ProcessAdapter::builder("./bin/provision.sh").build();
//! let executor = SubTaskExecutor::new(Arc::new(adapter), Arc::new(InMemoryNodeStore::new()));
//! executor.register_node("yb-n1", "u1").await?;
//!
//! let ctx = ExecutionContext::new();
//! let params = TaskParameters::software("yb-n1", "u1", "yugabyte-2.0.0.0-b1.tar.gz");
//! let outcome = executor.execute(&ctx, &params).await?;
//! println!("{} is now {}", outcome.node_id, outcome.state());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod lifecycle;
pub mod storage;
pub mod testing;

pub use config::{
    AdapterConfig, ConfigError, NodeConfig, NodeConfigBuilder, StorageConfig, YamlLoader,
    load_runtime,
};
pub use core::context::ExecutionContext;
pub use core::environment::Environment;
pub use core::params::{ConfigureKind, ExecutionMode, FlagMap, PackageRef, TaskParameters};
pub use core::state::{NodeState, ParseNodeStateError, Transition};
pub use core::types::{InvocationId, NodeId, UniverseId};
pub use events::{Event, EventBus, EventHandler, LoggingHandler};
pub use execution::{
    AdapterError, CommandAdapter, CommandOutput, ExecutionError, Invocation, ProcessAdapter,
    ProcessAdapterBuilder, SubTaskError, SubTaskExecutor, SubTaskOutcome, ValidationError,
};
pub use lifecycle::{NodeStateMachine, StateTransitionError};
#[cfg(feature = "sqlite")]
pub use storage::SqliteNodeStore;
pub use storage::{InMemoryNodeStore, NodeRecord, NodeStateStore, StorageError};
