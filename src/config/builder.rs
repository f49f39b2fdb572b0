//! Runtime assembly from YAML configuration.
//!
//! This module turns a [`NodeConfig`] into the pieces an orchestrator needs:
//! a [`ProcessAdapter`], a node state store, and an [`ExecutionContext`].

use std::path::Path;
use std::sync::Arc;

use crate::core::context::ExecutionContext;
use crate::core::environment::Environment;
use crate::events::EventBus;
use crate::execution::{ProcessAdapter, SubTaskExecutor};
use crate::storage::{InMemoryNodeStore, NodeStateStore};

use super::error::ConfigError;
use super::yaml::{AdapterConfig, NodeConfig, StorageConfig, YamlLoader};

/// Builder for runtime components from configuration.
pub struct NodeConfigBuilder;

impl NodeConfigBuilder {
    /// Build the subprocess adapter.
    pub fn build_adapter(config: &AdapterConfig) -> ProcessAdapter {
        let env = Environment::from_map(config.environment.clone());
        let mut builder = ProcessAdapter::builder(&config.program)
            .args(config.args.iter().cloned())
            .environment(env);

        if let Some(dir) = &config.working_dir {
            builder = builder.working_dir(dir);
        }
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        builder.build()
    }

    /// Open the configured storage backend.
    pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn NodeStateStore>, ConfigError> {
        match config {
            StorageConfig::Memory => Ok(Arc::new(InMemoryNodeStore::new())),
            #[cfg(feature = "sqlite")]
            StorageConfig::Sqlite { path } => {
                let store = crate::storage::SqliteNodeStore::new(path).await?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "sqlite"))]
            StorageConfig::Sqlite { .. } => Err(ConfigError::InvalidConfig(
                "sqlite storage requires the `sqlite` feature".into(),
            )),
        }
    }

    /// Build a root execution context carrying the default flags.
    pub fn build_context(config: &NodeConfig, events: Arc<EventBus>) -> ExecutionContext {
        ExecutionContext::new()
            .with_events(events)
            .with_default_gflags(config.default_gflags.clone())
    }

    /// Build an executor backed by the configured adapter and store.
    pub async fn build_executor(config: &NodeConfig) -> Result<SubTaskExecutor, ConfigError> {
        let adapter = Arc::new(Self::build_adapter(&config.adapter));
        let store = Self::open_store(&config.storage).await?;
        Ok(SubTaskExecutor::new(adapter, store))
    }
}

/// Load a configuration file and build an executor and a root context from it.
pub async fn load_runtime(
    path: impl AsRef<Path>,
    events: Arc<EventBus>,
) -> Result<(SubTaskExecutor, ExecutionContext), ConfigError> {
    let config = YamlLoader::load(path)?;
    let executor = NodeConfigBuilder::build_executor(&config).await?;
    let ctx = NodeConfigBuilder::build_context(&config, events);
    Ok((executor, ctx))
}
