//! YAML configuration parsing.
//!
//! A single file describes how to reach the provisioning tool, where node
//! state is kept, and the flags applied under every task's own flags:
//!
//! ```yaml
//! adapter:
//!   program: ./bin/provision.sh
//!   args: [--cloud, onprem]
//!   timeout_secs: 1800
//! storage:
//!   type: sqlite
//!   path: /var/lib/nodeconf/state.db
//! default_gflags:
//!   log_dir: /mnt/logs
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use super::error::ConfigError;
use crate::core::params::FlagMap;

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// How to run the provisioning tool.
    pub adapter: AdapterConfig,
    /// Where node lifecycle state is kept.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Flags merged under every flag-carrying task's own flags.
    #[serde(default)]
    pub default_gflags: FlagMap,
}

/// Provisioning tool invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Program to execute.
    pub program: String,
    /// Arguments placed before each invocation's own arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-command timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Environment variables for the child process.
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

impl AdapterConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// In-memory storage (default, non-persistent).
    #[serde(rename = "memory")]
    #[default]
    Memory,
    /// SQLite storage.
    #[serde(rename = "sqlite")]
    Sqlite {
        /// Path to the database file.
        path: String,
    },
}

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<NodeConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: NodeConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<NodeConfig, ConfigError> {
        let config: NodeConfig = serde_yaml::from_str(yaml)?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &NodeConfig) -> Result<(), ConfigError> {
        if config.adapter.program.trim().is_empty() {
            return Err(ConfigError::MissingField("adapter.program".into()));
        }

        if config.adapter.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "adapter.timeout_secs cannot be zero".into(),
            ));
        }

        if let StorageConfig::Sqlite { path } = &config.storage {
            if path.trim().is_empty() {
                return Err(ConfigError::MissingField("storage.path".into()));
            }
        }

        if config.default_gflags.iter().any(|(name, _)| name.is_empty()) {
            return Err(ConfigError::InvalidConfig(
                "default_gflags contains an empty flag name".into(),
            ));
        }

        Ok(())
    }
}
