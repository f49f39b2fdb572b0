//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for the provisioning adapter,
//! the node state store, and default server flags.

mod builder;
mod error;
mod yaml;

pub use builder::{NodeConfigBuilder, load_runtime};
pub use error::ConfigError;
pub use yaml::{AdapterConfig, NodeConfig, StorageConfig, YamlLoader};
