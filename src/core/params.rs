//! Parameters of a single node-configuration subtask.
//!
//! A [`TaskParameters`] value is immutable once built. The kind of work is a
//! closed [`ConfigureKind`] enum whose variants carry exactly the payload that
//! kind needs, and each variant declares the lifecycle effect a successful run
//! has on the node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::state::NodeState;
use super::types::{NodeId, UniverseId};

/// Reference to the software artefact to install (a package name or URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRef(String);

impl PackageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server flags passed verbatim to the configured process.
///
/// Keys are unique. Iteration is sorted by key so that anything derived from
/// a `FlagMap` is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagMap(BTreeMap<String, String>);

impl FlagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a flag, replacing any previous value.
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Create a new map from `base` overlaid with `self`; entries in `self` win.
    pub fn layered_over(&self, base: &FlagMap) -> FlagMap {
        let mut merged = base.0.clone();
        for (k, v) in &self.0 {
            merged.insert(k.clone(), v.clone());
        }
        FlagMap(merged)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlagMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Whether the node is being bootstrapped or reconfigured in steady state.
///
/// The mode only changes which commands the adapter issues; it has no effect
/// on the lifecycle state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// First-time setup; masters come up in shell mode awaiting cluster formation.
    Bootstrap,
    /// Reconfiguration of an already-formed node.
    #[default]
    Reconfigure,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Bootstrap => "bootstrap",
            ExecutionMode::Reconfigure => "reconfigure",
        }
    }
}

/// The kind of configuration work requested, with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigureKind {
    /// Install software and write the full configuration.
    Everything { package: PackageRef, gflags: FlagMap },
    /// Replace the installed software only.
    Software { package: PackageRef },
    /// Rewrite the server flags only.
    Gflags { gflags: FlagMap },
}

impl ConfigureKind {
    /// Tag used in logs and on the adapter command line.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigureKind::Everything { .. } => "everything",
            ConfigureKind::Software { .. } => "software",
            ConfigureKind::Gflags { .. } => "gflags",
        }
    }

    /// The state a successful run moves the node to, if any.
    pub fn lifecycle_target(&self) -> Option<NodeState> {
        match self {
            ConfigureKind::Everything { .. } => Some(NodeState::SoftwareInstalled),
            ConfigureKind::Software { .. } | ConfigureKind::Gflags { .. } => None,
        }
    }

    /// Whether a successful run of this kind advances the node lifecycle.
    pub fn advances_lifecycle(&self) -> bool {
        self.lifecycle_target().is_some()
    }

    pub fn package(&self) -> Option<&PackageRef> {
        match self {
            ConfigureKind::Everything { package, .. } | ConfigureKind::Software { package } => {
                Some(package)
            }
            ConfigureKind::Gflags { .. } => None,
        }
    }

    pub fn gflags(&self) -> Option<&FlagMap> {
        match self {
            ConfigureKind::Everything { gflags, .. } | ConfigureKind::Gflags { gflags } => {
                Some(gflags)
            }
            ConfigureKind::Software { .. } => None,
        }
    }
}

/// Immutable description of one subtask invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParameters {
    node_id: NodeId,
    universe_id: UniverseId,
    kind: ConfigureKind,
    #[serde(default)]
    execution_mode: ExecutionMode,
}

impl TaskParameters {
    /// Create parameters in steady-state [`ExecutionMode::Reconfigure`] mode.
    pub fn new(
        node_id: impl Into<NodeId>,
        universe_id: impl Into<UniverseId>,
        kind: ConfigureKind,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            universe_id: universe_id.into(),
            kind,
            execution_mode: ExecutionMode::default(),
        }
    }

    /// Full configure: install `package` and apply `gflags`.
    pub fn everything(
        node_id: impl Into<NodeId>,
        universe_id: impl Into<UniverseId>,
        package: impl Into<String>,
        gflags: FlagMap,
    ) -> Self {
        Self::new(
            node_id,
            universe_id,
            ConfigureKind::Everything {
                package: PackageRef::new(package),
                gflags,
            },
        )
    }

    /// Software-only upgrade.
    pub fn software(
        node_id: impl Into<NodeId>,
        universe_id: impl Into<UniverseId>,
        package: impl Into<String>,
    ) -> Self {
        Self::new(
            node_id,
            universe_id,
            ConfigureKind::Software {
                package: PackageRef::new(package),
            },
        )
    }

    /// Flags-only reconfiguration.
    pub fn gflags(
        node_id: impl Into<NodeId>,
        universe_id: impl Into<UniverseId>,
        gflags: FlagMap,
    ) -> Self {
        Self::new(node_id, universe_id, ConfigureKind::Gflags { gflags })
    }

    /// Builder: set the execution mode.
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn universe_id(&self) -> &UniverseId {
        &self.universe_id
    }

    pub fn kind(&self) -> &ConfigureKind {
        &self.kind
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }
}
