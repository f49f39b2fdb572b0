//! Error taxonomy surfaced by the subtask executor.

use thiserror::Error;

use super::adapter::AdapterError;
use crate::core::state::NodeState;
use crate::core::types::{NodeId, UniverseId};
use crate::lifecycle::StateTransitionError;
use crate::storage::StorageError;

/// Malformed or referentially invalid task parameters.
///
/// Raised before the adapter is called.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required identifier is empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The package reference is empty.
    #[error("package reference must not be empty")]
    EmptyPackage,

    /// A flag has an empty name.
    #[error("gflag names must not be empty")]
    EmptyFlagName,

    /// A flags-only task was given no flags.
    #[error("gflags task requires at least one flag")]
    NoFlags,

    /// The node is not registered.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// The node exists but in another universe.
    #[error("node {node_id} belongs to universe {actual}, not {requested}")]
    UniverseMismatch {
        node_id: NodeId,
        requested: UniverseId,
        actual: UniverseId,
    },

    /// The node is decommissioned or failed.
    #[error("node {node_id} is {state} and cannot be configured")]
    InactiveNode { node_id: NodeId, state: NodeState },
}

/// The provisioning command did not succeed. The node state is untouched.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The command ran and exited non-zero.
    #[error("provisioning command exited with code {code}: {}", last_line(stderr, stdout))]
    NonZeroExit {
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// The adapter could not obtain an exit status.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl ExecutionError {
    /// Exit code if the command ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::NonZeroExit { code, .. } => Some(*code),
            ExecutionError::Adapter(_) => None,
        }
    }

    /// Captured diagnostic output: stderr, falling back to stdout.
    pub fn diagnostic(&self) -> Option<&str> {
        let (stdout, stderr) = match self {
            ExecutionError::NonZeroExit { stdout, stderr, .. }
            | ExecutionError::Adapter(AdapterError::Terminated { stdout, stderr }) => {
                (stdout, stderr)
            }
            ExecutionError::Adapter(_) => return None,
        };
        if !stderr.trim().is_empty() {
            Some(stderr.as_str())
        } else if !stdout.trim().is_empty() {
            Some(stdout.as_str())
        } else {
            None
        }
    }
}

fn last_line<'a>(stderr: &'a str, stdout: &'a str) -> &'a str {
    let source = if stderr.trim().is_empty() { stdout } else { stderr };
    source.trim().lines().last().unwrap_or("no output")
}

/// Any failure of a subtask, as returned to the orchestrator.
#[derive(Debug, Error)]
pub enum SubTaskError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("state transition failed: {0}")]
    StateTransition(#[from] StateTransitionError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SubTaskError {
    /// Whether the node was left in its last known-good state, so the same
    /// parameters may simply be submitted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubTaskError::Execution(_))
    }
}
