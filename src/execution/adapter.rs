//! The boundary to the external provisioning tool.
//!
//! A [`CommandAdapter`] receives an [`Invocation`] derived from the task
//! parameters, runs it exactly once and reports the exit status together with
//! the captured output. Timeouts and cancellation belong to the adapter; the
//! executor only sees the final result.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::core::params::{ExecutionMode, FlagMap, PackageRef, TaskParameters};
use crate::core::types::{NodeId, UniverseId};

/// Failures of the adapter itself, as opposed to a command that ran and
/// exited non-zero.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The provisioning process could not be started.
    #[error("failed to start provisioning command: {0}")]
    Spawn(String),

    /// The provisioning process did not finish in time and was killed.
    #[error("provisioning command timed out after {0:?}")]
    Timeout(Duration),

    /// The process ended without an exit code (killed by a signal).
    #[error("provisioning command terminated without exit code")]
    Terminated { stdout: String, stderr: String },

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Exit status and captured streams of one provisioning command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Exit code 0 is success; anything else is failure whatever stderr says.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A concrete configure request for the provisioning tool.
///
/// Built deterministically from [`TaskParameters`] plus the configured
/// default flags, so the same inputs always yield the same argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub node_id: NodeId,
    pub universe_id: UniverseId,
    pub kind: &'static str,
    pub package: Option<PackageRef>,
    pub gflags: FlagMap,
    pub mode: ExecutionMode,
}

impl Invocation {
    /// Derive the invocation for `params`.
    ///
    /// `default_gflags` sit under the task's own flags and only apply to
    /// kinds that carry flags.
    pub fn from_params(params: &TaskParameters, default_gflags: &FlagMap) -> Self {
        let kind = params.kind();
        let gflags = kind
            .gflags()
            .map(|flags| flags.layered_over(default_gflags))
            .unwrap_or_default();
        Self {
            node_id: params.node_id().clone(),
            universe_id: params.universe_id().clone(),
            kind: kind.name(),
            package: kind.package().cloned(),
            gflags,
            mode: params.execution_mode(),
        }
    }

    /// Flags rendered as a JSON object with keys in sorted order.
    pub fn gflags_json(&self) -> String {
        let map: Map<String, Value> = self
            .gflags
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        Value::Object(map).to_string()
    }

    /// Command-line form passed to the provisioning tool.
    ///
    /// ```text
    /// instance configure --universe U --type KIND [--package P]
    ///     [--gflags JSON] [--master_shell_mode] NODE
    /// ```
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "instance".to_string(),
            "configure".to_string(),
            "--universe".to_string(),
            self.universe_id.to_string(),
            "--type".to_string(),
            self.kind.to_string(),
        ];
        if let Some(package) = &self.package {
            args.push("--package".to_string());
            args.push(package.to_string());
        }
        if !self.gflags.is_empty() {
            args.push("--gflags".to_string());
            args.push(self.gflags_json());
        }
        if self.mode == ExecutionMode::Bootstrap {
            args.push("--master_shell_mode".to_string());
        }
        args.push(self.node_id.to_string());
        args
    }
}

/// Runs invocations against the provisioning tool.
///
/// Implementations run each call at most once and perform no retries.
#[async_trait]
pub trait CommandAdapter: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        "adapter"
    }

    /// Run the invocation to completion.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, AdapterError>;
}
