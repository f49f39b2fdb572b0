//! Subtask executor.
//!
//! The `SubTaskExecutor` runs one node-configuration subtask:
//! - Validates the parameters against the node's stored record
//! - Runs the derived invocation through the command adapter, once
//! - On success, applies the lifecycle effect declared by the task kind
//!
//! It never retries and never marks a node failed on its own. Both decisions
//! belong to the orchestrator, which can call
//! [`escalate_failure`](SubTaskExecutor::escalate_failure) explicitly.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span, warn};

use super::adapter::{CommandAdapter, CommandOutput, Invocation};
use super::error::{ExecutionError, SubTaskError, ValidationError};
use crate::core::context::ExecutionContext;
use crate::core::params::{ConfigureKind, TaskParameters};
use crate::core::state::{NodeState, Transition};
use crate::core::types::{InvocationId, NodeId, UniverseId};
use crate::events::Event;
use crate::lifecycle::NodeStateMachine;
use crate::storage::{NodeRecord, NodeStateStore, StorageError};

/// Result of a successful subtask.
#[derive(Debug, Clone)]
pub struct SubTaskOutcome {
    /// Correlation id of this invocation.
    pub invocation_id: InvocationId,
    /// The configured node.
    pub node_id: NodeId,
    /// Task kind tag.
    pub kind: &'static str,
    /// What happened to the node's lifecycle state.
    pub transition: Transition,
    /// Output of the provisioning command.
    pub output: CommandOutput,
    /// Wall-clock duration of the whole subtask.
    pub duration: Duration,
}

impl SubTaskOutcome {
    /// The node's state after the subtask.
    pub fn state(&self) -> NodeState {
        self.transition.resulting_state()
    }

    /// Whether the subtask changed the node's state.
    pub fn changed(&self) -> bool {
        self.transition.is_changed()
    }
}

/// Runs node-configuration subtasks through a [`CommandAdapter`] and records
/// their lifecycle effect.
///
/// The executor is `Send + Sync` and holds no per-node state; subtasks for
/// different nodes may run concurrently on one instance. Subtasks for the
/// same node must be serialised by the caller.
#[derive(Clone)]
pub struct SubTaskExecutor {
    adapter: Arc<dyn CommandAdapter>,
    lifecycle: NodeStateMachine,
}

impl SubTaskExecutor {
    /// Create a new executor.
    pub fn new(adapter: Arc<dyn CommandAdapter>, store: Arc<dyn NodeStateStore>) -> Self {
        Self {
            adapter,
            lifecycle: NodeStateMachine::new(store),
        }
    }

    /// Read access to the lifecycle state machine.
    pub fn lifecycle(&self) -> &NodeStateMachine {
        &self.lifecycle
    }

    /// Register a new node in [`NodeState::Uncreated`].
    pub async fn register_node(
        &self,
        node_id: impl Into<NodeId>,
        universe_id: impl Into<UniverseId>,
    ) -> Result<NodeRecord, SubTaskError> {
        let node_id = node_id.into();
        let universe_id = universe_id.into();
        if node_id.as_str().is_empty() {
            return Err(ValidationError::MissingField("node_id").into());
        }
        if universe_id.as_str().is_empty() {
            return Err(ValidationError::MissingField("universe_id").into());
        }
        let record = self.lifecycle.register(node_id, universe_id).await?;
        info!(node_id = %record.node_id, universe_id = %record.universe_id, "node registered");
        Ok(record)
    }

    /// Remove a node's lifecycle record from its universe.
    pub async fn remove_node(&self, node_id: &NodeId) -> Result<(), SubTaskError> {
        self.lifecycle.remove(node_id).await.map_err(|e| match e {
            StorageError::NotFound(_) => {
                SubTaskError::from(ValidationError::UnknownNode(node_id.clone()))
            }
            other => SubTaskError::Storage(other),
        })?;
        info!(%node_id, "node removed");
        Ok(())
    }

    /// Run one configure subtask.
    ///
    /// # Returns
    /// * `Ok(SubTaskOutcome)` - the command succeeded; the outcome reports
    ///   whether the lifecycle state changed
    /// * `Err(SubTaskError::Validation)` - the adapter was not called
    /// * `Err(SubTaskError::Execution)` - the command failed; the node state
    ///   is exactly what it was before the call
    /// * `Err(SubTaskError::StateTransition)` - the lifecycle write was
    ///   refused, which indicates a logic or data-corruption bug
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        params: &TaskParameters,
    ) -> Result<SubTaskOutcome, SubTaskError> {
        let span = info_span!(
            "configure",
            invocation_id = %ctx.invocation_id(),
            node_id = %params.node_id(),
            universe_id = %params.universe_id(),
            kind = params.kind().name(),
        );
        self.execute_inner(ctx, params).instrument(span).await
    }

    async fn execute_inner(
        &self,
        ctx: &ExecutionContext,
        params: &TaskParameters,
    ) -> Result<SubTaskOutcome, SubTaskError> {
        let start = Instant::now();
        let invocation_id = ctx.invocation_id();
        let node_id = params.node_id();

        if let Err(err) = self.validate(params).await {
            if let SubTaskError::Validation(reason) = &err {
                warn!("rejected: {}", reason);
                ctx.emit(Event::subtask_rejected(
                    invocation_id,
                    node_id.clone(),
                    reason.to_string(),
                ))
                .await;
            }
            return Err(err);
        }

        ctx.emit(Event::subtask_started(
            invocation_id,
            node_id.clone(),
            params.universe_id().clone(),
            params.kind().name(),
        ))
        .await;

        let invocation = Invocation::from_params(params, ctx.default_gflags());
        debug!(adapter = self.adapter.name(), args = ?invocation.to_args(), "running provisioning command");

        let output = self.run_command(ctx, &invocation, start).await?;

        let transition = match params.kind().lifecycle_target() {
            Some(target) => self.lifecycle.advance_to(node_id, target).await?,
            None => Transition::Unchanged(self.lifecycle.current_state(node_id).await?),
        };

        if let Transition::Changed { from, to } = transition {
            info!(%from, %to, "node state advanced");
            ctx.emit(Event::state_changed(invocation_id, node_id.clone(), from, to))
                .await;
        }

        let duration = start.elapsed();
        info!(?duration, state = %transition.resulting_state(), "configure subtask completed");

        Ok(SubTaskOutcome {
            invocation_id,
            node_id: node_id.clone(),
            kind: params.kind().name(),
            transition,
            output,
            duration,
        })
    }

    /// Move a node to [`NodeState::Failed`] on the orchestrator's request.
    pub async fn escalate_failure(
        &self,
        ctx: &ExecutionContext,
        node_id: &NodeId,
        reason: &str,
    ) -> Result<Transition, SubTaskError> {
        let transition = self
            .lifecycle
            .transition(node_id, NodeState::Failed)
            .await?;
        if let Transition::Changed { from, to } = transition {
            warn!(invocation_id = %ctx.invocation_id(), %node_id, %from, "node marked failed: {}", reason);
            ctx.emit(Event::state_changed(ctx.invocation_id(), node_id.clone(), from, to))
                .await;
        }
        Ok(transition)
    }

    /// Check the parameters' shape, then their references against the store.
    async fn validate(&self, params: &TaskParameters) -> Result<(), SubTaskError> {
        validate_shape(params)?;

        let record = self
            .lifecycle
            .record(params.node_id())
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => {
                    SubTaskError::from(ValidationError::UnknownNode(params.node_id().clone()))
                }
                other => SubTaskError::Storage(other),
            })?;

        if &record.universe_id != params.universe_id() {
            return Err(ValidationError::UniverseMismatch {
                node_id: record.node_id,
                requested: params.universe_id().clone(),
                actual: record.universe_id,
            }
            .into());
        }
        if !record.state.is_active() {
            return Err(ValidationError::InactiveNode {
                node_id: record.node_id,
                state: record.state,
            }
            .into());
        }
        Ok(())
    }

    async fn run_command(
        &self,
        ctx: &ExecutionContext,
        invocation: &Invocation,
        start: Instant,
    ) -> Result<CommandOutput, ExecutionError> {
        let invocation_id = ctx.invocation_id();
        let node_id = invocation.node_id.clone();

        let output = match self.adapter.run(invocation).await {
            Ok(output) => output,
            Err(err) => {
                warn!("adapter failed: {}", err);
                ctx.emit(Event::command_failed(
                    invocation_id,
                    node_id,
                    err.to_string(),
                    None,
                    None,
                    None,
                    start.elapsed(),
                ))
                .await;
                return Err(err.into());
            }
        };

        if !output.success() {
            let CommandOutput {
                exit_code,
                stdout,
                stderr,
            } = output;
            let err = ExecutionError::NonZeroExit {
                code: exit_code,
                stdout: stdout.clone(),
                stderr: stderr.clone(),
            };
            warn!(exit_code, "{}", err);
            ctx.emit(Event::command_failed(
                invocation_id,
                node_id,
                err.to_string(),
                Some(exit_code),
                Some(stdout),
                Some(stderr),
                start.elapsed(),
            ))
            .await;
            return Err(err);
        }

        ctx.emit(Event::command_succeeded(
            invocation_id,
            node_id,
            start.elapsed(),
            output.stdout.clone(),
            output.stderr.clone(),
        ))
        .await;
        Ok(output)
    }
}

fn validate_shape(params: &TaskParameters) -> Result<(), ValidationError> {
    if params.node_id().as_str().is_empty() {
        return Err(ValidationError::MissingField("node_id"));
    }
    if params.universe_id().as_str().is_empty() {
        return Err(ValidationError::MissingField("universe_id"));
    }
    let kind = params.kind();
    if kind
        .package()
        .is_some_and(|package| package.as_str().trim().is_empty())
    {
        return Err(ValidationError::EmptyPackage);
    }
    if let Some(flags) = kind.gflags() {
        if flags.iter().any(|(name, _)| name.trim().is_empty()) {
            return Err(ValidationError::EmptyFlagName);
        }
        if matches!(kind, ConfigureKind::Gflags { .. }) && flags.is_empty() {
            return Err(ValidationError::NoFlags);
        }
    }
    Ok(())
}
