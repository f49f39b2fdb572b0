//! Subtask progress events and event handling.
//!
//! Events are informational. They never decide whether a subtask succeeded;
//! that is carried by the executor's return value alone.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::core::state::NodeState;
use crate::core::types::{InvocationId, NodeId, UniverseId};

/// Progress records emitted while a subtask runs.
#[derive(Debug, Clone)]
pub enum Event {
    /// Parameters were accepted and the command is about to run.
    SubTaskStarted {
        invocation_id: InvocationId,
        node_id: NodeId,
        universe_id: UniverseId,
        kind: &'static str,
        timestamp: Instant,
    },

    /// Parameters were rejected before any command ran.
    SubTaskRejected {
        invocation_id: InvocationId,
        node_id: NodeId,
        reason: String,
        timestamp: Instant,
    },

    /// The provisioning command exited with code 0.
    CommandSucceeded {
        invocation_id: InvocationId,
        node_id: NodeId,
        duration: Duration,
        stdout: String,
        stderr: String,
        timestamp: Instant,
    },

    /// The provisioning command exited non-zero or could not be run.
    CommandFailed {
        invocation_id: InvocationId,
        node_id: NodeId,
        error: String,
        exit_code: Option<i32>,
        stdout: Option<String>,
        stderr: Option<String>,
        duration: Duration,
        timestamp: Instant,
    },

    /// The node's lifecycle state was written.
    StateChanged {
        invocation_id: InvocationId,
        node_id: NodeId,
        from: NodeState,
        to: NodeState,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::SubTaskStarted { timestamp, .. } => *timestamp,
            Event::SubTaskRejected { timestamp, .. } => *timestamp,
            Event::CommandSucceeded { timestamp, .. } => *timestamp,
            Event::CommandFailed { timestamp, .. } => *timestamp,
            Event::StateChanged { timestamp, .. } => *timestamp,
        }
    }

    /// The node the event concerns.
    pub fn node_id(&self) -> &NodeId {
        match self {
            Event::SubTaskStarted { node_id, .. }
            | Event::SubTaskRejected { node_id, .. }
            | Event::CommandSucceeded { node_id, .. }
            | Event::CommandFailed { node_id, .. }
            | Event::StateChanged { node_id, .. } => node_id,
        }
    }

    /// Create a SubTaskStarted event.
    pub fn subtask_started(
        invocation_id: InvocationId,
        node_id: NodeId,
        universe_id: UniverseId,
        kind: &'static str,
    ) -> Self {
        Event::SubTaskStarted {
            invocation_id,
            node_id,
            universe_id,
            kind,
            timestamp: Instant::now(),
        }
    }

    /// Create a SubTaskRejected event.
    pub fn subtask_rejected(invocation_id: InvocationId, node_id: NodeId, reason: String) -> Self {
        Event::SubTaskRejected {
            invocation_id,
            node_id,
            reason,
            timestamp: Instant::now(),
        }
    }

    /// Create a CommandSucceeded event.
    pub fn command_succeeded(
        invocation_id: InvocationId,
        node_id: NodeId,
        duration: Duration,
        stdout: String,
        stderr: String,
    ) -> Self {
        Event::CommandSucceeded {
            invocation_id,
            node_id,
            duration,
            stdout,
            stderr,
            timestamp: Instant::now(),
        }
    }

    /// Create a CommandFailed event.
    #[allow(clippy::too_many_arguments)]
    pub fn command_failed(
        invocation_id: InvocationId,
        node_id: NodeId,
        error: String,
        exit_code: Option<i32>,
        stdout: Option<String>,
        stderr: Option<String>,
        duration: Duration,
    ) -> Self {
        Event::CommandFailed {
            invocation_id,
            node_id,
            error,
            exit_code,
            stdout,
            stderr,
            duration,
            timestamp: Instant::now(),
        }
    }

    /// Create a StateChanged event.
    pub fn state_changed(
        invocation_id: InvocationId,
        node_id: NodeId,
        from: NodeState,
        to: NodeState,
    ) -> Self {
        Event::StateChanged {
            invocation_id,
            node_id,
            from,
            to,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving progress events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes every event to the `tracing` subscriber, with provisioning output
/// split into one record per line.
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::SubTaskStarted {
                invocation_id,
                node_id,
                universe_id,
                kind,
                ..
            } => {
                info!(%invocation_id, %node_id, %universe_id, kind, "configure subtask started");
            }
            Event::SubTaskRejected {
                invocation_id,
                node_id,
                reason,
                ..
            } => {
                warn!(%invocation_id, %node_id, "configure subtask rejected: {}", reason);
            }
            Event::CommandSucceeded {
                invocation_id,
                node_id,
                duration,
                stdout,
                ..
            } => {
                info!(%invocation_id, %node_id, ?duration, "provisioning command succeeded");
                for line in stdout.trim().lines() {
                    info!(%node_id, "    stdout: {}", line);
                }
            }
            Event::CommandFailed {
                invocation_id,
                node_id,
                error,
                exit_code,
                stderr,
                ..
            } => {
                warn!(%invocation_id, %node_id, ?exit_code, "provisioning command failed: {}", error);
                if let Some(err) = stderr {
                    for line in err.trim().lines() {
                        warn!(%node_id, "    stderr: {}", line);
                    }
                }
            }
            Event::StateChanged {
                invocation_id,
                node_id,
                from,
                to,
                ..
            } => {
                info!(%invocation_id, %node_id, %from, %to, "node state changed");
            }
        }
    }
}
