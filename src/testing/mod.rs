//! Testing utilities for users of the nodeconf library.
//!
//! This module provides helpers for testing orchestration code that drives
//! [`SubTaskExecutor`]:
//!
//! - [`ScriptedAdapter`]: A command adapter that replays queued results and
//!   records every invocation
//! - [`RecordingHandler`]: An event handler that keeps every event
//! - [`TestHarness`]: An executor wired to in-memory storage and a scripted
//!   adapter, with helpers to seed nodes

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::core::context::ExecutionContext;
use crate::core::state::NodeState;
use crate::core::types::{NodeId, UniverseId};
use crate::events::{Event, EventHandler};
use crate::execution::{AdapterError, CommandAdapter, CommandOutput, Invocation, SubTaskExecutor};
use crate::storage::{InMemoryNodeStore, NodeRecord, NodeStateStore};

/// A command adapter that returns scripted results.
///
/// Results are consumed in the order they were pushed. Once the script is
/// exhausted every call returns the fallback result (exit code 0 unless
/// built with [`ScriptedAdapter::failing`]).
///
/// # Example
///
/// ```
/// use nodeconf::testing::ScriptedAdapter;
///
/// # #[tokio::main]
/// # async fn main() {
/// let adapter = ScriptedAdapter::new();
/// adapter.push_exit(2, "", "host unreachable").await;
/// assert_eq!(adapter.remaining().await, 1);
/// # }
/// ```
pub struct ScriptedAdapter {
    script: Mutex<VecDeque<Result<CommandOutput, AdapterError>>>,
    fallback: CommandOutput,
    delay: Option<Duration>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedAdapter {
    /// Create an adapter whose fallback is a successful exit.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: CommandOutput::default(),
            delay: None,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Create an adapter whose fallback is a non-zero exit.
    pub fn failing(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            fallback: CommandOutput::new(exit_code, "", stderr),
            ..Self::new()
        }
    }

    /// Builder: sleep for `delay` inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful exit with the given stdout.
    pub async fn push_success(&self, stdout: impl Into<String>) {
        self.push_exit(0, stdout, "").await;
    }

    /// Queue an exit with the given code and output.
    pub async fn push_exit(
        &self,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.script
            .lock()
            .await
            .push_back(Ok(CommandOutput::new(exit_code, stdout, stderr)));
    }

    /// Queue an adapter-level failure.
    pub async fn push_error(&self, error: AdapterError) {
        self.script.lock().await.push_back(Err(error));
    }

    /// Number of scripted results not yet consumed.
    pub async fn remaining(&self) -> usize {
        self.script.lock().await.len()
    }

    /// Number of times `run` was called.
    pub async fn call_count(&self) -> usize {
        self.invocations.lock().await.len()
    }

    /// Every invocation received, in call order.
    pub async fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().await.clone()
    }
}

impl Default for ScriptedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, AdapterError> {
        self.invocations.lock().await.push(invocation.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().await.pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Event handler that keeps every event it receives.
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// All events received so far.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    /// Events concerning one node.
    pub async fn events_for(&self, node_id: &NodeId) -> Vec<Event> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| event.node_id() == node_id)
            .cloned()
            .collect()
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}

/// Insert a node record directly into a store in the given state.
///
/// Bypasses the state machine; meant for putting fixtures in place.
pub async fn seed_node(
    store: &dyn NodeStateStore,
    node_id: impl Into<NodeId>,
    universe_id: impl Into<UniverseId>,
    state: NodeState,
) {
    store
        .insert(NodeRecord::new(node_id.into(), universe_id.into()).with_state(state))
        .await
        .expect("failed to seed node");
}

/// An executor wired to an in-memory store and a scripted adapter.
pub struct TestHarness {
    pub store: Arc<InMemoryNodeStore>,
    pub adapter: Arc<ScriptedAdapter>,
    pub executor: SubTaskExecutor,
    pub recorder: Arc<RecordingHandler>,
    ctx: ExecutionContext,
}

impl TestHarness {
    /// Create a harness with a default (always succeeding) adapter.
    pub async fn new() -> Self {
        Self::with_adapter(ScriptedAdapter::new()).await
    }

    /// Create a harness around a specific scripted adapter.
    pub async fn with_adapter(adapter: ScriptedAdapter) -> Self {
        let store = Arc::new(InMemoryNodeStore::new());
        let adapter = Arc::new(adapter);
        let executor = SubTaskExecutor::new(adapter.clone(), store.clone());
        let recorder = Arc::new(RecordingHandler::new());
        let ctx = ExecutionContext::new();
        ctx.events().register(recorder.clone()).await;
        Self {
            store,
            adapter,
            executor,
            recorder,
            ctx,
        }
    }

    /// Seed a node in the given state.
    pub async fn seed(&self, node_id: &str, universe_id: &str, state: NodeState) {
        seed_node(self.store.as_ref(), node_id, universe_id, state).await;
    }

    /// A context for a new invocation, sharing the harness's event recorder.
    pub fn context(&self) -> ExecutionContext {
        self.ctx.next_invocation()
    }

    /// Current state of a node. Panics if the node is missing.
    pub async fn state(&self, node_id: &str) -> NodeState {
        self.executor
            .lifecycle()
            .current_state(&NodeId::new(node_id))
            .await
            .expect("node not found")
    }
}
