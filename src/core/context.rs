//! Per-invocation execution context.
//!
//! Everything a subtask needs beyond its parameters travels in an
//! [`ExecutionContext`] value passed into the call: the invocation id used to
//! correlate log records, the configured default server flags, and the event
//! bus that receives progress records. The library keeps no global state, so
//! concurrent invocations for different nodes never observe each other.

use std::sync::Arc;

use super::params::FlagMap;
use super::types::InvocationId;
use crate::events::{Event, EventBus};

/// Context threaded into each [`SubTaskExecutor`](crate::SubTaskExecutor) call.
#[derive(Clone)]
pub struct ExecutionContext {
    invocation_id: InvocationId,
    default_gflags: Arc<FlagMap>,
    events: Arc<EventBus>,
}

impl ExecutionContext {
    /// Create a context with no default flags and an empty event bus.
    pub fn new() -> Self {
        Self {
            invocation_id: InvocationId::new(),
            default_gflags: Arc::new(FlagMap::new()),
            events: Arc::new(EventBus::new()),
        }
    }

    /// Builder: share an existing event bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Builder: flags applied under every task's own flags.
    pub fn with_default_gflags(mut self, gflags: FlagMap) -> Self {
        self.default_gflags = Arc::new(gflags);
        self
    }

    /// Derive a context for a new invocation.
    ///
    /// Configuration and the event bus are shared; the invocation id is fresh.
    pub fn next_invocation(&self) -> Self {
        Self {
            invocation_id: InvocationId::new(),
            default_gflags: Arc::clone(&self.default_gflags),
            events: Arc::clone(&self.events),
        }
    }

    pub fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    pub fn default_gflags(&self) -> &FlagMap {
        &self.default_gflags
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Emit a progress record to the event bus.
    pub async fn emit(&self, event: Event) {
        self.events.emit(event).await;
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
