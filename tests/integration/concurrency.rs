//! Concurrency integration tests.
//!
//! Tests that verify subtasks for different nodes run in parallel on one
//! executor without interfering.

use crate::common::{full_configure, state_changes};
use nodeconf::testing::{ScriptedAdapter, TestHarness};
use nodeconf::{Event, NodeState, StateTransitionError, SubTaskError};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_nodes_configure_in_parallel() {
    let harness =
        TestHarness::with_adapter(ScriptedAdapter::new().with_delay(Duration::from_millis(200)))
            .await;
    let nodes: Vec<String> = (0..8).map(|i| format!("yb-n{}", i)).collect();
    for node in &nodes {
        harness.seed(node, "u1", NodeState::Provisioned).await;
    }

    let start = Instant::now();
    let mut handles = Vec::new();
    for node in &nodes {
        let executor = harness.executor.clone();
        let ctx = harness.context();
        let params = full_configure(node);
        handles.push(tokio::spawn(async move { executor.execute(&ctx, &params).await }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.state(), NodeState::SoftwareInstalled);
    }
    let elapsed = start.elapsed();

    assert!(
        elapsed < Duration::from_millis(200 * 8),
        "subtasks ran sequentially: {:?}",
        elapsed
    );
    for node in &nodes {
        assert_eq!(harness.state(node).await, NodeState::SoftwareInstalled);
    }
    assert_eq!(state_changes(&harness.recorder.events().await).len(), nodes.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_events_carry_their_own_invocation_id() {
    let harness =
        TestHarness::with_adapter(ScriptedAdapter::new().with_delay(Duration::from_millis(20)))
            .await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;
    harness.seed("N2", "u1", NodeState::Provisioned).await;

    let a = harness.executor.clone();
    let b = harness.executor.clone();
    let (ctx_a, ctx_b) = (harness.context(), harness.context());
    let (pa, pb) = (full_configure("N1"), full_configure("N2"));
    let (ra, rb) = tokio::join!(a.execute(&ctx_a, &pa), b.execute(&ctx_b, &pb));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());
    assert_ne!(ra.invocation_id, rb.invocation_id);

    for outcome in [ra, rb] {
        let events = harness.recorder.events_for(&outcome.node_id).await;
        let ids: HashSet<_> = events
            .iter()
            .map(|event| match event {
                Event::SubTaskStarted { invocation_id, .. }
                | Event::SubTaskRejected { invocation_id, .. }
                | Event::CommandSucceeded { invocation_id, .. }
                | Event::CommandFailed { invocation_id, .. }
                | Event::StateChanged { invocation_id, .. } => *invocation_id,
            })
            .collect();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&outcome.invocation_id));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_subtasks_on_one_node_transition_once() {
    let harness =
        TestHarness::with_adapter(ScriptedAdapter::new().with_delay(Duration::from_millis(50)))
            .await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let executor = harness.executor.clone();
        let ctx = harness.context();
        handles.push(tokio::spawn(async move {
            executor.execute(&ctx, &full_configure("N1")).await
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => assert_eq!(outcome.state(), NodeState::SoftwareInstalled),
            Err(SubTaskError::StateTransition(StateTransitionError::Conflict { .. })) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(harness.state("N1").await, NodeState::SoftwareInstalled);
    assert_eq!(
        state_changes(&harness.recorder.events().await),
        vec![(NodeState::Provisioned, NodeState::SoftwareInstalled)]
    );
}
