//! Failure handling integration tests.
//!
//! Tests that verify a failed command leaves no trace in the lifecycle and
//! that only the orchestrator marks nodes failed.

use crate::common::{full_configure, state_changes};
use nodeconf::testing::{ScriptedAdapter, TestHarness};
use nodeconf::{AdapterError, Event, ExecutionError, NodeId, NodeState, SubTaskError};
use std::time::Duration;

#[tokio::test]
async fn test_non_zero_exit_leaves_provisioned_node_untouched() {
    let harness = TestHarness::new().await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;
    harness
        .adapter
        .push_exit(1, "PLAY [configure]", "fatal: [N1]: UNREACHABLE!")
        .await;

    let before = harness.state("N1").await;
    let result = harness
        .executor
        .execute(&harness.context(), &full_configure("N1"))
        .await;
    let after = harness.state("N1").await;

    let err = result.unwrap_err();
    assert!(err.is_retryable());
    match err {
        SubTaskError::Execution(ExecutionError::NonZeroExit { code, stderr, .. }) => {
            assert_eq!(code, 1);
            assert!(stderr.contains("UNREACHABLE"));
        }
        other => panic!("Expected NonZeroExit, got {:?}", other),
    }
    assert_eq!(before, after);
    assert_eq!(after, NodeState::Provisioned);

    let events = harness.recorder.events().await;
    assert!(events.iter().any(|e| matches!(
        e,
        Event::CommandFailed {
            exit_code: Some(1),
            ..
        }
    )));
    assert!(state_changes(&events).is_empty());
}

#[tokio::test]
async fn test_retry_after_failure_succeeds() {
    let harness = TestHarness::new().await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;
    harness.adapter.push_exit(2, "", "apt lock held").await;
    harness.adapter.push_success("changed=4").await;

    let params = full_configure("N1");
    let first = harness.executor.execute(&harness.context(), &params).await;
    assert!(first.is_err());

    let second = harness
        .executor
        .execute(&harness.context(), &params)
        .await
        .unwrap();
    assert_eq!(second.state(), NodeState::SoftwareInstalled);
    assert_eq!(second.output.stdout, "changed=4");
}

#[tokio::test]
async fn test_adapter_errors_are_execution_errors() {
    let errors = vec![
        AdapterError::Timeout(Duration::from_secs(1800)),
        AdapterError::Spawn("No such file or directory".into()),
        AdapterError::Transport("connection reset".into()),
    ];

    for error in errors {
        let harness = TestHarness::new().await;
        harness.seed("N1", "u1", NodeState::Provisioned).await;
        harness.adapter.push_error(error).await;

        let result = harness
            .executor
            .execute(&harness.context(), &full_configure("N1"))
            .await;

        assert!(matches!(
            result,
            Err(SubTaskError::Execution(ExecutionError::Adapter(_)))
        ));
        assert_eq!(harness.state("N1").await, NodeState::Provisioned);
    }
}

#[tokio::test]
async fn test_executor_never_escalates_on_its_own() {
    let harness = TestHarness::with_adapter(ScriptedAdapter::failing(255, "ssh: refused")).await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;

    for _ in 0..5 {
        let _ = harness
            .executor
            .execute(&harness.context(), &full_configure("N1"))
            .await;
    }

    assert_eq!(harness.state("N1").await, NodeState::Provisioned);
}

#[tokio::test]
async fn test_orchestrator_escalation_makes_node_inactive() {
    let harness = TestHarness::with_adapter(ScriptedAdapter::failing(255, "ssh: refused")).await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;
    let node = NodeId::new("N1");

    let err = harness
        .executor
        .execute(&harness.context(), &full_configure("N1"))
        .await
        .unwrap_err();
    harness
        .executor
        .escalate_failure(&harness.context(), &node, &err.to_string())
        .await
        .unwrap();

    assert_eq!(harness.state("N1").await, NodeState::Failed);
    let calls_before = harness.adapter.call_count().await;
    let result = harness
        .executor
        .execute(&harness.context(), &full_configure("N1"))
        .await;
    assert!(matches!(result, Err(SubTaskError::Validation(_))));
    assert_eq!(harness.adapter.call_count().await, calls_before);
    assert_eq!(
        state_changes(&harness.recorder.events().await),
        vec![(NodeState::Provisioned, NodeState::Failed)]
    );
}

#[tokio::test]
async fn test_escalating_unknown_node_is_error() {
    let harness = TestHarness::new().await;

    let result = harness
        .executor
        .escalate_failure(&harness.context(), &NodeId::new("ghost"), "lost")
        .await;

    assert!(result.is_err());
}
