//! Lifecycle progression integration tests.
//!
//! Tests that verify how sequences of configure subtasks move a node through
//! its lifecycle.

use crate::common::{full_configure, gflags_update, software_upgrade, state_changes};
use nodeconf::testing::TestHarness;
use nodeconf::{Event, NodeId, NodeState, Transition, UniverseId};

#[tokio::test]
async fn test_full_configure_moves_provisioned_node_to_software_installed() {
    let harness = TestHarness::new().await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;

    let outcome = harness
        .executor
        .execute(&harness.context(), &full_configure("N1"))
        .await
        .unwrap();

    assert_eq!(
        outcome.transition,
        Transition::Changed {
            from: NodeState::Provisioned,
            to: NodeState::SoftwareInstalled,
        }
    );
    assert_eq!(harness.state("N1").await, NodeState::SoftwareInstalled);

    let events = harness.recorder.events().await;
    assert!(matches!(events.first(), Some(Event::SubTaskStarted { kind: "everything", .. })));
    assert!(events.iter().any(|e| matches!(e, Event::CommandSucceeded { .. })));
    assert_eq!(
        state_changes(&events),
        vec![(NodeState::Provisioned, NodeState::SoftwareInstalled)]
    );
}

#[tokio::test]
async fn test_full_configure_on_software_installed_node_is_noop() {
    let harness = TestHarness::new().await;
    harness.seed("N2", "u1", NodeState::SoftwareInstalled).await;

    let outcome = harness
        .executor
        .execute(&harness.context(), &full_configure("N2"))
        .await
        .unwrap();

    assert_eq!(outcome.transition, Transition::Unchanged(NodeState::SoftwareInstalled));
    assert_eq!(harness.adapter.call_count().await, 1);
    assert!(state_changes(&harness.recorder.events().await).is_empty());
}

#[tokio::test]
async fn test_repeated_full_configure_is_idempotent() {
    let harness = TestHarness::new().await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;

    for _ in 0..3 {
        let outcome = harness
            .executor
            .execute(&harness.context(), &full_configure("N1"))
            .await
            .unwrap();
        assert_eq!(outcome.state(), NodeState::SoftwareInstalled);
    }

    assert_eq!(harness.adapter.call_count().await, 3);
    assert_eq!(state_changes(&harness.recorder.events().await).len(), 1);
}

#[tokio::test]
async fn test_full_configure_past_software_installed_is_noop() {
    for state in [NodeState::Running, NodeState::Stopped] {
        let harness = TestHarness::new().await;
        harness.seed("N1", "u1", state).await;

        let outcome = harness
            .executor
            .execute(&harness.context(), &full_configure("N1"))
            .await
            .unwrap();

        assert_eq!(outcome.transition, Transition::Unchanged(state));
        assert_eq!(harness.state("N1").await, state);
    }
}

#[tokio::test]
async fn test_full_configure_skips_forward_from_uncreated() {
    let harness = TestHarness::new().await;
    harness.executor.register_node("N1", "u1").await.unwrap();

    let outcome = harness
        .executor
        .execute(&harness.context(), &full_configure("N1"))
        .await
        .unwrap();

    assert_eq!(
        outcome.transition,
        Transition::Changed {
            from: NodeState::Uncreated,
            to: NodeState::SoftwareInstalled,
        }
    );
}

#[tokio::test]
async fn test_software_and_gflags_never_change_state() {
    for state in [NodeState::Uncreated, NodeState::Provisioned, NodeState::Running] {
        let harness = TestHarness::new().await;
        harness.seed("N1", "u1", state).await;

        for params in [software_upgrade("N1"), gflags_update("N1")] {
            let outcome = harness
                .executor
                .execute(&harness.context(), &params)
                .await
                .unwrap();
            assert!(!outcome.changed());
            assert_eq!(harness.state("N1").await, state);
        }
    }
}

#[tokio::test]
async fn test_state_never_moves_backwards_over_mixed_sequence() {
    let harness = TestHarness::new().await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;

    let sequence = [
        software_upgrade("N1"),
        full_configure("N1"),
        gflags_update("N1"),
        full_configure("N1"),
        software_upgrade("N1"),
    ];

    let mut last_rank = NodeState::Provisioned.rank();
    for params in &sequence {
        harness
            .executor
            .execute(&harness.context(), params)
            .await
            .unwrap();
        let rank = harness.state("N1").await.rank();
        assert!(rank >= last_rank, "state moved backwards: {:?} -> {:?}", last_rank, rank);
        last_rank = rank;
    }

    assert_eq!(harness.state("N1").await, NodeState::SoftwareInstalled);
}

#[tokio::test]
async fn test_nodes_in_a_universe_are_tracked_independently() {
    let harness = TestHarness::new().await;
    harness.seed("N1", "u1", NodeState::Provisioned).await;
    harness.seed("N2", "u1", NodeState::Provisioned).await;
    harness.seed("N3", "u2", NodeState::Provisioned).await;

    harness
        .executor
        .execute(&harness.context(), &full_configure("N1"))
        .await
        .unwrap();

    let nodes = harness
        .executor
        .lifecycle()
        .universe_nodes(&UniverseId::new("u1"))
        .await
        .unwrap();
    let states: Vec<(&str, NodeState)> = nodes
        .iter()
        .map(|record| (record.node_id.as_str(), record.state))
        .collect();
    assert_eq!(
        states,
        vec![("N1", NodeState::SoftwareInstalled), ("N2", NodeState::Provisioned)]
    );
    assert_eq!(harness.state("N3").await, NodeState::Provisioned);
}

#[tokio::test]
async fn test_removed_node_cannot_be_configured() {
    let harness = TestHarness::new().await;
    harness.seed("N1", "u1", NodeState::SoftwareInstalled).await;

    harness.executor.remove_node(&NodeId::new("N1")).await.unwrap();
    let result = harness
        .executor
        .execute(&harness.context(), &full_configure("N1"))
        .await;

    assert!(matches!(result, Err(nodeconf::SubTaskError::Validation(_))));
    assert_eq!(harness.adapter.call_count().await, 0);
}
