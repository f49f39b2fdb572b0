//! Provisioning process integration tests.
//!
//! Tests that drive a real shell script through `ProcessAdapter`.

use crate::common::{full_configure, gflags_update, write_script};
use nodeconf::testing::seed_node;
use nodeconf::{
    AdapterError, ExecutionContext, ExecutionError, ExecutionMode, FlagMap, InMemoryNodeStore,
    NodeId, NodeState, ProcessAdapter, SubTaskError, SubTaskExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn executor_with(adapter: ProcessAdapter) -> SubTaskExecutor {
    let store = Arc::new(InMemoryNodeStore::new());
    seed_node(store.as_ref(), "N1", "u1", NodeState::Provisioned).await;
    SubTaskExecutor::new(Arc::new(adapter), store)
}

#[tokio::test]
async fn test_script_receives_invocation_arguments() {
    let dir = TempDir::new().unwrap();
    let record = dir.path().join("args.txt");
    let script = write_script(
        dir.path(),
        "provision.sh",
        &format!("printf '%s\\n' \"$@\" > {}\necho configured", record.display()),
    );
    let adapter = ProcessAdapter::builder(script.to_string_lossy())
        .args(["onprem"])
        .build();
    let executor = executor_with(adapter).await;
    let ctx = ExecutionContext::new().with_default_gflags(FlagMap::new().with_flag("log_dir", "/mnt/d0"));

    let outcome = executor
        .execute(
            &ctx,
            &full_configure("N1").with_execution_mode(ExecutionMode::Bootstrap),
        )
        .await
        .unwrap();

    assert_eq!(outcome.state(), NodeState::SoftwareInstalled);
    assert_eq!(outcome.output.stdout.trim(), "configured");
    let args: Vec<String> = std::fs::read_to_string(&record)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();
    assert_eq!(
        args,
        vec![
            "onprem",
            "instance",
            "configure",
            "--universe",
            "u1",
            "--type",
            "everything",
            "--package",
            "yugabyte-2.0.0.0-b1.tar.gz",
            "--gflags",
            r#"{"log_dir":"/mnt/d0","placement_cloud":"onprem"}"#,
            "--master_shell_mode",
            "N1",
        ]
    );
}

#[tokio::test]
async fn test_script_failure_surfaces_stderr() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "provision.sh",
        "echo 'TASK [gflags]'\necho 'fatal: [N1]: FAILED! => permission denied' >&2\nexit 4",
    );
    let executor = executor_with(ProcessAdapter::builder(script.to_string_lossy()).build()).await;

    let err = executor
        .execute(&ExecutionContext::new(), &gflags_update("N1"))
        .await
        .unwrap_err();

    match &err {
        SubTaskError::Execution(exec) => {
            assert_eq!(exec.exit_code(), Some(4));
            assert!(exec.diagnostic().unwrap().contains("permission denied"));
        }
        other => panic!("Expected Execution error, got {:?}", other),
    }
    assert!(err.to_string().contains("permission denied"));
    assert_eq!(
        executor
            .lifecycle()
            .current_state(&NodeId::new("N1"))
            .await
            .unwrap(),
        NodeState::Provisioned
    );
}

#[tokio::test]
async fn test_script_timeout_leaves_state_untouched() {
    let dir = TempDir::new().unwrap();
    let script = write_script(dir.path(), "provision.sh", "sleep 30");
    let adapter = ProcessAdapter::builder(script.to_string_lossy())
        .timeout(Duration::from_millis(200))
        .build();
    let executor = executor_with(adapter).await;

    let result = executor
        .execute(&ExecutionContext::new(), &full_configure("N1"))
        .await;

    assert!(matches!(
        result,
        Err(SubTaskError::Execution(ExecutionError::Adapter(
            AdapterError::Timeout(_)
        )))
    ));
    assert_eq!(
        executor
            .lifecycle()
            .current_state(&NodeId::new("N1"))
            .await
            .unwrap(),
        NodeState::Provisioned
    );
}

#[tokio::test]
async fn test_script_environment_is_passed() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        dir.path(),
        "provision.sh",
        "[ \"$ANSIBLE_HOST_KEY_CHECKING\" = \"False\" ] || exit 9",
    );
    let adapter = ProcessAdapter::builder(script.to_string_lossy())
        .env("ANSIBLE_HOST_KEY_CHECKING", "False")
        .build();
    let executor = executor_with(adapter).await;

    let outcome = executor
        .execute(&ExecutionContext::new(), &full_configure("N1"))
        .await
        .unwrap();

    assert!(outcome.output.success());
}
