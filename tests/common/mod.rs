//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use nodeconf::{Event, FlagMap, NodeState, TaskParameters};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Full configure request for `node` in universe `u1`.
pub fn full_configure(node: &str) -> TaskParameters {
    TaskParameters::everything(
        node,
        "u1",
        "yugabyte-2.0.0.0-b1.tar.gz",
        FlagMap::new().with_flag("placement_cloud", "onprem"),
    )
}

/// Software-only request for `node` in universe `u1`.
pub fn software_upgrade(node: &str) -> TaskParameters {
    TaskParameters::software(node, "u1", "yugabyte-2.1.0.0-b2.tar.gz")
}

/// Flags-only request for `node` in universe `u1`.
pub fn gflags_update(node: &str) -> TaskParameters {
    TaskParameters::gflags(node, "u1", FlagMap::new().with_flag("log_min_seconds", "30"))
}

/// Every `(from, to)` pair recorded as a state change, in order.
pub fn state_changes(events: &[Event]) -> Vec<(NodeState, NodeState)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::StateChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

/// Write an executable shell script into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
