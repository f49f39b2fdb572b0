//! Node lifecycle states and the rules for moving between them.
//!
//! ```text
//! Uncreated -> Provisioned -> SoftwareInstalled -> Running <-> Stopped -> Decommissioned
//!                                   (any) ------------------------------> Failed
//! ```
//!
//! States are ranked; a transition is legal when it moves to a strictly
//! higher rank, swaps between `Running` and `Stopped`, or lands on `Failed`.
//! `Failed` is terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Registered with the universe, no machine yet.
    Uncreated,
    /// Machine exists and has been prepared.
    Provisioned,
    /// Database software and configuration are in place.
    SoftwareInstalled,
    /// Server processes are running.
    Running,
    /// Server processes are stopped.
    Stopped,
    /// Removed from service.
    Decommissioned,
    /// Unrecoverable error; terminal.
    Failed,
}

/// The outcome of applying a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The stored state changed.
    Changed { from: NodeState, to: NodeState },
    /// The node was already at (or, for an advance, past) the target.
    Unchanged(NodeState),
}

impl Transition {
    /// The state the node is in after the transition.
    pub fn resulting_state(&self) -> NodeState {
        match self {
            Transition::Changed { to, .. } => *to,
            Transition::Unchanged(state) => *state,
        }
    }

    /// Whether the stored state was modified.
    pub fn is_changed(&self) -> bool {
        matches!(self, Transition::Changed { .. })
    }
}

impl NodeState {
    /// All states, in lifecycle order.
    pub const ALL: [NodeState; 7] = [
        NodeState::Uncreated,
        NodeState::Provisioned,
        NodeState::SoftwareInstalled,
        NodeState::Running,
        NodeState::Stopped,
        NodeState::Decommissioned,
        NodeState::Failed,
    ];

    /// Position along the forward ordering. `Running` and `Stopped` share a rank.
    ///
    /// `Failed` has no rank because it sits outside the ordering.
    pub fn rank(self) -> Option<u8> {
        match self {
            NodeState::Uncreated => Some(0),
            NodeState::Provisioned => Some(1),
            NodeState::SoftwareInstalled => Some(2),
            NodeState::Running | NodeState::Stopped => Some(3),
            NodeState::Decommissioned => Some(4),
            NodeState::Failed => None,
        }
    }

    /// A terminal state has no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Failed)
    }

    /// Whether a node in this state still counts as a live member of its universe.
    pub fn is_active(self) -> bool {
        !matches!(self, NodeState::Decommissioned | NodeState::Failed)
    }

    /// Whether moving from `self` to `target` is a legal, state-changing transition.
    pub fn can_transition_to(self, target: NodeState) -> bool {
        if self == target || self.is_terminal() {
            return false;
        }
        if target == NodeState::Failed {
            return true;
        }
        match (self, target) {
            (NodeState::Running, NodeState::Stopped) | (NodeState::Stopped, NodeState::Running) => {
                true
            }
            _ => match (self.rank(), target.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    /// Whether the node is already at `target` or further along the ordering.
    ///
    /// `Failed` is never considered at-or-past anything but itself.
    pub fn is_at_or_past(self, target: NodeState) -> bool {
        if self == target {
            return true;
        }
        match (self.rank(), target.rank()) {
            (Some(current), Some(target)) => current >= target,
            _ => false,
        }
    }

    /// Stable string form used in storage and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Uncreated => "uncreated",
            NodeState::Provisioned => "provisioned",
            NodeState::SoftwareInstalled => "software_installed",
            NodeState::Running => "running",
            NodeState::Stopped => "stopped",
            NodeState::Decommissioned => "decommissioned",
            NodeState::Failed => "failed",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown state name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown node state: {0}")]
pub struct ParseNodeStateError(pub String);

impl FromStr for NodeState {
    type Err = ParseNodeStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ParseNodeStateError(s.to_string()))
    }
}
