//! Generation run state machine.

use serde::{Deserialize, Serialize};

/// State of one generation run.
///
/// `Idle -> Selecting -> Bucketizing -> Assigning -> Reconciling -> Committed`,
/// or `Failed` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Selecting,
    Bucketizing,
    Assigning,
    Reconciling,
    Committed,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Selecting => "selecting",
            RunState::Bucketizing => "bucketizing",
            RunState::Assigning => "assigning",
            RunState::Reconciling => "reconciling",
            RunState::Committed => "committed",
            RunState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}
