//! Stable exit codes for the `oneshot` binary.

use crate::core::types::TaskStatus;
use crate::error::{ErrorKind, RunError};

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed, or the task ended `failed`.
pub const ERROR: i32 = 1;
/// The task ended `needs_action`.
pub const NEEDS_ACTION: i32 = 2;
/// The agent binary is missing or unusable.
pub const AGENT_UNAVAILABLE: i32 = 3;

/// Exit code for a failed task run.
pub fn for_run_error(err: &RunError) -> i32 {
    if err.kind() == ErrorKind::Startup {
        return AGENT_UNAVAILABLE;
    }
    match err.status() {
        Some(TaskStatus::NeedsAction) => NEEDS_ACTION,
        _ => ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OneshotError;

    #[test]
    fn needs_action_maps_to_two() {
        let err = RunError::Task {
            number: 1,
            status: TaskStatus::NeedsAction,
            error: OneshotError::new(ErrorKind::NoChanges, "no changes to commit"),
        };
        assert_eq!(for_run_error(&err), NEEDS_ACTION);
    }

    #[test]
    fn failed_and_store_errors_map_to_one() {
        let failed = RunError::Task {
            number: 1,
            status: TaskStatus::Failed,
            error: OneshotError::exit("worktree add failed", Some(128)),
        };
        let store = RunError::Store(OneshotError::new(ErrorKind::Store, "disk full"));
        assert_eq!(for_run_error(&failed), ERROR);
        assert_eq!(for_run_error(&store), ERROR);
    }
}
