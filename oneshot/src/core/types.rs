//! Shared task and progress types.
//!
//! These types define the stable contracts between the store, the adapters and
//! the orchestrator. The serialized form of [`Task`] is the on-disk record
//! layout, so field names and casing must not drift.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    NeedsAction,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::NeedsAction => "needs_action",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// True if a task may move from `self` to `next`.
    ///
    /// Re-recording the current status is always allowed (live log updates
    /// while `in_progress`, a second PR link on a completed task).
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::{Completed, Failed, InProgress, NeedsAction, Pending};
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Failed)
                | (InProgress, Completed)
                | (InProgress, NeedsAction)
                | (InProgress, Failed)
                | (NeedsAction, Completed)
        )
    }

    /// True if the task owns a workspace that can still be committed from.
    pub fn has_workspace(self) -> bool {
        matches!(
            self,
            TaskStatus::InProgress | TaskStatus::NeedsAction | TaskStatus::Completed
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delegated unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub number: u32,
    pub name: String,
    pub prompt: String,
    pub status: TaskStatus,
    pub branch_name: String,
    pub worktree_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Partial update merged into a stored [`Task`].
///
/// Only fields that are set are applied. `error` distinguishes "leave as is"
/// (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub pr_url: Option<String>,
    pub result: Option<String>,
    pub error: Option<Option<String>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn with_pr_url(mut self, url: impl Into<String>) -> Self {
        self.pr_url = Some(url.into());
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Merge into `task`. Does not touch `updated_at`; the store owns that.
    pub fn apply(self, task: &mut Task) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(url) = self.pr_url {
            task.pr_url = Some(url);
        }
        if let Some(result) = self.result {
            task.result = Some(result);
        }
        if let Some(error) = self.error {
            task.error = error;
        }
    }
}

/// Phase of a running orchestrator operation. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Worktree,
    ClaudeInit,
    ClaudeThinking,
    ClaudeExecuting,
    Committing,
    CreatingPr,
    DeletingWorktree,
    DeletingBranch,
    DeletingTask,
    Completed,
}

impl Stage {
    /// Stage order for a task execution.
    pub const EXECUTION: [Stage; 7] = [
        Stage::Worktree,
        Stage::ClaudeInit,
        Stage::ClaudeThinking,
        Stage::ClaudeExecuting,
        Stage::Committing,
        Stage::CreatingPr,
        Stage::Completed,
    ];

    /// Stage order for a task deletion.
    pub const DELETION: [Stage; 4] = [
        Stage::DeletingWorktree,
        Stage::DeletingBranch,
        Stage::DeletingTask,
        Stage::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Worktree => "worktree",
            Stage::ClaudeInit => "claude_init",
            Stage::ClaudeThinking => "claude_thinking",
            Stage::ClaudeExecuting => "claude_executing",
            Stage::Committing => "committing",
            Stage::CreatingPr => "creating_pr",
            Stage::DeletingWorktree => "deleting_worktree",
            Stage::DeletingBranch => "deleting_branch",
            Stage::DeletingTask => "deleting_task",
            Stage::Completed => "completed",
        }
    }

    /// Human readable label for progress displays.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Worktree => "Creating git worktree",
            Stage::ClaudeInit => "Initializing Claude CLI",
            Stage::ClaudeThinking => "Claude is analyzing the task",
            Stage::ClaudeExecuting => "Claude is making changes",
            Stage::Committing => "Committing changes to git",
            Stage::CreatingPr => "Creating pull request",
            Stage::DeletingWorktree => "Removing git worktree",
            Stage::DeletingBranch => "Deleting branch (local and remote)",
            Stage::DeletingTask => "Removing task record",
            Stage::Completed => "Task completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the ordered progress stream emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn stage(stage: Stage) -> Self {
        Self {
            stage,
            message: None,
        }
    }

    pub fn message(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_cannot_skip_to_completed() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::NeedsAction));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn terminal_states_only_recover_through_pr() {
        assert!(TaskStatus::NeedsAction.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&TaskStatus::NeedsAction).expect("serialize");
        assert_eq!(json, "\"needs_action\"");
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let now = Utc::now();
        let mut task = Task {
            id: "abc".to_string(),
            number: 1,
            name: "n".to_string(),
            prompt: "p".to_string(),
            status: TaskStatus::InProgress,
            branch_name: "x/n".to_string(),
            worktree_path: PathBuf::from("/tmp/abc"),
            pr_url: None,
            created_at: now,
            updated_at: now,
            result: Some("log".to_string()),
            error: Some("old".to_string()),
        };
        TaskPatch::status(TaskStatus::Completed)
            .clear_error()
            .apply(&mut task);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.error, None);
        assert_eq!(task.result.as_deref(), Some("log"));
    }
}
