//! Task lifecycle orchestration.
//!
//! The orchestrator sequences workspace creation, agent delegation, commit,
//! push and PR creation, persisting every status change before reporting it.
//! Progress is reported as an ordered stream of [`ProgressEvent`]s.

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::core::branch::{DEFAULT_BRANCH_PREFIX, format_branch_name};
use crate::core::types::{ProgressEvent, Stage, Task, TaskPatch, TaskStatus};
use crate::error::{ErrorKind, OneshotError, OpResult, RunError};
use crate::io::agent::{Agent, AgentLog, build_agent_prompt};
use crate::io::git::Vcs;
use crate::io::store::TaskStore;

/// Drives tasks through their lifecycle against a store, a VCS and an agent.
#[derive(Debug, Clone)]
pub struct Orchestrator<V, A> {
    store: TaskStore,
    vcs: V,
    agent: A,
    branch_prefix: Option<String>,
}

/// Result of deleting one task number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Record removed. `warnings` lists best-effort cleanup that failed.
    Deleted { number: u32, warnings: Vec<String> },
    NotFound { number: u32 },
    Failed { number: u32, error: String },
}

impl DeletionOutcome {
    pub fn number(&self) -> u32 {
        match self {
            DeletionOutcome::Deleted { number, .. }
            | DeletionOutcome::NotFound { number }
            | DeletionOutcome::Failed { number, .. } => *number,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, DeletionOutcome::Deleted { .. })
    }
}

impl fmt::Display for DeletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionOutcome::Deleted { number, warnings } if warnings.is_empty() => write!(
                f,
                "✓ Task #{number} deleted (worktree, branch, and remote cleaned up)"
            ),
            DeletionOutcome::Deleted { number, warnings } => {
                write!(f, "✓ Task #{number} deleted with cleanup warnings:")?;
                for warning in warnings {
                    write!(f, "\n  ⚠ {warning}")?;
                }
                Ok(())
            }
            DeletionOutcome::NotFound { number } => write!(f, "✗ Task #{number} not found"),
            DeletionOutcome::Failed { number, error } => {
                write!(f, "✗ Failed to delete task #{number}: {error}")
            }
        }
    }
}

impl<V: Vcs, A: Agent> Orchestrator<V, A> {
    pub fn new(store: TaskStore, vcs: V, agent: A) -> Self {
        Self {
            store,
            vcs,
            agent,
            branch_prefix: None,
        }
    }

    /// Use `prefix` for new branches; `None` falls back to [`DEFAULT_BRANCH_PREFIX`].
    pub fn with_branch_prefix(mut self, prefix: Option<String>) -> Self {
        self.branch_prefix = prefix;
        self
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    fn branch_prefix(&self) -> &str {
        self.branch_prefix.as_deref().unwrap_or(DEFAULT_BRANCH_PREFIX)
    }

    /// Create a task and run it to completion or to the first failure.
    ///
    /// On failure the task record holds the resulting status and the same
    /// message carried by the returned [`RunError`].
    #[instrument(skip_all, fields(name))]
    pub fn create_and_execute_task<F>(
        &self,
        name: &str,
        prompt: &str,
        mut on_progress: F,
    ) -> Result<Task, RunError>
    where
        F: FnMut(ProgressEvent),
    {
        let branch = format_branch_name(self.branch_prefix(), name);
        let task = self
            .store
            .insert(name, prompt, &branch, self.vcs.worktrees_dir())
            .map_err(|err| RunError::Store(OneshotError::store(err)))?;
        info!(number = task.number, id = %task.id, %branch, "task created");
        on_progress(ProgressEvent::stage(Stage::Worktree));

        let path = match self.vcs.create_worktree(&branch, &task.id) {
            Ok(path) => path,
            Err(err) => return Err(self.record_failure(&task, TaskStatus::Failed, err)),
        };
        if path != task.worktree_path {
            warn!(
                expected = %task.worktree_path.display(),
                actual = %path.display(),
                "worktree created at unexpected path"
            );
        }

        if let Err(err) = self.set_status(&task, TaskStatus::InProgress) {
            return Err(self.record_failure(&task, TaskStatus::Failed, err.error().clone()));
        }
        on_progress(ProgressEvent::stage(Stage::ClaudeInit));

        let agent_prompt = build_agent_prompt(prompt, &path);
        let mut stage = Stage::ClaudeInit;
        let mut transcript = String::new();
        let run = self.agent.run(&agent_prompt, &path, &mut |log| match log {
            AgentLog::Stage(next) => {
                stage = next;
                on_progress(ProgressEvent::stage(next));
            }
            AgentLog::Output(line) => {
                if !transcript.is_empty() {
                    transcript.push('\n');
                }
                transcript.push_str(&line);
                if let Err(err) = self
                    .store
                    .update(&task.id, TaskPatch::default().with_result(transcript.clone()))
                {
                    warn!(err = %format!("{err:#}"), "failed to persist live agent output");
                }
                on_progress(ProgressEvent::message(stage, line));
            }
        });
        let response = match run {
            Ok(response) => response,
            Err(err) => return Err(self.record_failure(&task, TaskStatus::NeedsAction, err)),
        };
        self.store
            .update(&task.id, TaskPatch::default().with_result(response.content))
            .map_err(|err| self.store_error(&task, TaskStatus::InProgress, err))?;

        on_progress(ProgressEvent::stage(Stage::Committing));
        if let Err(err) = self.vcs.commit_and_push(&path, &branch, name) {
            return Err(self.record_failure(&task, TaskStatus::NeedsAction, err));
        }

        on_progress(ProgressEvent::stage(Stage::CreatingPr));
        let url = match self.vcs.create_pr(&path, name, prompt) {
            Ok(url) => url,
            Err(err) => return Err(self.record_failure(&task, TaskStatus::NeedsAction, err)),
        };

        let done = self
            .store
            .update(
                &task.id,
                TaskPatch::status(TaskStatus::Completed).with_pr_url(url.clone()),
            )
            .map_err(|err| self.store_error(&task, TaskStatus::InProgress, err))?
            .ok_or_else(|| self.vanished(&task))?;
        info!(number = done.number, %url, "task completed");
        on_progress(ProgressEvent::message(Stage::Completed, url));
        Ok(done)
    }

    /// Delete tasks by number, one after another.
    ///
    /// Each number gets its own outcome; a missing or failing task never
    /// stops the batch.
    #[instrument(skip_all, fields(count = numbers.len()))]
    pub fn delete_tasks<F>(&self, numbers: &[u32], mut on_progress: F) -> Vec<DeletionOutcome>
    where
        F: FnMut(ProgressEvent),
    {
        numbers
            .iter()
            .map(|&number| self.delete_one(number, &mut on_progress))
            .collect()
    }

    fn delete_one<F>(&self, number: u32, on_progress: &mut F) -> DeletionOutcome
    where
        F: FnMut(ProgressEvent),
    {
        let task = match self.store.get_by_number(number) {
            Ok(Some(task)) => task,
            Ok(None) => {
                debug!(number, "task to delete not found");
                return DeletionOutcome::NotFound { number };
            }
            Err(err) => {
                return DeletionOutcome::Failed {
                    number,
                    error: format!("{err:#}"),
                };
            }
        };

        let mut warnings = Vec::new();
        on_progress(ProgressEvent::message(
            Stage::DeletingWorktree,
            format!("Task #{number}"),
        ));
        if let Err(err) = self.vcs.remove_worktree(&task.worktree_path) {
            warn!(number, err = %err, "worktree cleanup failed");
            warnings.push(err.message);
        }

        on_progress(ProgressEvent::message(
            Stage::DeletingBranch,
            task.branch_name.clone(),
        ));
        if let Err(err) = self.vcs.delete_branch(&task.branch_name) {
            warn!(number, err = %err, "branch cleanup failed");
            warnings.push(err.message);
        }

        on_progress(ProgressEvent::stage(Stage::DeletingTask));
        match self.store.remove(&task.id) {
            Ok(true) => {}
            Ok(false) => return DeletionOutcome::NotFound { number },
            Err(err) => {
                return DeletionOutcome::Failed {
                    number,
                    error: format!("{err:#}"),
                };
            }
        }

        on_progress(ProgressEvent::message(
            Stage::Completed,
            format!("Task #{number} deleted"),
        ));
        info!(number, warnings = warnings.len(), "task deleted");
        DeletionOutcome::Deleted { number, warnings }
    }

    /// Open a pull request for an existing task workspace.
    ///
    /// Returns the task unchanged when it already has a PR. Pending or failed
    /// tasks have no workspace and are rejected.
    #[instrument(skip_all, fields(number))]
    pub fn open_pull_request(&self, number: u32) -> OpResult<Task> {
        let task = self.require_task(number)?;
        if task.pr_url.is_some() {
            return Ok(task);
        }
        self.require_workspace(&task)?;

        let failure_status = if task.status.can_transition_to(TaskStatus::NeedsAction) {
            TaskStatus::NeedsAction
        } else {
            task.status
        };

        let pushed = match self
            .vcs
            .commit_and_push(&task.worktree_path, &task.branch_name, &task.name)
        {
            Err(err) if err.kind == ErrorKind::NoChanges => {
                debug!("nothing new to commit, pushing existing branch");
                self.vcs.push_branch(&task.worktree_path, &task.branch_name)
            }
            other => other,
        };
        if let Err(err) = pushed {
            return Err(self.record_failure(&task, failure_status, err).error().clone());
        }

        let url = match self
            .vcs
            .create_pr(&task.worktree_path, &task.name, &task.prompt)
        {
            Ok(url) => url,
            Err(err) => {
                return Err(self.record_failure(&task, failure_status, err).error().clone());
            }
        };

        let done = self
            .store
            .update(
                &task.id,
                TaskPatch::status(TaskStatus::Completed)
                    .with_pr_url(url.clone())
                    .clear_error(),
            )
            .map_err(OneshotError::store)?
            .ok_or_else(|| OneshotError::not_found(number))?;
        info!(number, %url, "pull request opened");
        Ok(done)
    }

    /// Bring the repository's default branch up to date.
    pub fn update_main(&self) -> OpResult<String> {
        self.vcs.update_main_branch()
    }

    /// Rebase a task workspace onto the latest remote changes.
    #[instrument(skip_all, fields(number))]
    pub fn update_task(&self, number: u32) -> OpResult<String> {
        let task = self.require_task(number)?;
        self.require_workspace(&task)?;
        self.vcs
            .update_from_remote(&task.worktree_path, &task.branch_name)
    }

    fn require_task(&self, number: u32) -> OpResult<Task> {
        self.store
            .get_by_number(number)
            .map_err(OneshotError::store)?
            .ok_or_else(|| OneshotError::not_found(number))
    }

    fn require_workspace(&self, task: &Task) -> OpResult<()> {
        if task.status.has_workspace() {
            return Ok(());
        }
        Err(OneshotError::new(
            ErrorKind::InvalidState,
            format!("task #{} has no workspace (status: {})", task.number, task.status),
        ))
    }

    fn set_status(&self, task: &Task, status: TaskStatus) -> Result<(), RunError> {
        debug_assert!(task.status.can_transition_to(status));
        self.store
            .update(&task.id, TaskPatch::status(status))
            .map_err(|err| self.store_error(task, task.status, err))?
            .ok_or_else(|| self.vanished(task))?;
        debug!(number = task.number, %status, "status updated");
        Ok(())
    }

    /// Persist `status` + error on the task and build the matching [`RunError`].
    fn record_failure(&self, task: &Task, status: TaskStatus, error: OneshotError) -> RunError {
        warn!(number = task.number, %status, kind = %error.kind, err = %error, "task failed");
        let patch = TaskPatch::status(status).with_error(error.message.clone());
        if let Err(store_err) = self.store.update(&task.id, patch) {
            warn!(err = %format!("{store_err:#}"), "failed to record task failure");
        }
        RunError::Task {
            number: task.number,
            status,
            error,
        }
    }

    fn store_error(&self, task: &Task, status: TaskStatus, err: anyhow::Error) -> RunError {
        RunError::Task {
            number: task.number,
            status,
            error: OneshotError::store(err),
        }
    }

    fn vanished(&self, task: &Task) -> RunError {
        RunError::Task {
            number: task.number,
            status: task.status,
            error: OneshotError::not_found(task.number),
        }
    }
}
