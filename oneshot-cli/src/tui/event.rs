//! Background jobs and the events they send to the UI thread.

use oneshot::core::types::ProgressEvent;
use oneshot::io::agent::Agent;
use oneshot::io::git::Vcs;
use oneshot::orchestrator::Orchestrator;

use super::state::JobKind;

/// Long-running work executed off the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Execute { name: String, prompt: String },
    Delete(Vec<u32>),
    OpenPr(u32),
    UpdateMain,
    UpdateTask(u32),
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::Execute { .. } => JobKind::Execution,
            Job::Delete(_) => JobKind::Deletion,
            Job::OpenPr(_) | Job::UpdateMain | Job::UpdateTask(_) => JobKind::Simple,
        }
    }

    /// Shown while the job runs.
    pub fn title(&self) -> String {
        match self {
            Job::Execute { name, .. } => format!("Running task: {name}"),
            Job::Delete(numbers) => {
                let list: Vec<String> = numbers.iter().map(|n| format!("#{n}")).collect();
                format!("Deleting {}", list.join(", "))
            }
            Job::OpenPr(number) => format!("Creating PR for task #{number}..."),
            Job::UpdateMain => "Updating main branch from remote...".to_string(),
            Job::UpdateTask(number) => format!("Updating task #{number} from remote..."),
        }
    }
}

/// What the UI needs once a job has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub output: String,
    /// Task numbers that no longer exist.
    pub deleted: Vec<u32>,
}

impl JobOutcome {
    fn message(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            deleted: Vec::new(),
        }
    }
}

/// Events sent from the job thread to the UI thread.
#[derive(Debug)]
pub enum UiEvent {
    Progress(ProgressEvent),
    Finished(JobOutcome),
}

/// Run `job` to completion, reporting progress through `emit`.
pub fn run_job<V, A, F>(orch: &Orchestrator<V, A>, job: Job, mut emit: F) -> JobOutcome
where
    V: Vcs,
    A: Agent,
    F: FnMut(ProgressEvent),
{
    match job {
        Job::Execute { name, prompt } => {
            match orch.create_and_execute_task(&name, &prompt, &mut emit) {
                Ok(task) => JobOutcome::message(format!(
                    "✓ Task #{} completed\nPR: {}",
                    task.number,
                    task.pr_url.as_deref().unwrap_or("-")
                )),
                Err(err) => JobOutcome::message(format!("Error: {err}")),
            }
        }
        Job::Delete(numbers) => {
            let outcomes = orch.delete_tasks(&numbers, &mut emit);
            JobOutcome {
                output: outcomes
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
                deleted: outcomes
                    .iter()
                    .filter(|outcome| outcome.is_deleted())
                    .map(|outcome| outcome.number())
                    .collect(),
            }
        }
        Job::OpenPr(number) => match orch.open_pull_request(number) {
            Ok(task) => JobOutcome::message(format!(
                "✓ PR created: {}",
                task.pr_url.as_deref().unwrap_or("-")
            )),
            Err(err) => JobOutcome::message(format!("✗ Failed to create PR: {err}")),
        },
        Job::UpdateMain => update_outcome(orch.update_main()),
        Job::UpdateTask(number) => update_outcome(orch.update_task(number)),
    }
}

fn update_outcome(result: oneshot::error::OpResult<String>) -> JobOutcome {
    match result {
        Ok(log) => JobOutcome::message(format!("✓ Update complete:\n{}", log.trim_end())),
        Err(err) => JobOutcome::message(format!("✗ Failed to update: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use oneshot::core::types::Stage;
    use oneshot::test_support::{ScriptedAgent, ScriptedVcs, exit_error, temp_store};

    use super::*;

    fn orchestrator(
        store: oneshot::io::store::TaskStore,
    ) -> Orchestrator<ScriptedVcs, ScriptedAgent> {
        Orchestrator::new(
            store,
            ScriptedVcs::new("/wt"),
            ScriptedAgent::with_lines(&["Editing README.md"]),
        )
    }

    #[test]
    fn execute_reports_pr() {
        let (_temp, store) = temp_store();
        let orch = orchestrator(store);
        let mut events = Vec::new();
        let outcome = run_job(
            &orch,
            Job::Execute {
                name: "Docs".to_string(),
                prompt: "write docs".to_string(),
            },
            |e| events.push(e),
        );
        assert_eq!(
            outcome.output,
            "✓ Task #1 completed\nPR: https://github.com/acme/widgets/pull/1"
        );
        assert_eq!(events.first().map(|e| e.stage), Some(Stage::Worktree));
    }

    #[test]
    fn delete_lists_every_outcome() {
        let (_temp, store) = temp_store();
        let orch = orchestrator(store);
        run_job(
            &orch,
            Job::Execute {
                name: "a".to_string(),
                prompt: "a".to_string(),
            },
            |_| {},
        );
        let outcome = run_job(&orch, Job::Delete(vec![1, 2]), |_| {});
        assert_eq!(
            outcome.output,
            "✓ Task #1 deleted (worktree, branch, and remote cleaned up)\n✗ Task #2 not found"
        );
        assert_eq!(outcome.deleted, vec![1]);
    }

    #[test]
    fn failed_update_is_reported() {
        let (_temp, store) = temp_store();
        let orch = orchestrator(store);
        orch.vcs().fail("update_main_branch", exit_error("offline"));
        let outcome = run_job(&orch, Job::UpdateMain, |_| {});
        assert_eq!(outcome.output, "✗ Failed to update: offline");
    }

    #[test]
    fn titles_describe_the_job() {
        assert_eq!(Job::Delete(vec![3, 5]).title(), "Deleting #3, #5");
        assert_eq!(Job::OpenPr(2).kind(), JobKind::Simple);
    }
}
