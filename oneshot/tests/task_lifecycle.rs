//! Orchestrator lifecycle tests against scripted VCS and agent doubles.
//!
//! Each test drives a full operation and then checks both the returned value
//! and what was persisted, since the task record is what users see later.

use oneshot::core::types::{ProgressEvent, Stage, TaskStatus};
use oneshot::error::{ErrorKind, OneshotError, RunError};
use oneshot::orchestrator::{DeletionOutcome, Orchestrator};
use oneshot::test_support::{ScriptedAgent, ScriptedVcs, exit_error, temp_store};

const WORKTREES: &str = "/tmp/oneshot-test/worktrees";

fn stages(events: &[ProgressEvent]) -> Vec<Stage> {
    let mut out: Vec<Stage> = Vec::new();
    for event in events {
        if out.last() != Some(&event.stage) {
            out.push(event.stage);
        }
    }
    out
}

#[test]
fn successful_run_completes_with_pr() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store.clone(),
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::with_lines(&["Reading the login form", "Editing src/login.rs"]),
    )
    .with_branch_prefix(Some("marco".to_string()));

    let mut events = Vec::new();
    let task = orch
        .create_and_execute_task("Fix the Login Bug!", "fix login", |e| events.push(e))
        .expect("run");

    assert_eq!(task.number, 1);
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.branch_name, "marco/fix-the-login-bug");
    assert_eq!(
        task.pr_url.as_deref(),
        Some("https://github.com/acme/widgets/pull/1")
    );
    assert_eq!(
        task.result.as_deref(),
        Some("Reading the login form\nEditing src/login.rs")
    );
    assert_eq!(store.get_by_id(&task.id).expect("get"), Some(task.clone()));

    assert_eq!(stages(&events), Stage::EXECUTION.to_vec());
    assert!(events.contains(&ProgressEvent::message(
        Stage::ClaudeExecuting,
        "Editing src/login.rs"
    )));

    let prompts = orch.agent().prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].0.contains("fix login"));
    assert_eq!(prompts[0].1, task.worktree_path);

    let calls = orch.vcs().calls();
    assert_eq!(
        calls.iter().map(|c| c.split(' ').next().unwrap_or("")).collect::<Vec<_>>(),
        vec!["create_worktree", "commit_and_push", "create_pr"]
    );
}

#[test]
fn default_prefix_is_used_without_configuration() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store,
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::with_lines(&["done"]),
    );
    let task = orch
        .create_and_execute_task("Add README", "add a readme", |_| {})
        .expect("run");
    assert_eq!(task.branch_name, "oneshot/add-readme");
}

#[test]
fn worktree_failure_marks_failed_and_skips_agent() {
    let (_temp, store) = temp_store();
    let vcs = ScriptedVcs::new(WORKTREES);
    vcs.fail("create_worktree", exit_error("fatal: invalid reference"));
    let orch = Orchestrator::new(store.clone(), vcs, ScriptedAgent::with_lines(&["hi"]));

    let mut events = Vec::new();
    let err = orch
        .create_and_execute_task("x", "y", |e| events.push(e))
        .unwrap_err();

    assert_eq!(err.status(), Some(TaskStatus::Failed));
    assert!(!orch.agent().invoked());
    assert_eq!(stages(&events), vec![Stage::Worktree]);

    let task = store.get_by_number(1).expect("get").expect("task");
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some(err.to_string().as_str()));
}

#[test]
fn agent_failure_without_output_needs_action() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store.clone(),
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::failing("Claude execution failed (code 1) with no output"),
    );

    let err = orch.create_and_execute_task("x", "y", |_| {}).unwrap_err();

    let RunError::Task { number, status, error } = &err else {
        panic!("expected task error, got {err:?}");
    };
    assert_eq!(*number, 1);
    assert_eq!(*status, TaskStatus::NeedsAction);
    assert_eq!(error.kind, ErrorKind::Exit);
    assert!(!orch.vcs().called("commit_and_push"));

    let task = store.get_by_number(1).expect("get").expect("task");
    assert_eq!(task.status, TaskStatus::NeedsAction);
    assert_eq!(
        task.error.as_deref(),
        Some("Claude execution failed (code 1) with no output")
    );
}

#[test]
fn spawn_failure_needs_action() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store.clone(),
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::unspawnable(),
    );
    let err = orch.create_and_execute_task("x", "y", |_| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Spawn);
    assert_eq!(err.status(), Some(TaskStatus::NeedsAction));
}

#[test]
fn empty_diff_needs_action_without_pr() {
    let (_temp, store) = temp_store();
    let vcs = ScriptedVcs::new(WORKTREES);
    vcs.fail(
        "commit_and_push",
        OneshotError::new(
            ErrorKind::NoChanges,
            "Failed to commit and push: no changes to commit",
        ),
    );
    let orch = Orchestrator::new(store.clone(), vcs, ScriptedAgent::with_lines(&["nothing to do"]));

    let err = orch.create_and_execute_task("x", "y", |_| {}).unwrap_err();

    assert!(err.to_string().contains("no changes to commit"));
    assert_eq!(err.status(), Some(TaskStatus::NeedsAction));
    assert!(!orch.vcs().called("create_pr"));

    let task = store.get_by_number(1).expect("get").expect("task");
    assert_eq!(task.status, TaskStatus::NeedsAction);
    assert_eq!(task.pr_url, None);
    assert_eq!(task.result.as_deref(), Some("nothing to do"));
}

#[test]
fn pr_failure_needs_action_and_keeps_commit() {
    let (_temp, store) = temp_store();
    let vcs = ScriptedVcs::new(WORKTREES);
    vcs.fail("create_pr", exit_error("gh: not logged in"));
    let orch = Orchestrator::new(store.clone(), vcs, ScriptedAgent::with_lines(&["Updated docs"]));

    let err = orch.create_and_execute_task("x", "y", |_| {}).unwrap_err();
    assert_eq!(err.status(), Some(TaskStatus::NeedsAction));
    assert!(orch.vcs().called("commit_and_push"));

    let task = store.get_by_number(1).expect("get").expect("task");
    assert_eq!(task.status, TaskStatus::NeedsAction);
    assert_eq!(task.error.as_deref(), Some("gh: not logged in"));
}

#[test]
fn open_pull_request_recovers_needs_action_task() {
    let (_temp, store) = temp_store();
    let vcs = ScriptedVcs::new(WORKTREES);
    vcs.fail("create_pr", exit_error("gh: not logged in"));
    let orch = Orchestrator::new(store.clone(), vcs, ScriptedAgent::with_lines(&["Updated docs"]));
    orch.create_and_execute_task("x", "y", |_| {}).unwrap_err();

    orch.vcs().succeed("create_pr");
    orch.vcs().fail(
        "commit_and_push",
        OneshotError::new(ErrorKind::NoChanges, "no changes to commit"),
    );
    let task = orch.open_pull_request(1).expect("open pr");

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.error, None);
    assert_eq!(
        task.pr_url.as_deref(),
        Some("https://github.com/acme/widgets/pull/1")
    );
    assert!(orch.vcs().called("push_branch"));
    assert_eq!(store.get_by_number(1).expect("get"), Some(task));
}

#[test]
fn open_pull_request_is_idempotent_once_linked() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store,
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::with_lines(&["done"]),
    );
    let first = orch.create_and_execute_task("x", "y", |_| {}).expect("run");
    let again = orch.open_pull_request(first.number).expect("open pr");
    assert_eq!(again, first);
    let pr_calls = orch
        .vcs()
        .calls()
        .iter()
        .filter(|c| c.starts_with("create_pr"))
        .count();
    assert_eq!(pr_calls, 1);
}

#[test]
fn open_pull_request_rejects_failed_and_missing_tasks() {
    let (_temp, store) = temp_store();
    let vcs = ScriptedVcs::new(WORKTREES);
    vcs.fail("create_worktree", exit_error("boom"));
    let orch = Orchestrator::new(store, vcs, ScriptedAgent::default());
    orch.create_and_execute_task("x", "y", |_| {}).unwrap_err();

    let err = orch.open_pull_request(1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);
    let err = orch.open_pull_request(42).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.to_string(), "task #42 not found");
}

#[test]
fn delete_reports_each_number_independently() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store.clone(),
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::with_lines(&["done"]),
    );
    for name in ["one", "two", "three", "four", "five"] {
        orch.create_and_execute_task(name, name, |_| {}).expect("run");
    }
    orch.vcs().fail("delete_branch", exit_error("remote ref does not exist"));

    let mut events = Vec::new();
    let outcomes = orch.delete_tasks(&[3, 99, 5], |e| events.push(e));

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_deleted());
    assert_eq!(outcomes[1], DeletionOutcome::NotFound { number: 99 });
    assert!(outcomes[2].is_deleted());
    let DeletionOutcome::Deleted { warnings, .. } = &outcomes[0] else {
        panic!("expected deletion");
    };
    assert_eq!(warnings, &vec!["remote ref does not exist".to_string()]);
    assert_eq!(
        outcomes[0].to_string(),
        "✓ Task #3 deleted with cleanup warnings:\n  ⚠ remote ref does not exist"
    );

    let remaining: Vec<u32> = store
        .get_all()
        .expect("all")
        .iter()
        .map(|t| t.number)
        .collect();
    assert_eq!(remaining, vec![1, 2, 4]);

    let first_deletion: Vec<Stage> = stages(&events).into_iter().take(4).collect();
    assert_eq!(first_deletion, Stage::DELETION.to_vec());
}

#[test]
fn numbers_keep_increasing_after_deletion() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store,
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::with_lines(&["done"]),
    );
    orch.create_and_execute_task("a", "a", |_| {}).expect("a");
    orch.create_and_execute_task("b", "b", |_| {}).expect("b");
    orch.delete_tasks(&[2], |_| {});
    let c = orch.create_and_execute_task("c", "c", |_| {}).expect("c");
    assert_eq!(c.number, 3);
}

#[test]
fn update_task_uses_task_workspace() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store,
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::with_lines(&["done"]),
    );
    let task = orch.create_and_execute_task("a", "a", |_| {}).expect("a");

    let log = orch.update_task(task.number).expect("update");
    assert!(log.contains(&task.branch_name));
    let last = orch.vcs().calls().pop().unwrap_or_default();
    assert!(last.starts_with("update_from_remote"));
    assert!(last.contains(&task.worktree_path.to_string_lossy().to_string()));

    orch.update_main().expect("update main");
    assert!(orch.vcs().called("update_main_branch"));
}

#[test]
fn transcript_is_persisted_while_agent_runs() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store.clone(),
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::with_lines(&["Reading the code", "Editing src/lib.rs", "Running tests"]),
    );

    let mut snapshots = Vec::new();
    orch.create_and_execute_task("Live log", "show progress", |event| {
        let agent_stage = matches!(
            event.stage,
            Stage::ClaudeThinking | Stage::ClaudeExecuting
        );
        if agent_stage && event.message.is_some() {
            let task = store
                .get_by_number(1)
                .expect("get")
                .expect("task exists");
            snapshots.push((task.status, task.result));
        }
    })
    .expect("run");

    assert_eq!(
        snapshots,
        vec![
            (
                TaskStatus::InProgress,
                Some("Reading the code".to_string())
            ),
            (
                TaskStatus::InProgress,
                Some("Reading the code\nEditing src/lib.rs".to_string())
            ),
            (
                TaskStatus::InProgress,
                Some("Reading the code\nEditing src/lib.rs\nRunning tests".to_string())
            ),
        ]
    );
}

#[test]
fn store_failure_after_worktree_marks_failed() {
    let (_temp, store) = temp_store();
    let orch = Orchestrator::new(
        store.clone(),
        ScriptedVcs::new(WORKTREES),
        ScriptedAgent::with_lines(&["done"]),
    );
    orch.vcs()
        .block_path_on_worktree(store.path().with_extension("json.tmp"));

    let err = orch
        .create_and_execute_task("Blocked", "cannot save", |_| {})
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Store);
    assert_eq!(err.status(), Some(TaskStatus::Failed));
    assert!(matches!(err, RunError::Task { number: 1, .. }));
    assert!(!orch.agent().invoked());
}
