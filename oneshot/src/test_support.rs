//! Scripted doubles for the VCS and agent seams, plus store fixtures.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::core::classifier::StageClassifier;
use crate::error::{ErrorKind, OneshotError, OpResult};
use crate::io::agent::{Agent, AgentLog, AgentResponse};
use crate::io::git::Vcs;
use crate::io::store::TaskStore;

/// A store backed by a fresh temporary directory.
///
/// Keep the returned [`TempDir`] alive for as long as the store is used.
pub fn temp_store() -> (TempDir, TaskStore) {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = TaskStore::new(temp.path().join("config").join("tasks.json"));
    (temp, store)
}

/// A git repository with one commit on `main`, cloned from a local bare remote.
pub struct TestRepo {
    temp: TempDir,
}

impl TestRepo {
    pub fn new() -> anyhow::Result<Self> {
        let temp = tempfile::tempdir()?;
        let remote = temp.path().join("remote.git");
        let work = temp.path().join("work");
        fs::create_dir_all(&work)?;

        git(temp.path(), &["init", "--bare", "-b", "main", "remote.git"])?;
        git(&work, &["init", "-b", "main"])?;
        git(&work, &["config", "user.name", "Oneshot Test"])?;
        git(&work, &["config", "user.email", "test@example.com"])?;
        git(&work, &["remote", "add", "origin", &remote.to_string_lossy()])?;
        fs::write(work.join("README.md"), "# widgets\n")?;
        git(&work, &["add", "-A"])?;
        git(&work, &["commit", "-m", "initial commit"])?;
        git(&work, &["push", "-u", "origin", "main"])?;
        git(&work, &["fetch", "origin"])?;
        Ok(Self { temp })
    }

    /// Working clone.
    pub fn path(&self) -> PathBuf {
        self.temp.path().join("work")
    }

    /// Bare repository acting as `origin`.
    pub fn remote(&self) -> PathBuf {
        self.temp.path().join("remote.git")
    }

    /// Directory for task worktrees, outside the working clone.
    pub fn worktrees_dir(&self) -> PathBuf {
        self.temp.path().join("worktrees")
    }

    /// Run git in `dir` and return trimmed stdout.
    pub fn git(&self, dir: &Path, args: &[&str]) -> anyhow::Result<String> {
        git(dir, args)
    }
}

fn git(dir: &Path, args: &[&str]) -> anyhow::Result<String> {
    let out = Command::new("git").args(args).current_dir(dir).output()?;
    if !out.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Error shaped like a failing subprocess.
pub fn exit_error(message: &str) -> OneshotError {
    OneshotError::exit(message, Some(1))
}

/// Records every call and succeeds unless told otherwise.
#[derive(Debug)]
pub struct ScriptedVcs {
    worktrees_dir: PathBuf,
    failures: RefCell<HashMap<&'static str, OneshotError>>,
    calls: RefCell<Vec<String>>,
    prs_opened: Cell<u32>,
    block_on_worktree: RefCell<Option<PathBuf>>,
}

impl ScriptedVcs {
    pub fn new(worktrees_dir: impl Into<PathBuf>) -> Self {
        Self {
            worktrees_dir: worktrees_dir.into(),
            failures: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
            prs_opened: Cell::new(0),
            block_on_worktree: RefCell::new(None),
        }
    }

    /// Make every later call of `op` fail with `error`.
    pub fn fail(&self, op: &'static str, error: OneshotError) {
        self.failures.borrow_mut().insert(op, error);
    }

    /// Create a directory at `path` when `create_worktree` runs, so any later
    /// file write to `path` fails.
    pub fn block_path_on_worktree(&self, path: impl Into<PathBuf>) {
        *self.block_on_worktree.borrow_mut() = Some(path.into());
    }

    /// Let `op` succeed again.
    pub fn succeed(&self, op: &'static str) {
        self.failures.borrow_mut().remove(op);
    }

    /// Calls in order, as `"<op> <args...>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, op: &str) -> bool {
        self.calls
            .borrow()
            .iter()
            .any(|call| call.split(' ').next() == Some(op))
    }

    fn record(&self, op: &'static str, args: &[&str]) -> OpResult<()> {
        let mut call = op.to_string();
        for arg in args {
            call.push(' ');
            call.push_str(arg);
        }
        self.calls.borrow_mut().push(call);
        match self.failures.borrow().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Vcs for ScriptedVcs {
    fn worktrees_dir(&self) -> &Path {
        &self.worktrees_dir
    }

    fn create_worktree(&self, branch: &str, task_id: &str) -> OpResult<PathBuf> {
        self.record("create_worktree", &[branch, task_id])?;
        if let Some(path) = self.block_on_worktree.borrow().as_ref() {
            fs::create_dir_all(path).expect("create blocking directory");
        }
        Ok(self.worktrees_dir.join(task_id))
    }

    fn remove_worktree(&self, path: &Path) -> OpResult<()> {
        self.record("remove_worktree", &[&path.to_string_lossy()])
    }

    fn commit_and_push(&self, path: &Path, branch: &str, message: &str) -> OpResult<()> {
        self.record("commit_and_push", &[&path.to_string_lossy(), branch, message])
    }

    fn push_branch(&self, path: &Path, branch: &str) -> OpResult<()> {
        self.record("push_branch", &[&path.to_string_lossy(), branch])
    }

    fn delete_branch(&self, branch: &str) -> OpResult<()> {
        self.record("delete_branch", &[branch])
    }

    fn create_pr(&self, path: &Path, title: &str, _body: &str) -> OpResult<String> {
        self.record("create_pr", &[&path.to_string_lossy(), title])?;
        let n = self.prs_opened.get() + 1;
        self.prs_opened.set(n);
        Ok(format!("https://github.com/acme/widgets/pull/{n}"))
    }

    fn update_main_branch(&self) -> OpResult<String> {
        self.record("update_main_branch", &[])?;
        Ok("Fetched latest from origin\n".to_string())
    }

    fn update_from_remote(&self, path: &Path, branch: &str) -> OpResult<String> {
        self.record("update_from_remote", &[&path.to_string_lossy(), branch])?;
        Ok(format!("Pulled latest from origin/{branch}\n"))
    }
}

/// Replays fixed output lines, then succeeds or fails.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    lines: Vec<String>,
    failure: Option<OneshotError>,
    prompts: RefCell<Vec<(String, PathBuf)>>,
}

impl ScriptedAgent {
    pub fn with_lines(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|line| line.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Exit non-zero without output.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(OneshotError::exit(message, Some(1))),
            ..Self::default()
        }
    }

    /// Fail as if the binary could not be launched.
    pub fn unspawnable() -> Self {
        Self {
            failure: Some(OneshotError::new(ErrorKind::Spawn, "Failed to start Claude CLI")),
            ..Self::default()
        }
    }

    /// Prompts received, with the directory each run was started in.
    pub fn prompts(&self) -> Vec<(String, PathBuf)> {
        self.prompts.borrow().clone()
    }

    pub fn invoked(&self) -> bool {
        !self.prompts.borrow().is_empty()
    }
}

impl Agent for ScriptedAgent {
    fn run(
        &self,
        prompt: &str,
        workdir: &Path,
        on_log: &mut dyn FnMut(AgentLog),
    ) -> OpResult<AgentResponse> {
        self.prompts
            .borrow_mut()
            .push((prompt.to_string(), workdir.to_path_buf()));

        let mut classifier = StageClassifier::new();
        if let Some(stage) = classifier.prompt_delivered() {
            on_log(AgentLog::Stage(stage));
        }
        for line in &self.lines {
            if let Some(stage) = classifier.observe(line) {
                on_log(AgentLog::Stage(stage));
            }
            on_log(AgentLog::Output(line.clone()));
        }

        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(AgentResponse {
                content: self.lines.join("\n"),
            }),
        }
    }
}
