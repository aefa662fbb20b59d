//! Version-control adapter over the `git` and `gh` command-line tools.
//!
//! The orchestrator only talks to the [`Vcs`] trait; [`Git`] is the production
//! implementation that shells out. Every failure comes back as a tagged
//! [`OneshotError`].

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::{debug, info, instrument, warn};

use crate::core::pr_url::extract_pr_url;
use crate::error::{ErrorKind, OneshotError, OpResult};

const DEFAULT_REMOTE: &str = "origin";

/// Repository facts needed to branch off the default branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// `main` or `master`.
    pub main_branch: String,
    /// Absolute repository root.
    pub repo_root: PathBuf,
    /// Remote used for fetch/push (first configured remote, else `origin`).
    pub remote: String,
}

/// Operations the orchestrator needs from version control and PR hosting.
pub trait Vcs {
    /// Base directory holding one worktree per task id.
    fn worktrees_dir(&self) -> &Path;

    /// Create `<worktrees_dir>/<task_id>` on a new branch off the remote default branch.
    fn create_worktree(&self, branch: &str, task_id: &str) -> OpResult<PathBuf>;

    /// Force-remove a worktree. Callers treat failure as a warning.
    fn remove_worktree(&self, path: &Path) -> OpResult<()>;

    /// Stage everything, commit with `message` and push `branch` with upstream tracking.
    ///
    /// Fails with [`ErrorKind::NoChanges`] when the working tree is clean.
    fn commit_and_push(&self, path: &Path, branch: &str, message: &str) -> OpResult<()>;

    /// Push `branch` with upstream tracking without committing.
    fn push_branch(&self, path: &Path, branch: &str) -> OpResult<()>;

    /// Delete the local and remote branch. Callers treat failure as a warning.
    fn delete_branch(&self, branch: &str) -> OpResult<()>;

    /// Open a pull request from the workspace and return its URL.
    fn create_pr(&self, path: &Path, title: &str, body: &str) -> OpResult<String>;

    /// Bring the local default branch up to date with the remote.
    fn update_main_branch(&self) -> OpResult<String>;

    /// Rebase a task workspace onto the remote default branch and its own remote branch.
    fn update_from_remote(&self, path: &Path, branch: &str) -> OpResult<String>;
}

/// `git`/`gh` subprocess adapter rooted at a working directory inside the repository.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    worktrees_dir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>, worktrees_dir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            worktrees_dir: worktrees_dir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Determine the repository root, remote and default branch.
    #[instrument(skip_all)]
    pub fn resolve_repo_info(&self) -> OpResult<RepoInfo> {
        let repo_root = self
            .capture(&self.workdir, &["rev-parse", "--show-toplevel"])
            .map_err(|err| OneshotError::new(err.kind, "Not in a git repository"))?;
        let repo_root = PathBuf::from(repo_root.trim());

        let remote = self
            .capture(&self.workdir, &["remote"])
            .ok()
            .and_then(|out| out.lines().next().map(|line| line.trim().to_string()))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_REMOTE.to_string());

        let main_branch = match self.capture(&self.workdir, &["branch", "-r"]) {
            Ok(branches) => default_branch_from_listing(&branches, &remote),
            Err(err) => {
                debug!(err = %err, "remote branch listing failed, assuming main");
                "main".to_string()
            }
        };

        debug!(root = %repo_root.display(), %remote, %main_branch, "resolved repo info");
        Ok(RepoInfo {
            main_branch,
            repo_root,
            remote,
        })
    }

    /// Return the current branch name (empty on detached HEAD).
    pub fn current_branch(&self, dir: &Path) -> OpResult<String> {
        let out = self.capture(dir, &["branch", "--show-current"])?;
        Ok(out.trim().to_string())
    }

    /// Paths with uncommitted changes (untracked files included).
    pub fn changed_paths(&self, dir: &Path) -> OpResult<Vec<String>> {
        let out = self.capture(dir, &["status", "--porcelain", "-uall"])?;
        Ok(out.lines().filter_map(porcelain_path).collect())
    }

    fn capture(&self, dir: &Path, args: &[&str]) -> OpResult<String> {
        let output = self.run_checked(dir, args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, dir: &Path, args: &[&str]) -> OpResult<Output> {
        run_checked("git", dir, args)
    }
}

impl Vcs for Git {
    fn worktrees_dir(&self) -> &Path {
        &self.worktrees_dir
    }

    #[instrument(skip_all, fields(branch, task_id))]
    fn create_worktree(&self, branch: &str, task_id: &str) -> OpResult<PathBuf> {
        let info = self.resolve_repo_info()?;
        fs::create_dir_all(&self.worktrees_dir).map_err(|err| {
            OneshotError::spawn(format!(
                "create worktrees dir {}: {err}",
                self.worktrees_dir.display()
            ))
        })?;

        let path = self.worktrees_dir.join(task_id);

        // A stale local ref is tolerated; the worktree is still created from it.
        if let Err(err) = self.run_checked(&self.workdir, &["fetch", &info.remote, &info.main_branch])
        {
            warn!(err = %err, "could not fetch from {}", info.remote);
        }

        let path_arg = path.to_string_lossy();
        let base = format!("{}/{}", info.remote, info.main_branch);
        self.run_checked(
            &self.workdir,
            &["worktree", "add", &path_arg, "-b", branch, &base],
        )
        .map_err(|err| err.context("Failed to create worktree"))?;

        info!(path = %path.display(), %base, "worktree created");
        Ok(path)
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn remove_worktree(&self, path: &Path) -> OpResult<()> {
        let path_arg = path.to_string_lossy();
        self.run_checked(
            &self.workdir,
            &["worktree", "remove", &path_arg, "--force"],
        )
        .map_err(|err| err.context("Could not remove worktree"))?;
        debug!("worktree removed");
        Ok(())
    }

    #[instrument(skip_all, fields(branch))]
    fn commit_and_push(&self, path: &Path, branch: &str, message: &str) -> OpResult<()> {
        let prefix = "Failed to commit and push";
        let info = self.resolve_repo_info()?;
        self.run_checked(path, &["add", "-A"])
            .map_err(|err| err.context(prefix))?;

        let changes = self
            .changed_paths(path)
            .map_err(|err| err.context(prefix))?;
        if changes.is_empty() {
            return Err(OneshotError::new(
                ErrorKind::NoChanges,
                format!("{prefix}: no changes to commit"),
            ));
        }
        debug!(count = changes.len(), files = %changes.join(", "), "committing changes");

        self.run_checked(path, &["commit", "-m", message])
            .map_err(|err| err.context(prefix))?;
        self.run_checked(path, &["push", "-u", &info.remote, branch])
            .map_err(|err| err.context(prefix))?;
        info!("changes committed and pushed");
        Ok(())
    }

    #[instrument(skip_all, fields(branch))]
    fn push_branch(&self, path: &Path, branch: &str) -> OpResult<()> {
        let info = self.resolve_repo_info()?;
        self.run_checked(path, &["push", "-u", &info.remote, branch])
            .map_err(|err| err.context("Failed to push"))?;
        Ok(())
    }

    #[instrument(skip_all, fields(branch))]
    fn delete_branch(&self, branch: &str) -> OpResult<()> {
        let info = self.resolve_repo_info()?;
        let mut failures = Vec::new();
        if let Err(err) = self.run_checked(&self.workdir, &["branch", "-D", branch]) {
            failures.push(format!("local: {err}"));
        }
        if let Err(err) = self.run_checked(&self.workdir, &["push", &info.remote, "--delete", branch])
        {
            failures.push(format!("remote: {err}"));
        }
        if failures.is_empty() {
            debug!("branch deleted locally and on remote");
            return Ok(());
        }
        Err(OneshotError::new(
            ErrorKind::Exit,
            format!("Could not delete branch {branch} ({})", failures.join("; ")),
        ))
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn create_pr(&self, path: &Path, title: &str, body: &str) -> OpResult<String> {
        let output = run_checked("gh", path, &["pr", "create", "--title", title, "--body", body])
            .map_err(|err| err.context("Failed to create PR"))?;
        let url = extract_pr_url(&String::from_utf8_lossy(&output.stdout));
        info!(%url, "pull request created");
        Ok(url)
    }

    #[instrument(skip_all)]
    fn update_main_branch(&self) -> OpResult<String> {
        let prefix = "Failed to update main branch";
        let info = self.resolve_repo_info()?;
        let main = info.main_branch.as_str();
        let current = self
            .current_branch(&self.workdir)
            .map_err(|err| err.context(prefix))?;
        let mut log = String::new();

        self.run_checked(&self.workdir, &["fetch", &info.remote])
            .map_err(|err| err.context(prefix))?;
        log.push_str(&format!("Fetched latest from {}\n", info.remote));

        let switched = current != main;
        if switched {
            self.run_checked(&self.workdir, &["checkout", main])
                .map_err(|err| err.context(prefix))?;
            log.push_str(&format!("Switched to {main}\n"));
        }

        match self.run_checked(&self.workdir, &["pull", &info.remote, main, "--rebase"]) {
            Ok(_) => log.push_str(&format!("Pulled and rebased from {}/{main}\n", info.remote)),
            Err(err) => {
                debug!(err = %err, "pull --rebase made no changes");
                log.push_str(&format!("Already up to date with {}/{main}\n", info.remote));
            }
        }

        if switched && !current.is_empty() {
            self.run_checked(&self.workdir, &["checkout", &current])
                .map_err(|err| err.context(prefix))?;
            log.push_str(&format!("Switched back to {current}\n"));
        }

        Ok(log)
    }

    #[instrument(skip_all, fields(path = %path.display(), branch))]
    fn update_from_remote(&self, path: &Path, branch: &str) -> OpResult<String> {
        let prefix = "Failed to update from remote";
        let info = self.resolve_repo_info()?;
        let main = info.main_branch.as_str();
        let mut log = String::new();

        self.run_checked(path, &["fetch", &info.remote])
            .map_err(|err| err.context(prefix))?;
        log.push_str(&format!("Fetched latest from {}\n", info.remote));

        match self.run_checked(path, &["pull", &info.remote, main, "--rebase"]) {
            Ok(_) => log.push_str(&format!("Pulled and rebased from {}/{main}\n", info.remote)),
            Err(err) => {
                debug!(err = %err, "no changes from default branch");
                log.push_str(&format!("No changes from {}/{main}\n", info.remote));
            }
        }

        match self.run_checked(path, &["pull", &info.remote, branch, "--rebase"]) {
            Ok(_) => log.push_str(&format!("Pulled latest from {}/{branch}\n", info.remote)),
            Err(err) => {
                debug!(err = %err, "no changes from task branch");
                log.push_str(&format!("No changes from {}/{branch}\n", info.remote));
            }
        }

        Ok(log)
    }
}

/// Pick `main` or `master` from `git branch -r` output, defaulting to `main`.
pub fn default_branch_from_listing(listing: &str, remote: &str) -> String {
    let has = |name: &str| {
        let wanted = format!("{remote}/{name}");
        listing
            .lines()
            .map(|line| line.trim())
            .any(|line| line == wanted || line.starts_with(&format!("{wanted} ")))
    };
    if has("main") {
        "main".to_string()
    } else if has("master") {
        "master".to_string()
    } else {
        "main".to_string()
    }
}

fn run_checked(program: &str, dir: &Path, args: &[&str]) -> OpResult<Output> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|err| OneshotError::spawn(format!("spawn {program} {}: {err}", args.join(" "))))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OneshotError::exit(
            format!("{program} {} failed: {}", args.join(" "), stderr.trim()),
            output.status.code(),
        ));
    }
    Ok(output)
}

/// Path named by one `git status --porcelain` line; renames give the new path.
fn porcelain_path(line: &str) -> Option<String> {
    let path = line.get(3..)?.trim();
    let path = path.rsplit_once(" -> ").map_or(path, |(_, renamed)| renamed);
    (!path.is_empty()).then(|| path.trim_matches('"').to_string())
}
