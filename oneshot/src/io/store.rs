//! Task store persisted as a single JSON document.
//!
//! Every operation reads the document from disk and every mutation writes it
//! back atomically, so a store handle is cheap to clone and always observes the
//! latest state written by any other handle in the process.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::types::{Task, TaskPatch, TaskStatus};

const ID_LEN: usize = 8;

/// On-disk layout of the task store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    /// Tasks in creation order.
    pub tasks: Vec<Task>,
    /// Next task number to hand out (1-indexed, never decreases).
    pub next_task_number: u32,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_task_number: 1,
        }
    }
}

/// Handle to the task store file.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_all(&self) -> Result<Vec<Task>> {
        Ok(self.load()?.tasks)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.load()?.tasks.into_iter().find(|task| task.id == id))
    }

    pub fn get_by_number(&self, number: u32) -> Result<Option<Task>> {
        Ok(self
            .load()?
            .tasks
            .into_iter()
            .find(|task| task.number == number))
    }

    /// Create a `pending` task with a fresh id and the next task number.
    ///
    /// The workspace path is `worktrees_dir/<id>`.
    #[instrument(skip_all, fields(name))]
    pub fn insert(
        &self,
        name: &str,
        prompt: &str,
        branch_name: &str,
        worktrees_dir: &Path,
    ) -> Result<Task> {
        let mut doc = self.load()?;
        let id = generate_unique_id(&doc.tasks);
        let now = Utc::now();
        let task = Task {
            worktree_path: worktrees_dir.join(&id),
            id,
            number: doc.next_task_number,
            name: name.to_string(),
            prompt: prompt.to_string(),
            status: TaskStatus::Pending,
            branch_name: branch_name.to_string(),
            pr_url: None,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        };
        doc.tasks.push(task.clone());
        doc.next_task_number += 1;
        self.write(&doc)?;
        debug!(id = %task.id, number = task.number, "task inserted");
        Ok(task)
    }

    /// Merge `patch` into the task with `id` and refresh `updated_at`.
    ///
    /// Returns `None` if no such task exists.
    pub fn update(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>> {
        let mut doc = self.load()?;
        let Some(task) = doc.tasks.iter_mut().find(|task| task.id == id) else {
            return Ok(None);
        };
        patch.apply(task);
        task.updated_at = Utc::now();
        let updated = task.clone();
        self.write(&doc)?;
        Ok(Some(updated))
    }

    /// Delete the task with `id`. Returns false if it did not exist.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut doc = self.load()?;
        let before = doc.tasks.len();
        doc.tasks.retain(|task| task.id != id);
        if doc.tasks.len() == before {
            return Ok(false);
        }
        self.write(&doc)?;
        debug!(id, "task removed");
        Ok(true)
    }

    /// Load the document; a missing file is an empty store.
    pub fn load(&self) -> Result<StoreDocument> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read task store {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse task store {}", self.path.display()))
    }

    /// Atomically write the document (temp file + rename).
    fn write(&self, doc: &StoreDocument) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(doc).context("serialize task store")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

fn generate_unique_id(existing: &[Task]) -> String {
    loop {
        let id = generate_id();
        if existing.iter().all(|task| task.id != id) {
            return id;
        }
    }
}

fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(ID_LEN)
        .collect::<String>()
        .to_lowercase()
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("task store path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp task store {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace task store {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(temp: &tempfile::TempDir) -> TaskStore {
        TaskStore::new(temp.path().join("config").join("tasks.json"))
    }

    #[test]
    fn missing_file_is_empty_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(&temp);
        assert!(store.get_all().expect("get all").is_empty());
        assert_eq!(store.load().expect("load").next_task_number, 1);
    }

    #[test]
    fn insert_then_get_returns_equal_record() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(&temp);
        let task = store
            .insert("Fix login", "fix it", "me/fix-login", Path::new("/wt"))
            .expect("insert");

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.worktree_path, Path::new("/wt").join(&task.id));
        assert_eq!(task.id.len(), ID_LEN);
        assert_eq!(store.get_by_id(&task.id).expect("by id"), Some(task.clone()));
        assert_eq!(store.get_by_number(1).expect("by number"), Some(task));
    }

    #[test]
    fn numbers_increase_across_deletions() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(&temp);
        let first = store.insert("a", "a", "p/a", Path::new("/wt")).expect("a");
        let second = store.insert("b", "b", "p/b", Path::new("/wt")).expect("b");
        assert!(store.remove(&second.id).expect("remove"));
        let third = store.insert("c", "c", "p/c", Path::new("/wt")).expect("c");

        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(third.number, 3);
    }

    #[test]
    fn update_changes_only_patched_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(&temp);
        let task = store
            .insert("name", "prompt", "p/name", Path::new("/wt"))
            .expect("insert");

        let updated = store
            .update(
                &task.id,
                TaskPatch::status(TaskStatus::Completed).with_pr_url("https://example.com/pr/1"),
            )
            .expect("update")
            .expect("task exists");

        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.pr_url.as_deref(), Some("https://example.com/pr/1"));
        assert!(updated.updated_at >= task.updated_at);
        let expected = Task {
            status: TaskStatus::Completed,
            pr_url: Some("https://example.com/pr/1".to_string()),
            updated_at: updated.updated_at,
            ..task
        };
        assert_eq!(updated, expected);
    }

    #[test]
    fn update_and_remove_unknown_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(&temp);
        assert_eq!(
            store
                .update("nope", TaskPatch::status(TaskStatus::Failed))
                .expect("update"),
            None
        );
        assert!(!store.remove("nope").expect("remove"));
    }

    #[test]
    fn document_uses_camel_case_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(&temp);
        store
            .insert("name", "prompt", "p/name", Path::new("/wt"))
            .expect("insert");
        let raw = fs::read_to_string(store.path()).expect("read");
        assert!(raw.contains("\"nextTaskNumber\": 2"));
        assert!(raw.contains("\"branchName\": \"p/name\""));
        assert!(raw.contains("\"status\": \"pending\""));
        assert!(!raw.contains("prUrl"));
    }
}
