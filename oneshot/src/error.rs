//! Tagged error type for adapter and orchestrator failures.
//!
//! Every subprocess failure is normalised into [`OneshotError`] so callers can
//! branch on [`ErrorKind`] instead of matching on message text.

use std::fmt;

use thiserror::Error;

use crate::core::types::TaskStatus;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required external binary is missing or unusable.
    Startup,
    /// A subprocess could not be spawned or its pipes failed.
    Spawn,
    /// A subprocess exited with a non-zero status.
    Exit,
    /// The working tree had nothing to commit.
    NoChanges,
    /// The task store could not be read or written.
    Store,
    /// A referenced task does not exist.
    NotFound,
    /// The task is in a state that does not allow the operation.
    InvalidState,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Startup => "startup",
            ErrorKind::Spawn => "spawn",
            ErrorKind::Exit => "exit",
            ErrorKind::NoChanges => "no_changes",
            ErrorKind::Store => "store",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
        };
        f.write_str(name)
    }
}

/// A failure with a human readable cause.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct OneshotError {
    pub kind: ErrorKind,
    pub message: String,
    pub exit_code: Option<i32>,
}

impl OneshotError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            exit_code: None,
        }
    }

    pub fn exit(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            kind: ErrorKind::Exit,
            message: message.into(),
            exit_code,
        }
    }

    pub fn spawn(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Spawn, message)
    }

    pub fn not_found(number: u32) -> Self {
        Self::new(ErrorKind::NotFound, format!("task #{number} not found"))
    }

    /// Wrap a store failure, keeping the full context chain in the message.
    pub fn store(err: anyhow::Error) -> Self {
        Self::new(ErrorKind::Store, format!("{err:#}"))
    }

    /// Prefix the message, keeping kind and exit code.
    pub fn context(mut self, prefix: &str) -> Self {
        self.message = format!("{prefix}: {}", self.message);
        self
    }
}

pub type OpResult<T> = std::result::Result<T, OneshotError>;

/// Failure of a task-level orchestrator operation.
///
/// Displays exactly the message recorded on the task, so the presentation
/// layer can show the same text as the persisted record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
    /// Failed before any task record could be written.
    #[error("{0}")]
    Store(OneshotError),
    /// Failed after the task existed; the record carries `status` and the error.
    #[error("{error}")]
    Task {
        number: u32,
        status: TaskStatus,
        error: OneshotError,
    },
}

impl RunError {
    pub fn error(&self) -> &OneshotError {
        match self {
            RunError::Store(error) => error,
            RunError::Task { error, .. } => error,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error().kind
    }

    /// Status recorded on the task, if one exists.
    pub fn status(&self) -> Option<TaskStatus> {
        match self {
            RunError::Store(_) => None,
            RunError::Task { status, .. } => Some(*status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_kind_and_code() {
        let err = OneshotError::exit("boom", Some(2)).context("git push failed");
        assert_eq!(err.kind, ErrorKind::Exit);
        assert_eq!(err.exit_code, Some(2));
        assert_eq!(err.to_string(), "git push failed: boom");
    }

    #[test]
    fn run_error_displays_recorded_message() {
        let err = RunError::Task {
            number: 4,
            status: TaskStatus::NeedsAction,
            error: OneshotError::new(ErrorKind::NoChanges, "no changes to commit"),
        };
        assert_eq!(err.to_string(), "no changes to commit");
        assert_eq!(err.status(), Some(TaskStatus::NeedsAction));
    }

    #[test]
    fn store_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("write tasks.json");
        let err = OneshotError::store(inner);
        assert_eq!(err.message, "write tasks.json: disk full");
    }
}
