//! Adapter for the external coding agent (`claude`).

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::classifier::StageClassifier;
use crate::core::types::Stage;
use crate::error::{ErrorKind, OneshotError, OpResult};
use crate::io::process::{StreamLine, run_command_with_timeout, stream_command};

pub const DEFAULT_AGENT_BINARY: &str = "claude";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const STDERR_PREFIX: &str = "[stderr] ";

const UNAVAILABLE_MESSAGE: &str = "Claude CLI not found or not authenticated.\n\
Please install and authenticate with Claude CLI:\n  \
1. Install: npm install -g @anthropic-ai/claude-code\n  \
2. Run: claude\n  \
3. Follow the authentication prompts";

/// Something the agent reported while running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentLog {
    /// The inferred stage advanced.
    Stage(Stage),
    /// One line of output (stderr lines carry a `[stderr] ` prefix).
    Output(String),
}

/// Final transcript of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    pub content: String,
}

/// An external coding agent that works inside a directory.
pub trait Agent {
    fn run(
        &self,
        prompt: &str,
        workdir: &Path,
        on_log: &mut dyn FnMut(AgentLog),
    ) -> OpResult<AgentResponse>;
}

/// Runs `claude --print --dangerously-skip-permissions` with the prompt on stdin.
#[derive(Debug, Clone)]
pub struct ClaudeAgent {
    binary: PathBuf,
    api_key: Option<String>,
}

impl Default for ClaudeAgent {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_BINARY)
    }
}

impl ClaudeAgent {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            api_key: None,
        }
    }

    /// Forward `key` to the agent as `ANTHROPIC_API_KEY`.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Probe `claude --version`; any failure is a startup error.
    #[instrument(skip_all)]
    pub fn check_available(&self) -> OpResult<()> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--version");
        let unavailable = || OneshotError::new(ErrorKind::Startup, UNAVAILABLE_MESSAGE);
        let output = match run_command_with_timeout(cmd, PROBE_TIMEOUT) {
            Ok(output) => output,
            Err(err) => {
                debug!(err = %format!("{err:#}"), "agent probe failed to run");
                return Err(unavailable());
            }
        };
        if output.timed_out || !output.status.success() {
            debug!(
                timed_out = output.timed_out,
                code = ?output.status.code(),
                stderr = %output.stderr_lossy().trim(),
                "agent probe failed"
            );
            return Err(unavailable());
        }
        debug!(version = %output.stdout_lossy().trim(), "agent available");
        Ok(())
    }
}

struct RunSink<'a> {
    classifier: StageClassifier,
    transcript: Vec<String>,
    on_log: &'a mut dyn FnMut(AgentLog),
}

impl RunSink<'_> {
    fn stage(&mut self, stage: Option<Stage>) {
        if let Some(stage) = stage {
            (self.on_log)(AgentLog::Stage(stage));
        }
    }

    fn line(&mut self, line: StreamLine) {
        let text = match line {
            StreamLine::Stdout(text) => text,
            StreamLine::Stderr(text) => format!("{STDERR_PREFIX}{text}"),
        };
        let stage = self.classifier.observe(&text);
        self.stage(stage);
        self.transcript.push(text.clone());
        (self.on_log)(AgentLog::Output(text));
    }
}

impl Agent for ClaudeAgent {
    #[instrument(skip_all, fields(workdir = %workdir.display()))]
    fn run(
        &self,
        prompt: &str,
        workdir: &Path,
        on_log: &mut dyn FnMut(AgentLog),
    ) -> OpResult<AgentResponse> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["--print", "--dangerously-skip-permissions"])
            .current_dir(workdir);
        if let Some(key) = &self.api_key {
            cmd.env(API_KEY_ENV, key);
        }

        let sink = RefCell::new(RunSink {
            classifier: StageClassifier::new(),
            transcript: Vec::new(),
            on_log,
        });

        let status = stream_command(
            cmd,
            Some(prompt.as_bytes()),
            || {
                let mut sink = sink.borrow_mut();
                let stage = sink.classifier.prompt_delivered();
                sink.stage(stage);
            },
            |line| sink.borrow_mut().line(line),
        )
        .map_err(|err| OneshotError::spawn(format!("Failed to start Claude CLI: {err:#}")))?;

        let RunSink { transcript, .. } = sink.into_inner();
        let content = transcript.join("\n");

        if status.success() {
            debug!(lines = transcript.len(), "agent finished");
            return Ok(AgentResponse { content });
        }
        if !content.trim().is_empty() {
            warn!(code = ?status.code(), "agent exited non-zero after producing output");
            return Ok(AgentResponse { content });
        }
        let code = status
            .code()
            .map_or_else(|| "signal".to_string(), |code| code.to_string());
        Err(OneshotError::exit(
            format!("Claude execution failed (code {code}) with no output"),
            status.code(),
        ))
    }
}

/// Wrap the user's prompt with the workspace location and handoff rules.
pub fn build_agent_prompt(prompt: &str, worktree_path: &Path) -> String {
    format!(
        "You are working in a git worktree at: {path}\n\n\
Please complete the following task. Make all necessary changes to files in this directory:\n\n\
{prompt}\n\n\
Important:\n\
- Make all changes directly in the worktree\n\
- Ensure all changes are saved\n\
- The changes will be automatically committed and pushed",
        path = worktree_path.display()
    )
}
