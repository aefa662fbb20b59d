//! UI state for the terminal interface.

use oneshot::core::types::{ProgressEvent, Stage, Task};

use super::command::{self, CommandDef};

/// What the input line is currently collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Command,
    TaskName,
    TaskPrompt,
    ConfirmPr,
}

impl InputMode {
    pub fn prompt(self) -> &'static str {
        match self {
            InputMode::Command => "> ",
            InputMode::TaskName => "Enter task name: ",
            InputMode::TaskPrompt => "Enter task prompt: ",
            InputMode::ConfirmPr => "(y/n): ",
        }
    }
}

/// Which body is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Main,
    Detail(u32),
}

/// Kind of background job, deciding how progress is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Execution,
    Deletion,
    /// Single-step work (PR creation, updates) shown as a message only.
    Simple,
}

impl JobKind {
    pub fn stages(self) -> &'static [Stage] {
        match self {
            JobKind::Execution => &Stage::EXECUTION,
            JobKind::Deletion => &Stage::DELETION,
            JobKind::Simple => &[],
        }
    }
}

/// Progress of the running background job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub kind: JobKind,
    pub title: String,
    pub stage: Option<Stage>,
    pub last_message: Option<String>,
}

impl JobProgress {
    pub fn new(kind: JobKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            stage: None,
            last_message: None,
        }
    }

    pub fn apply(&mut self, event: ProgressEvent) {
        self.stage = Some(event.stage);
        if let Some(message) = event.message {
            self.last_message = Some(message);
        }
    }

    /// `(stage, done, current)` for every stage of this job kind.
    pub fn checklist(&self) -> Vec<(Stage, bool, bool)> {
        let stages = self.kind.stages();
        let current = self
            .stage
            .and_then(|stage| stages.iter().position(|s| *s == stage));
        stages
            .iter()
            .enumerate()
            .map(|(i, stage)| {
                let done = current.is_some_and(|c| i < c || (*stage == Stage::Completed && i == c));
                let active = current == Some(i) && !done;
                (*stage, done, active)
            })
            .collect()
    }
}

/// Snapshot of everything the renderer needs.
#[derive(Debug, Default)]
pub struct UiState {
    pub input: String,
    pub input_mode: InputMode,
    pub view: View,
    pub output: String,
    pub tasks: Vec<Task>,
    pub pending_task_name: Option<String>,
    pub pending_pr: Option<u32>,
    pub job: Option<JobProgress>,
    pub scroll: u16,
    pub should_quit: bool,
}

impl UiState {
    pub fn in_detail(&self) -> bool {
        matches!(self.view, View::Detail(_))
    }

    pub fn current_number(&self) -> Option<u32> {
        match self.view {
            View::Detail(number) => Some(number),
            View::Main => None,
        }
    }

    pub fn task(&self, number: u32) -> Option<&Task> {
        self.tasks.iter().find(|task| task.number == number)
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current_number().and_then(|number| self.task(number))
    }

    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    pub fn suggestions(&self) -> Vec<CommandDef> {
        if self.input_mode != InputMode::Command {
            return Vec::new();
        }
        command::suggestions(&self.input, self.in_detail())
    }

    pub fn header(&self) -> String {
        match self.current_task() {
            Some(task) => format!("Task #{}: {}", task.number, task.name),
            None => "Oneshot CLI - Type 'help' for commands, 'exit' to quit".to_string(),
        }
    }

    pub fn open_main(&mut self) {
        self.view = View::Main;
        self.scroll = 0;
    }

    pub fn open_detail(&mut self, number: u32) {
        self.view = View::Detail(number);
        self.scroll = 0;
    }
}
