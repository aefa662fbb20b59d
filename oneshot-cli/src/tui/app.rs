//! Application state and main event loop.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::DefaultTerminal;
use tracing::{debug, warn};

use oneshot::io::config::load_settings;
use oneshot::io::paths::AppPaths;

use super::command::{self, CdTarget, Command, ConfigCommand};
use super::event::{Job, UiEvent, run_job};
use super::render;
use super::state::{InputMode, JobProgress, UiState};
use crate::commands::{self, AppOrchestrator};

/// Main application with UI state and the job channel.
pub struct App {
    state: UiState,
    paths: AppPaths,
    orch: AppOrchestrator,
    tx: Sender<UiEvent>,
    rx: Receiver<UiEvent>,
}

impl App {
    pub fn new(paths: AppPaths, orch: AppOrchestrator) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state: UiState::default(),
            paths,
            orch,
            tx,
            rx,
        }
    }

    /// Run the main event loop until the user quits.
    pub fn run(&mut self, mut terminal: DefaultTerminal) -> io::Result<()> {
        self.refresh_tasks();
        loop {
            terminal.draw(|frame| render::render(frame, &self.state))?;

            if event::poll(Duration::from_millis(50))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key);
            }

            while let Ok(event) = self.rx.try_recv() {
                self.apply_event(event);
            }

            if self.state.should_quit {
                break;
            }
        }
        Ok(())
    }

    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Progress(progress) => {
                if let Some(job) = self.state.job.as_mut() {
                    job.apply(progress);
                }
                self.refresh_tasks();
            }
            UiEvent::Finished(outcome) => {
                self.state.job = None;
                self.state.output = outcome.output;
                if let Some(current) = self.state.current_number()
                    && outcome.deleted.contains(&current)
                {
                    self.state.open_main();
                }
                self.refresh_tasks();
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.state.should_quit = true;
            return;
        }
        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Esc => self.cancel(),
            KeyCode::Backspace => {
                self.state.input.pop();
            }
            KeyCode::Tab => {
                if let Some(first) = self.state.suggestions().first() {
                    self.state.input = format!("/{} ", first.name);
                }
            }
            KeyCode::PageUp | KeyCode::Up => {
                self.state.scroll = self.state.scroll.saturating_sub(1);
            }
            KeyCode::PageDown | KeyCode::Down => {
                self.state.scroll = self.state.scroll.saturating_add(1);
            }
            KeyCode::Char(c) => self.state.input.push(c),
            _ => {}
        }
    }

    fn cancel(&mut self) {
        if self.state.input_mode != InputMode::Command {
            self.state.input_mode = InputMode::Command;
            self.state.pending_task_name = None;
            self.state.pending_pr = None;
            self.state.input.clear();
            self.state.output = "Cancelled".to_string();
        } else if self.state.in_detail() {
            self.state.open_main();
        }
    }

    fn submit(&mut self) {
        let value = std::mem::take(&mut self.state.input).trim().to_string();
        if value.is_empty() {
            return;
        }

        match self.state.input_mode {
            InputMode::TaskName => {
                self.state.pending_task_name = Some(value);
                self.state.input_mode = InputMode::TaskPrompt;
                self.state.output.clear();
            }
            InputMode::TaskPrompt => {
                self.state.input_mode = InputMode::Command;
                let name = self.state.pending_task_name.take().unwrap_or_default();
                self.spawn(Job::Execute {
                    name,
                    prompt: value,
                });
            }
            InputMode::ConfirmPr => {
                self.state.input_mode = InputMode::Command;
                let number = self.state.pending_pr.take();
                match number {
                    Some(number) if matches!(value.to_lowercase().as_str(), "y" | "yes") => {
                        self.spawn(Job::OpenPr(number));
                    }
                    _ => self.state.output = "PR creation cancelled".to_string(),
                }
            }
            InputMode::Command => match command::parse(&value) {
                Ok(cmd) => self.execute(cmd),
                Err(message) => self.state.output = message,
            },
        }
    }

    fn execute(&mut self, cmd: Command) {
        debug!(?cmd, "command");
        match cmd {
            Command::Exit => self.state.should_quit = true,
            Command::Task => {
                if self.reject_if_busy() {
                    return;
                }
                self.state.input_mode = InputMode::TaskName;
                self.state.output.clear();
            }
            Command::Cd(CdTarget::Up) => {
                self.state.open_main();
                self.state.output = "Returned to main view".to_string();
            }
            Command::Cd(CdTarget::Task(number)) => {
                self.refresh_tasks();
                if self.state.task(number).is_some() {
                    self.state.open_detail(number);
                    self.state.output.clear();
                } else {
                    self.state.output = format!("Task #{number} not found");
                }
            }
            Command::Link(number) => self.link(number.or(self.state.current_number())),
            Command::Update => match self.state.current_number() {
                Some(number) => self.spawn(Job::UpdateTask(number)),
                None => self.spawn(Job::UpdateMain),
            },
            Command::Delete(numbers) => {
                let numbers = if numbers.is_empty() {
                    self.state.current_number().into_iter().collect()
                } else {
                    numbers
                };
                if numbers.is_empty() {
                    self.state.output = command::delete_usage();
                } else {
                    self.spawn(Job::Delete(numbers));
                }
            }
            Command::Tasks => {
                self.refresh_tasks();
                self.state.output = "Task list refreshed".to_string();
            }
            Command::Config(config) => self.config(config),
            Command::Clear => self.state.output.clear(),
            Command::Help => self.state.output = command::help_text(self.state.in_detail()),
        }
    }

    fn link(&mut self, number: Option<u32>) {
        let Some(number) = number else {
            self.state.output = command::link_usage();
            return;
        };
        self.refresh_tasks();
        let pr_url = match self.state.task(number) {
            Some(task) => task.pr_url.clone(),
            None => {
                self.state.output = format!("Task #{number} not found");
                return;
            }
        };
        match pr_url {
            Some(url) => self.state.output = format!("PR Link for Task #{number}:\n{url}"),
            None => {
                if self.reject_if_busy() {
                    return;
                }
                self.state.output =
                    "No PR created yet, would you like to create one? (y/n)".to_string();
                self.state.input_mode = InputMode::ConfirmPr;
                self.state.pending_pr = Some(number);
            }
        }
    }

    fn config(&mut self, config: ConfigCommand) {
        let result = match &config {
            ConfigCommand::Show => commands::config_summary(&self.paths)
                .map(|summary| format!("{summary}\nRun `oneshot config` for guided setup.")),
            ConfigCommand::Set { key, value } => commands::config_set(&self.paths, key, value),
            ConfigCommand::Get { key } => commands::config_get(&self.paths, key),
            ConfigCommand::Clear { key } => commands::config_clear(&self.paths, key),
        };
        self.state.output = match result {
            Ok(line) => line,
            Err(err) => format!("Error: {err:#}"),
        };
        if matches!(config, ConfigCommand::Set { .. } | ConfigCommand::Clear { .. }) {
            self.reload_settings();
        }
    }

    /// Rebuild the orchestrator so new settings apply to the next job.
    fn reload_settings(&mut self) {
        let rebuilt = load_settings(&self.paths.settings_path)
            .and_then(|settings| commands::build_orchestrator(&self.paths, &settings));
        match rebuilt {
            Ok(orch) => self.orch = orch,
            Err(err) => warn!(err = %format!("{err:#}"), "could not apply new settings"),
        }
    }

    fn reject_if_busy(&mut self) -> bool {
        if self.state.is_busy() {
            self.state.output = "A job is already running; wait for it to finish".to_string();
            return true;
        }
        false
    }

    fn spawn(&mut self, job: Job) {
        if self.reject_if_busy() {
            return;
        }
        self.state.job = Some(JobProgress::new(job.kind(), job.title()));
        self.state.output.clear();

        let orch = self.orch.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let progress_tx = tx.clone();
            let outcome = run_job(&orch, job, |event| {
                let _ = progress_tx.send(UiEvent::Progress(event));
            });
            let _ = tx.send(UiEvent::Finished(outcome));
        });
    }

    fn refresh_tasks(&mut self) {
        match self.orch.store().get_all() {
            Ok(tasks) => self.state.tasks = tasks,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "failed to load tasks");
                self.state.output = format!("Error: {err:#}");
            }
        }
    }
}
