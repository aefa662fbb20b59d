//! `oneshot`: delegate coding tasks to Claude, one git worktree per task.
//!
//! With no subcommand an interactive terminal UI is started; the subcommands
//! are non-interactive equivalents for scripts.

mod commands;
mod tui;

use anyhow::Result;
use clap::{Parser, Subcommand};

use oneshot::exit_codes;
use oneshot::io::paths::AppPaths;

#[derive(Parser)]
#[command(
    name = "oneshot",
    version,
    about = "Delegate coding tasks to Claude in isolated git worktrees"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a task and run it to a pull request.
    Task {
        /// Short task name; also used for the branch name.
        name: String,
        /// Instructions for the agent (defaults to the name).
        #[arg(short, long)]
        prompt: Option<String>,
    },
    /// List all tasks.
    Tasks,
    /// Configure oneshot (interactive without a subcommand).
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a value (`apiKey`, `branchPrefix`).
    Set { key: String, value: String },
    /// Print a value; the API key is masked.
    Get { key: String },
    /// Remove a value.
    Clear { key: String },
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let paths = AppPaths::resolve()?;
    let Some(command) = cli.command else {
        return tui::run(&paths);
    };

    oneshot::logging::init_stderr();
    match command {
        Command::Task { name, prompt } => commands::cmd_task(&paths, &name, prompt.as_deref()),
        Command::Tasks => commands::cmd_tasks(&paths).map(|()| exit_codes::OK),
        Command::Config { action: None } => {
            commands::cmd_config_interactive(&paths).map(|()| exit_codes::OK)
        }
        Command::Config {
            action: Some(action),
        } => {
            let line = match action {
                ConfigAction::Set { key, value } => commands::config_set(&paths, &key, &value),
                ConfigAction::Get { key } => commands::config_get(&paths, &key),
                ConfigAction::Clear { key } => commands::config_clear(&paths, &key),
            }?;
            println!("{line}");
            Ok(exit_codes::OK)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_args_starts_tui() {
        let cli = Cli::parse_from(["oneshot"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn parse_task_with_prompt() {
        let cli = Cli::parse_from(["oneshot", "task", "Fix login", "--prompt", "fix it"]);
        let Some(Command::Task { name, prompt }) = cli.command else {
            panic!("expected task command");
        };
        assert_eq!(name, "Fix login");
        assert_eq!(prompt.as_deref(), Some("fix it"));
    }

    #[test]
    fn parse_config_set() {
        let cli = Cli::parse_from(["oneshot", "config", "set", "branchPrefix", "marco"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                action: Some(ConfigAction::Set { .. })
            })
        ));
    }

    #[test]
    fn parse_bare_config_is_interactive() {
        let cli = Cli::parse_from(["oneshot", "config"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { action: None })
        ));
    }
}
