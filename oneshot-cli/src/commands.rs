//! Non-interactive subcommands and helpers shared with the terminal UI.

use std::fs;
use std::io::{self, BufRead, Write};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use oneshot::core::types::{ProgressEvent, Stage, Task, TaskStatus};
use oneshot::exit_codes;
use oneshot::io::agent::ClaudeAgent;
use oneshot::io::config::{SettingKey, Settings, load_settings, write_settings};
use oneshot::io::git::Git;
use oneshot::io::paths::AppPaths;
use oneshot::io::store::TaskStore;
use oneshot::orchestrator::Orchestrator;

pub type AppOrchestrator = Orchestrator<Git, ClaudeAgent>;

static ZSHRC_API_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"export\s+ANTHROPIC_API_KEY=["']?([^"'\s]+)["']?"#)
        .expect("valid zshrc regex")
});

/// Wire the production adapters for the repository in the current directory.
pub fn build_orchestrator(paths: &AppPaths, settings: &Settings) -> Result<AppOrchestrator> {
    let workdir = std::env::current_dir().context("resolve current directory")?;
    let git = Git::new(workdir, &paths.worktrees_dir);
    let agent = ClaudeAgent::default().with_api_key(settings.api_key.clone());
    Ok(
        Orchestrator::new(TaskStore::new(&paths.tasks_path), git, agent)
            .with_branch_prefix(settings.branch_prefix.clone()),
    )
}

/// `oneshot task`: run one task, printing progress line by line.
pub fn cmd_task(paths: &AppPaths, name: &str, prompt: Option<&str>) -> Result<i32> {
    let settings = load_settings(&paths.settings_path)?;
    let orch = build_orchestrator(paths, &settings)?;
    if let Err(err) = orch.agent().check_available() {
        eprintln!("{err}");
        return Ok(exit_codes::AGENT_UNAVAILABLE);
    }

    let prompt = prompt.unwrap_or(name);
    println!("Creating task: {name}");
    let mut last_stage = None;
    let result = orch.create_and_execute_task(name, prompt, |event| {
        print_progress(&mut last_stage, &event);
    });

    match result {
        Ok(task) => {
            println!("✓ Task #{} completed", task.number);
            if let Some(url) = &task.pr_url {
                println!("  PR: {url}");
            }
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("✗ {err}");
            if let Some(status) = err.status() {
                eprintln!("  Task is now {status}");
            }
            Ok(exit_codes::for_run_error(&err))
        }
    }
}

fn print_progress(last_stage: &mut Option<Stage>, event: &ProgressEvent) {
    if *last_stage != Some(event.stage) {
        *last_stage = Some(event.stage);
        println!("→ {}", event.stage.label());
    }
    if let Some(message) = &event.message {
        println!("  {message}");
    }
}

/// `oneshot tasks`
pub fn cmd_tasks(paths: &AppPaths) -> Result<()> {
    let tasks = TaskStore::new(&paths.tasks_path).get_all()?;
    if tasks.is_empty() {
        println!("No tasks yet. Create one with: oneshot task <name>");
        return Ok(());
    }
    for task in &tasks {
        println!("{}", format_task_line(task));
    }
    Ok(())
}

pub fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "○",
        TaskStatus::InProgress => "◐",
        TaskStatus::NeedsAction => "⚠",
        TaskStatus::Completed => "✓",
        TaskStatus::Failed => "✗",
    }
}

/// One-line summary used by the task list.
pub fn format_task_line(task: &Task) -> String {
    let mut line = format!(
        "#{:<3} {} {:<12} {} ({})",
        task.number,
        status_icon(task.status),
        task.status.as_str(),
        task.name,
        task.branch_name
    );
    if let Some(url) = &task.pr_url {
        line.push_str(&format!(" {url}"));
    }
    line
}

/// `config set <key> <value>`; returns the confirmation line.
pub fn config_set(paths: &AppPaths, key: &str, value: &str) -> Result<String> {
    let key: SettingKey = key.parse()?;
    let mut settings = load_settings(&paths.settings_path)?;
    settings.set(key, value);
    write_settings(&paths.settings_path, &settings)?;
    Ok(match key {
        SettingKey::ApiKey => "✓ API key saved successfully".to_string(),
        SettingKey::BranchPrefix => "✓ Branch prefix saved successfully".to_string(),
    })
}

/// `config get <key>`; the API key is masked.
pub fn config_get(paths: &AppPaths, key: &str) -> Result<String> {
    let key: SettingKey = key.parse()?;
    let settings = load_settings(&paths.settings_path)?;
    Ok(format!("{key}: {}", settings.display_value(key)))
}

/// `config clear <key>`
pub fn config_clear(paths: &AppPaths, key: &str) -> Result<String> {
    let key: SettingKey = key.parse()?;
    let mut settings = load_settings(&paths.settings_path)?;
    settings.clear(key);
    write_settings(&paths.settings_path, &settings)?;
    Ok(match key {
        SettingKey::ApiKey => "✓ API key cleared".to_string(),
        SettingKey::BranchPrefix => "✓ Branch prefix cleared".to_string(),
    })
}

/// Current settings, one `key: value` line each.
pub fn config_summary(paths: &AppPaths) -> Result<String> {
    let settings = load_settings(&paths.settings_path)?;
    Ok([SettingKey::ApiKey, SettingKey::BranchPrefix]
        .iter()
        .map(|key| format!("{key}: {}", settings.display_value(*key)))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Extract the key from an `export ANTHROPIC_API_KEY=...` line.
pub fn parse_zshrc_api_key(contents: &str) -> Option<String> {
    ZSHRC_API_KEY
        .captures(contents)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn read_api_key_from_zshrc() -> Option<String> {
    let path = dirs::home_dir()?.join(".zshrc");
    match fs::read_to_string(&path) {
        Ok(contents) => parse_zshrc_api_key(&contents),
        Err(err) => {
            debug!(err = %err, path = %path.display(), "could not read .zshrc");
            None
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "y" | "yes")
}

fn ask(input: &mut impl BufRead, question: &str) -> Result<String> {
    print!("{question}");
    io::stdout().flush().context("flush stdout")?;
    let mut line = String::new();
    input.read_line(&mut line).context("read answer")?;
    Ok(line.trim().to_string())
}

/// `oneshot config`: walk through the settings on the terminal.
pub fn cmd_config_interactive(paths: &AppPaths) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut settings = load_settings(&paths.settings_path)?;

    println!("Welcome to oneshot configuration!\n");
    println!("Note: oneshot uses the Claude CLI for authentication.");
    println!("Make sure you have run \"claude\" and authenticated via the web.\n");

    let setup = ask(
        &mut input,
        "Would you like to set up an API key anyway? (y/n, usually not needed): ",
    )?;
    if is_yes(&setup) {
        let from_zshrc = ask(&mut input, "Read API key from .zshrc? (y/n): ")?;
        let found = if is_yes(&from_zshrc) {
            let key = read_api_key_from_zshrc();
            if key.is_none() {
                println!("✗ No ANTHROPIC_API_KEY found in .zshrc");
            }
            key
        } else {
            None
        };
        let key = match found {
            Some(key) => Some(key),
            None => {
                let manual = ask(
                    &mut input,
                    "Please enter your API key (or press Enter to skip): ",
                )?;
                (!manual.is_empty()).then_some(manual)
            }
        };
        match key {
            Some(key) => {
                settings.set(SettingKey::ApiKey, key);
                println!("✓ API key saved successfully\n");
            }
            None => println!("Skipping API key setup\n"),
        }
    } else {
        println!("Skipping API key setup (using Claude CLI authentication)\n");
    }

    let prefix = ask(
        &mut input,
        "Enter your branch prefix (e.g., if you enter \"marco\", branches will be \"marco/your-task-name\"): ",
    )?;
    if prefix.is_empty() {
        println!("Skipping branch prefix setup\n");
    } else {
        settings.set(SettingKey::BranchPrefix, prefix.as_str());
        println!("✓ Branch prefix set to \"{prefix}\"");
        println!("  All branches will be prefixed: {prefix}/your-task-name\n");
    }

    write_settings(&paths.settings_path, &settings)?;
    println!("Configuration complete!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zshrc_key_is_extracted() {
        let contents = "export PATH=$PATH:/bin\nexport ANTHROPIC_API_KEY=\"sk-ant-abc123\"\n";
        assert_eq!(parse_zshrc_api_key(contents).as_deref(), Some("sk-ant-abc123"));
        assert_eq!(
            parse_zshrc_api_key("export  ANTHROPIC_API_KEY=sk-plain").as_deref(),
            Some("sk-plain")
        );
        assert_eq!(parse_zshrc_api_key("export OTHER=1"), None);
    }

    #[test]
    fn config_round_trip_through_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::under(temp.path());

        assert_eq!(
            config_get(&paths, "branchPrefix").expect("get"),
            "branchPrefix: not set"
        );
        assert_eq!(
            config_set(&paths, "branchPrefix", "marco").expect("set"),
            "✓ Branch prefix saved successfully"
        );
        assert_eq!(
            config_get(&paths, "branchPrefix").expect("get"),
            "branchPrefix: marco"
        );
        config_set(&paths, "apiKey", "sk-ant-0123456789abcdef").expect("set key");
        assert_eq!(
            config_get(&paths, "apiKey").expect("get key"),
            "apiKey: sk-ant-0...cdef"
        );
        assert_eq!(
            config_clear(&paths, "branchPrefix").expect("clear"),
            "✓ Branch prefix cleared"
        );
        assert_eq!(
            config_summary(&paths).expect("summary"),
            "apiKey: sk-ant-0...cdef\nbranchPrefix: not set"
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::under(temp.path());
        let err = config_set(&paths, "model", "opus").unwrap_err();
        assert_eq!(err.to_string(), "Unknown config key: model");
    }

    #[test]
    fn task_line_shows_status_and_pr() {
        let (_temp, store) = oneshot::test_support::temp_store();
        let task = store
            .insert("Fix login", "fix", "marco/fix-login", std::path::Path::new("/wt"))
            .expect("insert");
        assert_eq!(
            format_task_line(&task),
            "#1   ○ pending      Fix login (marco/fix-login)"
        );
    }
}
