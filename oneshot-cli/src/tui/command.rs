//! Parsing of the command line typed into the terminal UI.

/// A command shown in help and in the suggestion popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDef {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
}

const fn def(name: &'static str, usage: &'static str, description: &'static str) -> CommandDef {
    CommandDef {
        name,
        usage,
        description,
    }
}

pub const MAIN_COMMANDS: &[CommandDef] = &[
    def("task", "task", "Create and execute a new task (interactive)"),
    def("cd", "cd <number>", "Navigate into a specific task"),
    def("link", "link <number>", "Get PR link for task by number"),
    def("update", "update", "Pull latest main/master and rebase"),
    def("delete", "delete <number> ...", "Delete one or more tasks by number"),
    def("tasks", "tasks", "Refresh task list"),
    def("config", "config", "Show configuration"),
    def("config", "config set <k> <v>", "Set config value"),
    def("config", "config get <k>", "Get config value"),
    def("config", "config clear <k>", "Clear config value"),
    def("clear", "clear", "Clear output"),
    def("help", "help", "Show this help"),
    def("exit", "exit/quit", "Exit the application"),
];

pub const DETAIL_COMMANDS: &[CommandDef] = &[
    def("cd", "cd ..", "Go back to main task list view"),
    def("link", "link", "Get PR link for current task"),
    def("update", "update", "Pull latest changes from main and remote branch"),
    def("delete", "delete", "Delete current task"),
    def("clear", "clear", "Clear output"),
    def("help", "help", "Show this help"),
    def("exit", "exit/quit", "Exit the application"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdTarget {
    Up,
    Task(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    Show,
    Set { key: String, value: String },
    Get { key: String },
    Clear { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Task,
    Cd(CdTarget),
    /// `None` means the task open in the detail view.
    Link(Option<u32>),
    Update,
    /// Empty means the task open in the detail view.
    Delete(Vec<u32>),
    Tasks,
    Config(ConfigCommand),
    Clear,
    Help,
    Exit,
}

/// Parse one submitted line. A leading `/` is optional.
///
/// Errors are user-facing usage messages.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Err(String::new());
    };
    let args: Vec<&str> = words.collect();

    match name {
        "exit" | "quit" => Ok(Command::Exit),
        "task" => Ok(Command::Task),
        "tasks" => Ok(Command::Tasks),
        "clear" => Ok(Command::Clear),
        "help" => Ok(Command::Help),
        "update" => Ok(Command::Update),
        "cd" => match args.as_slice() {
            [".."] => Ok(Command::Cd(CdTarget::Up)),
            [n] => n
                .parse()
                .map(|n| Command::Cd(CdTarget::Task(n)))
                .map_err(|_| "Usage: cd <number> or cd ..".to_string()),
            _ => Err("Usage: cd <number> or cd ..".to_string()),
        },
        "link" => match args.as_slice() {
            [] => Ok(Command::Link(None)),
            [n] => n
                .parse()
                .map(|n| Command::Link(Some(n)))
                .map_err(|_| link_usage()),
            _ => Err(link_usage()),
        },
        "delete" => {
            if args.is_empty() {
                return Ok(Command::Delete(Vec::new()));
            }
            let numbers: Vec<u32> = args.iter().filter_map(|arg| arg.parse().ok()).collect();
            if numbers.is_empty() {
                return Err(delete_usage());
            }
            Ok(Command::Delete(numbers))
        }
        "config" => match args.as_slice() {
            [] => Ok(Command::Config(ConfigCommand::Show)),
            ["set", key, value] => Ok(Command::Config(ConfigCommand::Set {
                key: key.to_string(),
                value: value.to_string(),
            })),
            ["get", key] => Ok(Command::Config(ConfigCommand::Get {
                key: key.to_string(),
            })),
            ["clear", key] => Ok(Command::Config(ConfigCommand::Clear {
                key: key.to_string(),
            })),
            _ => Err("Usage: config [set <key> <value> | get <key> | clear <key>]".to_string()),
        },
        other => Err(format!(
            "Unknown command: {other}. Type 'help' for available commands."
        )),
    }
}

pub fn link_usage() -> String {
    "Usage: link <number> or link (when in task detail view)".to_string()
}

pub fn delete_usage() -> String {
    "Usage: delete <number> [<number> ...] or delete (when in task detail view)".to_string()
}

fn commands_for(in_detail: bool) -> &'static [CommandDef] {
    if in_detail {
        DETAIL_COMMANDS
    } else {
        MAIN_COMMANDS
    }
}

/// Commands whose name starts with what was typed after `/`.
///
/// Only offered while the first word is still being typed.
pub fn suggestions(input: &str, in_detail: bool) -> Vec<CommandDef> {
    let Some(typed) = input.strip_prefix('/') else {
        return Vec::new();
    };
    if typed.contains(char::is_whitespace) {
        return Vec::new();
    }
    let mut seen = Vec::new();
    commands_for(in_detail)
        .iter()
        .filter(|cmd| cmd.name.starts_with(typed))
        .filter(|cmd| {
            if seen.contains(&cmd.name) {
                return false;
            }
            seen.push(cmd.name);
            true
        })
        .copied()
        .collect()
}

pub fn help_text(in_detail: bool) -> String {
    let mut text = String::from("Available commands:");
    for cmd in commands_for(in_detail) {
        text.push_str(&format!("\n  {:<20} - {}", cmd.usage, cmd.description));
    }
    text
}
