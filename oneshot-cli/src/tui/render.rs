//! UI rendering for the terminal interface.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use oneshot::core::types::{Task, TaskStatus};

use super::state::{InputMode, JobKind, JobProgress, UiState};
use crate::commands::{format_task_line, status_icon};

const MAX_OUTPUT_LINES: u16 = 12;

/// Main render function.
pub fn render(frame: &mut Frame, state: &UiState) {
    let output_height = if state.output.is_empty() || state.is_busy() {
        0
    } else {
        (state.output.lines().count() as u16).min(MAX_OUTPUT_LINES) + 2
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Header
            Constraint::Min(0),                // Body
            Constraint::Length(output_height), // Output
            Constraint::Length(3),             // Input
        ])
        .split(frame.area());

    render_header(frame, chunks[0], state);
    match (&state.job, state.current_task()) {
        (Some(job), _) => render_progress(frame, chunks[1], job),
        (None, Some(task)) => render_detail(frame, chunks[1], task, state.scroll),
        (None, None) => render_task_list(frame, chunks[1], state),
    }
    if output_height > 0 {
        render_output(frame, chunks[2], state);
    }
    render_input(frame, chunks[3], state);
    render_suggestions(frame, chunks[1], state);
}

fn render_header(frame: &mut Frame, area: Rect, state: &UiState) {
    let header = Paragraph::new(Line::from(Span::styled(
        state.header(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(header, area);
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Pending => Color::Gray,
        TaskStatus::InProgress => Color::Blue,
        TaskStatus::NeedsAction => Color::Yellow,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Failed => Color::Red,
    }
}

fn render_task_list(frame: &mut Frame, area: Rect, state: &UiState) {
    let lines: Vec<Line> = if state.tasks.is_empty() {
        vec![Line::from(Span::styled(
            "No tasks yet. Type 'task' to create one.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        state
            .tasks
            .iter()
            .map(|task| {
                Line::from(Span::styled(
                    format_task_line(task),
                    Style::default().fg(status_color(task.status)),
                ))
            })
            .collect()
    };

    let list = Paragraph::new(lines)
        .scroll((state.scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(" Tasks "));
    frame.render_widget(list, area);
}

fn field<'a>(label: &'a str, value: String, color: Color) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{label:<15}"), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn heading(text: &str, color: Color) -> Line<'_> {
    Line::from(Span::styled(
        text,
        Style::default()
            .fg(color)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    ))
}

fn indented(text: &str, color: Color) -> Vec<Line<'static>> {
    text.lines()
        .map(|line| Line::from(Span::styled(format!("  {line}"), Style::default().fg(color))))
        .collect()
}

fn render_detail(frame: &mut Frame, area: Rect, task: &Task, scroll: u16) {
    let status = task.status;
    let mut lines = vec![
        field(
            "Status:",
            format!("{} {}", status_icon(status), status),
            status_color(status),
        ),
        field("Branch:", task.branch_name.clone(), Color::White),
        field(
            "Worktree:",
            task.worktree_path.display().to_string(),
            Color::Gray,
        ),
        field(
            "Created:",
            task.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            Color::White,
        ),
    ];
    if let Some(url) = &task.pr_url {
        lines.push(field("Pull Request:", url.clone(), Color::Cyan));
    }

    lines.push(Line::default());
    lines.push(heading("Task Prompt:", Color::White));
    lines.extend(indented(&task.prompt, Color::White));

    if let Some(result) = &task.result {
        lines.push(Line::default());
        lines.push(heading("Result:", Color::Green));
        lines.extend(indented(result, Color::White));
    }
    if let Some(error) = &task.error {
        lines.push(Line::default());
        lines.push(heading("Error:", Color::Red));
        lines.extend(indented(error, Color::Red));
    }

    let path = task.worktree_path.display();
    match status {
        TaskStatus::NeedsAction => {
            lines.push(Line::default());
            let hint = format!(
                "⚠ This task needs your attention. Review the error above and consider:\n\
                 - Running the task again with a more specific prompt\n\
                 - Manually making changes in the worktree: {path}\n\
                 - Using \"link\" to open a pull request once the changes are ready"
            );
            lines.extend(indented(&hint, Color::Yellow));
        }
        TaskStatus::InProgress => {
            lines.push(Line::default());
            let hint = format!(
                "◐ Claude is currently working on this task...\nChanges are being made in: {path}"
            );
            lines.extend(indented(&hint, Color::Blue));
        }
        _ => {}
    }

    let detail = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Type \"cd ..\" to return to the task list "),
        );
    frame.render_widget(detail, area);
}

fn render_progress(frame: &mut Frame, area: Rect, job: &JobProgress) {
    let mut lines = vec![
        Line::from(Span::styled(
            job.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];

    for (stage, done, active) in job.checklist() {
        let (icon, color) = if done {
            ("✓", Color::Green)
        } else if active {
            ("◐", Color::Yellow)
        } else {
            ("○", Color::DarkGray)
        };
        lines.push(Line::from(Span::styled(
            format!("{icon} {}", stage.label()),
            Style::default().fg(color),
        )));
    }

    if let Some(message) = &job.last_message {
        if job.kind != JobKind::Simple {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Gray),
        )));
    }

    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Working "));
    frame.render_widget(panel, area);
}

fn render_output(frame: &mut Frame, area: Rect, state: &UiState) {
    let output = Paragraph::new(state.output.as_str())
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
    frame.render_widget(output, area);
}

fn render_input(frame: &mut Frame, area: Rect, state: &UiState) {
    let color = match state.input_mode {
        InputMode::Command => Color::Green,
        InputMode::TaskName | InputMode::TaskPrompt => Color::Yellow,
        InputMode::ConfirmPr => Color::Cyan,
    };
    let mut spans = vec![Span::styled(
        state.input_mode.prompt(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];
    if state.input.is_empty() && state.in_detail() && state.input_mode == InputMode::Command {
        spans.push(Span::styled(
            "type cd .. to go back",
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        spans.push(Span::raw(state.input.as_str()));
    }

    let input = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color)),
    );
    frame.render_widget(input, area);

    let cursor_x = area.x + 1 + (state.input_mode.prompt().chars().count() + state.input.chars().count()) as u16;
    frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(2)), area.y + 1));
}

/// Popup listing matching `/` commands, anchored to the bottom of `body`.
fn render_suggestions(frame: &mut Frame, body: Rect, state: &UiState) {
    let suggestions = state.suggestions();
    if suggestions.is_empty() {
        return;
    }
    let height = (suggestions.len() as u16 + 2).min(body.height);
    let area = Rect {
        x: body.x + 1,
        y: body.bottom().saturating_sub(height),
        width: body.width.saturating_sub(2).min(60),
        height,
    };
    let lines: Vec<Line> = suggestions
        .iter()
        .map(|cmd| {
            Line::from(vec![
                Span::styled(
                    format!("/{:<20}", cmd.usage),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(cmd.description, Style::default().fg(Color::Gray)),
            ])
        })
        .collect();

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Commands ")),
        area,
    );
}
