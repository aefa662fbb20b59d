//! Interactive terminal UI.

mod app;
mod command;
mod event;
mod render;
mod state;

use anyhow::{Context, Result};
use tracing::info;

use oneshot::exit_codes;
use oneshot::io::config::load_settings;
use oneshot::io::paths::AppPaths;

use crate::commands::build_orchestrator;
use app::App;

/// Run the terminal UI until the user exits. Returns the process exit code.
pub fn run(paths: &AppPaths) -> Result<i32> {
    let settings = load_settings(&paths.settings_path)?;
    let orch = build_orchestrator(paths, &settings)?;
    if let Err(err) = orch.agent().check_available() {
        eprintln!("{err}");
        return Ok(exit_codes::AGENT_UNAVAILABLE);
    }

    oneshot::logging::init_file(&paths.log_path)?;
    info!(log = %paths.log_path.display(), "starting terminal ui");

    let terminal = ratatui::init();
    let result = App::new(paths.clone(), orch).run(terminal);
    ratatui::restore();
    result.context("terminal ui failed")?;
    Ok(exit_codes::OK)
}
