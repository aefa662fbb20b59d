//! Canonical on-disk locations.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Application namespace used for the config directory.
pub const APP_NAME: &str = "oneshot";

/// All canonical paths used by oneshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Per-user configuration directory (`<config_dir>/oneshot`).
    pub config_dir: PathBuf,
    /// Task store document.
    pub tasks_path: PathBuf,
    /// User settings (`apiKey`, `branchPrefix`).
    pub settings_path: PathBuf,
    /// Base directory for per-task worktrees.
    pub worktrees_dir: PathBuf,
    /// Log file used while the terminal UI owns the screen.
    pub log_path: PathBuf,
}

impl AppPaths {
    /// Resolve the standard per-user locations.
    pub fn resolve() -> Result<Self> {
        let config_root =
            dirs::config_dir().ok_or_else(|| anyhow!("cannot determine config directory"))?;
        let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
        Ok(Self::from_dirs(
            config_root.join(APP_NAME),
            home.join(format!(".{APP_NAME}")),
        ))
    }

    /// Root every path under `root` (tests, sandboxes).
    pub fn under(root: &Path) -> Self {
        Self::from_dirs(root.join("config"), root.join("home"))
    }

    fn from_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            tasks_path: config_dir.join("tasks.json"),
            settings_path: config_dir.join("config.toml"),
            config_dir,
            worktrees_dir: data_dir.join("worktrees"),
            log_path: data_dir.join("oneshot.log"),
        }
    }
}
