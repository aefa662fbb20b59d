//! User settings stored in `<config_dir>/oneshot/config.toml`.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::branch::DEFAULT_BRANCH_PREFIX;

/// User settings (TOML).
///
/// Missing fields are unset; a missing file is the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Credential forwarded to the agent as `ANTHROPIC_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Prefix for task branches (`<prefix>/<slug>`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_prefix: Option<String>,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.branch_prefix
            && (prefix.trim().is_empty() || prefix.chars().any(char::is_whitespace))
        {
            return Err(anyhow!("branchPrefix must be non-empty and contain no whitespace"));
        }
        if let Some(key) = &self.api_key
            && key.trim().is_empty()
        {
            return Err(anyhow!("apiKey must be non-empty"));
        }
        Ok(())
    }

    /// Configured prefix, or [`DEFAULT_BRANCH_PREFIX`].
    pub fn effective_branch_prefix(&self) -> &str {
        self.branch_prefix.as_deref().unwrap_or(DEFAULT_BRANCH_PREFIX)
    }

    pub fn get(&self, key: SettingKey) -> Option<&str> {
        match key {
            SettingKey::ApiKey => self.api_key.as_deref(),
            SettingKey::BranchPrefix => self.branch_prefix.as_deref(),
        }
    }

    pub fn set(&mut self, key: SettingKey, value: impl Into<String>) {
        let value = Some(value.into());
        match key {
            SettingKey::ApiKey => self.api_key = value,
            SettingKey::BranchPrefix => self.branch_prefix = value,
        }
    }

    pub fn clear(&mut self, key: SettingKey) {
        match key {
            SettingKey::ApiKey => self.api_key = None,
            SettingKey::BranchPrefix => self.branch_prefix = None,
        }
    }

    /// Value suitable for display; the API key is masked.
    pub fn display_value(&self, key: SettingKey) -> String {
        match (key, self.get(key)) {
            (_, None) => "not set".to_string(),
            (SettingKey::ApiKey, Some(value)) => mask_secret(value),
            (SettingKey::BranchPrefix, Some(value)) => value.to_string(),
        }
    }
}

/// Recognized settings keys, spelled as on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    ApiKey,
    BranchPrefix,
}

impl SettingKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::ApiKey => "apiKey",
            SettingKey::BranchPrefix => "branchPrefix",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "apiKey" => Ok(SettingKey::ApiKey),
            "branchPrefix" => Ok(SettingKey::BranchPrefix),
            other => Err(anyhow!("Unknown config key: {other}")),
        }
    }
}

/// Show the first 8 and last 4 characters; short secrets are fully hidden.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `Settings::default()`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

/// Atomically write settings to disk (temp file + rename).
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    settings.validate()?;
    let mut buf = toml::to_string_pretty(settings).context("serialize settings toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("settings path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp settings {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace settings {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = load_settings(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.effective_branch_prefix(), DEFAULT_BRANCH_PREFIX);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("oneshot").join("config.toml");
        let mut settings = Settings::default();
        settings.set(SettingKey::BranchPrefix, "marco");
        settings.set(SettingKey::ApiKey, "sk-ant-0123456789abcdef");
        write_settings(&path, &settings).expect("write");
        let loaded = load_settings(&path).expect("load");
        assert_eq!(loaded, settings);
        assert_eq!(loaded.effective_branch_prefix(), "marco");
    }

    #[test]
    fn clear_unsets_key() {
        let mut settings = Settings::default();
        settings.set(SettingKey::BranchPrefix, "marco");
        settings.clear(SettingKey::BranchPrefix);
        assert_eq!(settings.get(SettingKey::BranchPrefix), None);
        assert_eq!(settings.display_value(SettingKey::BranchPrefix), "not set");
    }

    #[test]
    fn rejects_whitespace_prefix() {
        let mut settings = Settings::default();
        settings.set(SettingKey::BranchPrefix, "my team");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn parses_known_keys_only() {
        assert_eq!("apiKey".parse::<SettingKey>().ok(), Some(SettingKey::ApiKey));
        assert_eq!(
            "branchPrefix".parse::<SettingKey>().ok(),
            Some(SettingKey::BranchPrefix)
        );
        let err = "model".parse::<SettingKey>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown config key: model");
    }

    #[test]
    fn masks_api_key() {
        assert_eq!(mask_secret("sk-ant-0123456789abcdef"), "sk-ant-0...cdef");
        assert_eq!(mask_secret("short"), "*****");
    }
}
