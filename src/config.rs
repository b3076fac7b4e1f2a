//! Configuration loading, inline overrides and generation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PickError;

/// How unmerged paths are settled when a replay conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Ask the user (or apply the automatic menu default).
    #[default]
    Manual,
    /// Keep the target line's side of every conflicted path.
    Ours,
    /// Take the replayed commit's side of every conflicted path.
    Theirs,
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of commits listed when showing a history chain
    pub max_commits_display: usize,

    /// Maximum number of revisions scanned by the content search
    pub max_search_depth: usize,

    /// Minimum similarity score (0-100) for rename candidates
    pub rename_threshold: u8,

    /// Editor command overriding $VISUAL / $EDITOR
    pub editor: Option<String>,

    /// Add detected dependencies without asking
    pub auto_add_dependencies: bool,

    /// Show progress bars
    pub show_progress: bool,

    /// Retries for failed git invocations
    pub max_retries: u32,

    /// Delay between retries in seconds
    pub retry_delay_secs: u64,

    /// Append per-operation statistics to stats.csv
    pub record_stats: bool,

    /// How conflicted paths are settled
    pub conflict_policy: ConflictPolicy,

    /// Enable debug logging to file
    pub debug: bool,

    /// Path to log directory (defaults to `<state dir>/logs`)
    pub log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_commits_display: 5,
            max_search_depth: 100,
            rename_threshold: 50,
            editor: None,
            auto_add_dependencies: false,
            show_progress: true,
            max_retries: 3,
            retry_delay_secs: 2,
            record_stats: true,
            conflict_policy: ConflictPolicy::Manual,
            debug: false,
            log_path: None,
        }
    }
}

impl Config {
    /// Log directory, falling back to `<state_dir>/logs`.
    pub fn log_dir(&self, state_dir: &Path) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| state_dir.join("logs"))
    }

    /// Apply a single `key=value` override.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key.trim() {
            "max_commits_display" => self.max_commits_display = parse_num(key, value)?,
            "max_search_depth" => self.max_search_depth = parse_num(key, value)?,
            "rename_threshold" => {
                let threshold: u8 = parse_num(key, value)?;
                if threshold > 100 {
                    return Err(PickError::invalid_config(format!(
                        "rename_threshold must be within 0..=100, got {threshold}"
                    ))
                    .into());
                }
                self.rename_threshold = threshold;
            }
            "editor" => {
                self.editor = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "auto_add_dependencies" => self.auto_add_dependencies = parse_bool(key, value)?,
            "show_progress" => self.show_progress = parse_bool(key, value)?,
            "max_retries" => self.max_retries = parse_num(key, value)?,
            "retry_delay_secs" => self.retry_delay_secs = parse_num(key, value)?,
            "record_stats" => self.record_stats = parse_bool(key, value)?,
            "conflict_policy" => {
                self.conflict_policy = match value.to_lowercase().as_str() {
                    "manual" => ConflictPolicy::Manual,
                    "ours" => ConflictPolicy::Ours,
                    "theirs" => ConflictPolicy::Theirs,
                    other => {
                        return Err(PickError::invalid_config(format!(
                            "conflict_policy must be manual, ours or theirs, got '{other}'"
                        ))
                        .into());
                    }
                }
            }
            "debug" => self.debug = parse_bool(key, value)?,
            "log_path" => self.log_path = Some(PathBuf::from(value)),
            other => {
                return Err(
                    PickError::invalid_config(format!("Unknown configuration key: {other}")).into(),
                );
            }
        }
        Ok(())
    }

    /// Apply `key=value` pairs as given on the command line.
    pub fn apply_overrides(&mut self, pairs: &[String]) -> Result<()> {
        for pair in pairs {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                PickError::invalid_config(format!("Expected key=value, got '{pair}'"))
            })?;
            self.set(key, value)?;
            tracing::info!(key, value, "configuration updated");
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "t" | "y" | "on" => Ok(true),
        "false" | "no" | "0" | "f" | "n" | "off" => Ok(false),
        _ => Err(PickError::invalid_config(format!(
            "Invalid value for {key}: '{value}' (expected true or false)"
        ))
        .into()),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        PickError::invalid_config(format!("Invalid value for {key}: '{value}'")).into()
    })
}

/// Configuration service.
pub struct ConfigService;

impl ConfigService {
    /// Default configuration path inside a state directory.
    pub fn default_path(state_dir: &Path) -> PathBuf {
        state_dir.join("config.toml")
    }

    /// User-wide configuration: ~/.config/smart-pick/config.toml
    pub fn user_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("smart-pick")
            .join("config.toml")
    }

    /// Path to load: an explicit `--config`, then the repository file, then
    /// the user-wide file. Falls back to the repository path when none exist.
    pub fn resolve_path(state_dir: &Path, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let repo = Self::default_path(state_dir);
        if repo.exists() {
            return repo;
        }
        let user = Self::user_path();
        if user.exists() { user } else { repo }
    }

    /// Load configuration from file.
    ///
    /// If the file doesn't exist, returns default configuration.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.rename_threshold > 100 {
            return Err(PickError::invalid_config(format!(
                "rename_threshold must be within 0..=100, got {}",
                config.rename_threshold
            ))
            .into());
        }

        Ok(config)
    }

    /// Persist the configuration (used after inline overrides).
    pub fn save(path: &Path, config: &Config) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Generate default configuration file at the specified path.
    pub fn generate_at(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = Self::default_config_content();
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Generate default configuration content with comments.
    fn default_config_content() -> String {
        r#"# smart-pick configuration file

# Commits listed when a file history chain is shown (default: 5)
max_commits_display = 5

# Revisions scanned when searching history for a file name (default: 100)
max_search_depth = 100

# Minimum similarity score (0-100) for rename candidates (default: 50)
rename_threshold = 50

# Editor used for conflict resolution (default: $VISUAL, $EDITOR, vi)
# editor = "nvim"

# Add detected dependencies without asking (default: false)
auto_add_dependencies = false

# Show progress bars (default: true)
show_progress = true

# Retries and delay for failed git invocations
max_retries = 3
retry_delay_secs = 2

# Append per-operation statistics to stats.csv (default: true)
record_stats = true

# Conflict handling: "manual", "ours" or "theirs" (default: manual)
conflict_policy = "manual"

# Enable debug logging to file (default: false)
debug = false

# Path to log directory (default: <repo>/.git/smart-pick/logs)
# log_path = "/tmp/smart-pick-logs"
"#
        .to_string()
    }
}
