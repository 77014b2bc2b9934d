//! Configuration types and structures.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::merge::lookup;
use crate::model::entity::DEFAULT_STATES;
use crate::model::task::DEFAULT_AGILE_STATES;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error opening configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing yaml of configuration file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub fulid: FulidConfig,

    #[serde(default)]
    pub task: TaskConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file. A leading `~` is expanded.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("rudo").join("main.db"))
        .unwrap_or_else(|| PathBuf::from(".rudo/main.db"))
}

/// Alphabet of the friendly identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulidConfig {
    /// Characters used to write the id counter.
    #[serde(default = "default_fulid_characters")]
    pub characters: String,

    /// Characters that can't appear in `characters`.
    #[serde(default = "default_forbidden_characters")]
    pub forbidden_characters: String,
}

impl Default for FulidConfig {
    fn default() -> Self {
        Self {
            characters: default_fulid_characters(),
            forbidden_characters: default_forbidden_characters(),
        }
    }
}

fn default_fulid_characters() -> String {
    "asdfghjwer".to_string()
}

fn default_forbidden_characters() -> String {
    "ilou|&:;()<>~*@?!$#[]{}\\/'\"`".to_string()
}

/// Task vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default = "default_agile_states")]
    pub agile_states: Vec<String>,

    #[serde(default = "default_allowed_states")]
    pub allowed_states: Vec<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            agile_states: default_agile_states(),
            allowed_states: default_allowed_states(),
        }
    }
}

fn default_agile_states() -> Vec<String> {
    DEFAULT_AGILE_STATES.iter().map(|s| s.to_string()).collect()
}

fn default_allowed_states() -> Vec<String> {
    DEFAULT_STATES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// chrono `strftime` format for dates in reports.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
        }
    }
}

fn default_date_format() -> String {
    "%Y-%m-%d %H:%M".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default log level when neither `RUST_LOG` nor `--verbose` is given.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load a single configuration file, filling gaps with defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the rest of the program can't work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let clashing: Vec<String> = self
            .fulid
            .characters
            .chars()
            .filter(|c| self.fulid.forbidden_characters.contains(*c))
            .map(|c| c.to_string())
            .collect();
        if !clashing.is_empty() {
            return Err(ConfigError::invalid(
                "fulid.characters",
                format!(
                    "the characters {} were found in the fulid charset, but they are forbidden",
                    clashing.join(", ")
                ),
            ));
        }
        if self.fulid.characters.chars().count() < 2 {
            return Err(ConfigError::invalid(
                "fulid.characters",
                "at least two characters are needed",
            ));
        }
        if self.task.agile_states.is_empty() {
            return Err(ConfigError::invalid(
                "task.agile_states",
                "the list of agile states can't be empty",
            ));
        }
        if self.task.allowed_states.is_empty() {
            return Err(ConfigError::invalid(
                "task.allowed_states",
                "the list of task states can't be empty",
            ));
        }
        Ok(())
    }

    /// Fetch a value by dotted key, e.g. `report.date_format`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = serde_json::to_value(self).ok()?;
        lookup(&value, key).cloned()
    }

    /// Database path with `~` expanded.
    pub fn db_path(&self) -> PathBuf {
        expand_home(&self.storage.db_path)
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> std::io::Result<()> {
        if let Some(parent) = self.db_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
