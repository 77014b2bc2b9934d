//! Configuration loader with tier-based merging.

use super::merge::deep_merge_all;
use super::types::{Config, ConfigError};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    /// `./.rudo/config.yaml`
    Project = 1,
    /// `$XDG_DATA_HOME/rudo/config.yaml`
    User = 2,
    /// `RUDO_*` variables
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// `RUDO_USER_DIR` overrides the user directory, `RUDO_PROJECT_DIR` the
    /// project one.
    pub fn discover() -> Self {
        let user_dir = std::env::var("RUDO_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|dir| dir.join("rudo")));

        let project_dir = std::env::var("RUDO_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from(".rudo")));

        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    fn tier_files(&self) -> Vec<(ConfigTier, PathBuf)> {
        let mut files = Vec::new();
        if let Some(dir) = &self.project_dir {
            files.push((ConfigTier::Project, dir.join("config.yaml")));
        }
        if let Some(dir) = &self.user_dir {
            files.push((ConfigTier::User, dir.join("config.yaml")));
        }
        files
    }
}

/// Loads and merges the configuration tiers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed to the configuration, lowest tier first.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load from the discovered tiers, or only from `explicit` (falling back
    /// to `RUDO_CONFIG_PATH`) when given.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RUDO_CONFIG_PATH").ok().map(PathBuf::from));

        match explicit {
            Some(path) => Self::load_file(ConfigPaths::discover(), path),
            None => Self::load_with_paths(ConfigPaths::discover()),
        }
    }

    /// Merge defaults with a single explicit file.
    fn load_file(paths: ConfigPaths, path: PathBuf) -> Result<Self, ConfigError> {
        let tiers = vec![
            serde_json::to_value(Config::default())?,
            read_yaml(&path)?,
        ];
        let sources = vec![(ConfigTier::User, path)];
        Self::finish(paths, tiers, sources)
    }

    /// Load configuration with explicit tier directories.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self, ConfigError> {
        let mut tiers = vec![serde_json::to_value(Config::default())?];
        let mut sources = Vec::new();

        for (tier, file) in paths.tier_files() {
            if file.exists() {
                tiers.push(read_yaml(&file)?);
                sources.push((tier, file));
            }
        }

        Self::finish(paths, tiers, sources)
    }

    fn finish(
        paths: ConfigPaths,
        tiers: Vec<Value>,
        mut sources: Vec<(ConfigTier, PathBuf)>,
    ) -> Result<Self, ConfigError> {
        let mut config: Config = serde_json::from_value(deep_merge_all(tiers))?;
        if Self::apply_env_overrides(&mut config) {
            sources.push((ConfigTier::Environment, PathBuf::from("RUDO_*")));
        }
        config.validate()?;

        for (tier, path) in &sources {
            debug!(%tier, path = %path.display(), "loaded configuration");
        }

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Apply environment variable overrides. Returns whether any applied.
    fn apply_env_overrides(config: &mut Config) -> bool {
        let mut applied = false;

        if let Ok(db_path) = std::env::var("RUDO_DB_PATH") {
            config.storage.db_path = PathBuf::from(db_path);
            applied = true;
        }

        if let Ok(level) = std::env::var("RUDO_LOG_LEVEL") {
            config.log.level = level;
            applied = true;
        }

        applied
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

fn read_yaml(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str::<Value>(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("config.yaml"), content).unwrap();
    }

    #[test]
    fn defaults_when_no_files() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );

        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        assert_eq!(loader.config().fulid.characters, "asdfghjwer");
        assert!(
            loader
                .sources()
                .iter()
                .all(|(tier, _)| *tier == ConfigTier::Environment)
        );
    }

    #[test]
    fn project_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        write_config(&project, "report:\n  date_format: \"%d/%m\"\n");

        let paths = ConfigPaths::with_dirs(Some(project), Some(temp.path().join("user")));
        let loader = ConfigLoader::load_with_paths(paths).unwrap();

        assert_eq!(loader.config().report.date_format, "%d/%m");
        assert_eq!(loader.config().task.agile_states.len(), 5);
        assert_eq!(loader.sources()[0].0, ConfigTier::Project);
    }

    #[test]
    fn user_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        let user = temp.path().join("user");
        write_config(
            &project,
            "task:\n  agile_states: [todo, doing]\nreport:\n  date_format: \"%d\"\n",
        );
        write_config(&user, "task:\n  agile_states: [later]\n");

        let loader =
            ConfigLoader::load_with_paths(ConfigPaths::with_dirs(Some(project), Some(user)))
                .unwrap();

        assert_eq!(loader.config().task.agile_states, vec!["later".to_string()]);
        assert_eq!(loader.config().report.date_format, "%d");
    }

    #[test]
    fn invalid_tier_fails() {
        let temp = TempDir::new().unwrap();
        let user = temp.path().join("user");
        write_config(&user, "fulid:\n  characters: \"abci\"\n");

        let err = ConfigLoader::load_with_paths(ConfigPaths::with_dirs(None, Some(user)))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn explicit_file_is_merged_over_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.yaml");
        std::fs::write(&path, "log:\n  level: debug\n").unwrap();

        let loader = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(loader.config().fulid.characters, "asdfghjwer");
        assert!(loader.sources().iter().any(|(_, p)| *p == path));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = ConfigLoader::load(Some(&temp.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
