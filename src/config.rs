//! Configuration loaded from YAML, with the project id supplied externally.

use eyre::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the project id.
pub const PROJECT_ID_ENV: &str = "EVENTBOARD_PROJECT_ID";

/// Default warehouse directory, relative to the working directory.
const DEFAULT_WAREHOUSE_DIR: &str = ".eventboard";

const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project/account identifier. Treat as a secret; never hard-code.
    pub project_id: Option<String>,

    /// Directory of the local warehouse
    pub warehouse: PathBuf,

    /// Seconds a fetched result stays memoized
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: None,
            warehouse: PathBuf::from(DEFAULT_WAREHOUSE_DIR),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl Config {
    /// Default config file location (`~/.config/eventboard/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("eventboard").join("config.yaml"))
    }

    /// Parse a config from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("Failed to parse config")
    }

    /// Load from `path` if given (it must exist), else from the default
    /// location if present, else defaults. The environment then overrides
    /// the project id.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        Ok(config.with_project_override(std::env::var(PROJECT_ID_ENV).ok()))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&text)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Replace the project id when `project_id` is a non-empty value.
    pub fn with_project_override(mut self, project_id: Option<String>) -> Self {
        if let Some(project_id) = project_id.filter(|p| !p.trim().is_empty()) {
            self.project_id = Some(project_id);
        }
        self
    }

    /// Project id, or an empty string when none is configured.
    pub fn project_id(&self) -> &str {
        self.project_id.as_deref().unwrap_or_default()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.project_id, None);
        assert_eq!(config.warehouse, PathBuf::from(".eventboard"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.project_id(), "");
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = Config::from_yaml("project_id: analytics-123\ncache_ttl_secs: 60\n").unwrap();
        assert_eq!(config.project_id.as_deref(), Some("analytics-123"));
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.warehouse, PathBuf::from(".eventboard"));
    }

    #[test]
    fn test_from_yaml_empty() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_from_yaml_invalid() {
        assert!(Config::from_yaml("cache_ttl_secs: [1, 2]").is_err());
    }

    #[test]
    fn test_project_override() {
        let config = Config::from_yaml("project_id: from-file").unwrap();

        let overridden = config.clone().with_project_override(Some("from-env".to_string()));
        assert_eq!(overridden.project_id(), "from-env");

        let blank = config.clone().with_project_override(Some("  ".to_string()));
        assert_eq!(blank.project_id(), "from-file");

        let none = config.with_project_override(None);
        assert_eq!(none.project_id(), "from-file");
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "warehouse: /tmp/wh\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.warehouse, PathBuf::from("/tmp/wh"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&temp_dir.path().join("nope.yaml"))).is_err());
    }
}
