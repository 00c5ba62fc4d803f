//! `uc` configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;
use crate::source::SourceConfig;

/// Main `uc` configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error); overridden by --log-level
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Coordinator behaviour
    pub coordinator: CoordinatorConfig,

    /// The endpoint to poll
    pub source: SourceConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.update_interval_secs == 0 {
            return Err(eyre::eyre!("coordinator.update-interval-secs must be greater than zero"));
        }
        if self.coordinator.fetch_timeout_secs == 0 {
            return Err(eyre::eyre!("coordinator.fetch-timeout-secs must be greater than zero"));
        }
        if let Some(pointer) = &self.source.pointer {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(eyre::eyre!("source.pointer must be a JSON pointer starting with '/', got {pointer}"));
            }
        }
        Ok(())
    }

    /// Load and validate configuration
    ///
    /// An explicit path must load. Otherwise the first readable file among
    /// [`Config::search_paths`] wins; unreadable ones are skipped with a
    /// warning, and defaults apply when none is found.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                Self::load_from_file(path).with_context(|| format!("Failed to load config from {}", path.display()))?
            }
            None => Self::search_paths()
                .into_iter()
                .filter(|path| path.exists())
                .find_map(|path| match Self::load_from_file(&path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable config");
                        None
                    }
                })
                .unwrap_or_else(|| {
                    tracing::debug!("No config file found, using defaults");
                    Self::default()
                }),
        };

        config.validate()?;
        Ok(config)
    }

    /// Implicit config locations, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".uc.yml")];
        paths.extend(dirs::config_dir().map(|dir| dir.join("uc").join("uc.yml")));
        paths
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Read only the log level from the config chain
    ///
    /// Logging is set up before the full config is loaded, so a broken config
    /// file must not prevent logging; errors fall back to `None`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.log_level.is_none());
        assert_eq!(config.coordinator.update_interval_secs, 30);
        assert!(config.source.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_file() {
        let file = write_config(
            r#"
log-level: debug
coordinator:
  name: weather
  update-interval-secs: 60
  always-update: false
source:
  url: http://localhost:8080/api
  pointer: /current
  headers:
    X-Api-Key: secret
"#,
        );

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.coordinator.name, "weather");
        assert_eq!(config.coordinator.update_interval_secs, 60);
        assert_eq!(config.coordinator.fetch_timeout_secs, 10);
        assert!(!config.coordinator.always_update);
        assert_eq!(config.source.url.as_deref(), Some("http://localhost:8080/api"));
        assert_eq!(config.source.headers.get("X-Api-Key").map(String::as_str), Some("secret"));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = PathBuf::from("/nonexistent/uc.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let file = write_config("coordinator:\n  update-interval-secs: 0\n");
        let err = Config::load(Some(&file.path().to_path_buf())).unwrap_err();
        assert!(format!("{err:#}").contains("update-interval-secs must be greater than zero"));
    }

    #[test]
    fn test_search_paths_start_local() {
        let paths = Config::search_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from(".uc.yml")));
        assert!(paths.iter().skip(1).all(|p| p.ends_with("uc/uc.yml")));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.coordinator.update_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.coordinator.fetch_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_pointer() {
        let mut config = Config::default();
        config.source.pointer = Some("current".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("update-interval-secs"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
    }
}
