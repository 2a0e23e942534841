// SPDX-License-Identifier: GPL-3.0-only

//! Persistent settings
//!
//! Stored as pretty-printed JSON at `<config dir>/framefeed/config.json`.
//! Missing keys fall back to their defaults, so older files keep loading.

use crate::constants::timing::DEFAULT_FPS;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const APP_DIR: &str = "framefeed";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log lifecycle events at info level when `RUST_LOG` is unset
    #[serde(alias = "VERBOSE")]
    pub verbose: bool,
    /// Target frame rate for camera and video feeds
    pub frame_rate: u32,
    /// Camera used when no source is given
    pub camera_index: u32,
    /// Account database; `None` uses the data directory
    pub user_db: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: true,
            frame_rate: DEFAULT_FPS,
            camera_index: 0,
            user_db: None,
        }
    }
}

impl Config {
    /// Platform location of the config file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Read a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        debug!(path = %path.display(), ?config, "Configuration loaded");
        Ok(config)
    }

    /// Read `path`, falling back to defaults if it is missing or unreadable
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable configuration");
            Self::default()
        })
    }

    /// Write the config, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Overwrite the file at `path` with defaults and return them
    pub fn reset(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Account database path: configured, else `<data dir>/framefeed/users.db`
    pub fn user_db_path(&self) -> PathBuf {
        self.user_db.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR)
                .join("users.db")
        })
    }

    /// Default log filter directive when `RUST_LOG` is not set
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "info" } else { "warn" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.verbose);
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_legacy_verbose_key() {
        let config: Config = serde_json::from_str(r#"{"VERBOSE": false}"#).unwrap();
        assert!(!config.verbose);
        assert_eq!(config.frame_rate, DEFAULT_FPS);
    }

    #[test]
    fn test_save_load_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = Config {
            verbose: false,
            frame_rate: 15,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);

        assert_eq!(Config::reset(&path).unwrap(), Config::default());
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_load_or_default_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        assert_eq!(Config::load_or_default(&path), Config::default());
    }
}
