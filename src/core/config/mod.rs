//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Settings file
//! 3. CLI flags (not handled here)
//!
//! # Locations
//!
//! Searched in order, the first existing file wins:
//! 1. `$GITPIPE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitpipe/config.toml`
//! 3. `~/.gitpipe/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use gitpipe::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("timeout: {:?}", config.settings.default_timeout());
//! ```

pub mod schema;

pub use schema::Settings;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed settings (defaults when no file exists)
    pub settings: Settings,
    /// Path to the settings file (if loaded)
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. A missing config file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let settings = Self::read_settings(path)?;
        settings.validate()?;
        Ok(Config {
            settings,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    fn find_config_file() -> Option<PathBuf> {
        // 1. Check $GITPIPE_CONFIG
        if let Ok(path) = std::env::var("GITPIPE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/gitpipe/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("gitpipe/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.gitpipe/config.toml
        let path = dirs::home_dir()?.join(".gitpipe/config.toml");
        path.exists().then_some(path)
    }

    fn read_settings(path: &Path) -> Result<Settings, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the path to the loaded settings file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_from_explicit_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            default_timeout_secs = 30
            passthrough_env = ["SSH_AUTH_SOCK"]
            "#,
        )
        .unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.settings.default_timeout_secs, Some(30));
        assert_eq!(config.loaded_from(), Some(config_path.as_path()));
    }

    #[test]
    fn parse_error_reports_path() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "default_timeout_secs = \"soon\"").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { ref path, .. } if path == &config_path));
    }

    #[test]
    fn invalid_value_rejected_at_load() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, r#"global_args = ["core.bare=true"]"#).unwrap();

        assert!(matches!(
            Config::load_from(&config_path),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load_from(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }
}
