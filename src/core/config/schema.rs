//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Settings
//!
//! Located at (in order of precedence):
//! 1. `$GITPIPE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitpipe/config.toml`
//! 3. `~/.gitpipe/config.toml`
//!
//! # Validation
//!
//! Config values are validated after parsing so that a bad global
//! argument is reported at load time rather than on the first git call.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Settings for git subprocess orchestration.
///
/// # Example
///
/// ```toml
/// git_path = "/usr/bin/git"
/// home_dir = "/var/lib/gitpipe/home"
/// default_timeout_secs = 360
/// global_args = ["-c", "protocol.version=2"]
/// passthrough_env = ["SSH_AUTH_SOCK"]
/// slow_command_secs = 1
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Explicit git executable. Looked up on `PATH` when absent.
    pub git_path: Option<PathBuf>,

    /// Isolated HOME handed to every git process.
    pub home_dir: Option<PathBuf>,

    /// Timeout applied to commands that do not set their own (0 disables).
    pub default_timeout_secs: Option<u64>,

    /// Trusted arguments placed before every subcommand.
    pub global_args: Option<Vec<String>>,

    /// Extra host environment variables forwarded to git.
    pub passthrough_env: Option<Vec<String>>,

    /// Commands running longer than this are logged as slow.
    pub slow_command_secs: Option<u64>,
}

impl Settings {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.git_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "git_path cannot be empty".to_string(),
                ));
            }
        }

        // The first global argument must be an option, and a value must
        // only ever follow an option that takes one.
        if let Some(args) = &self.global_args {
            let mut expect_value = false;
            for arg in args {
                if expect_value {
                    expect_value = false;
                    continue;
                }
                if !arg.starts_with('-') {
                    return Err(ConfigError::InvalidValue(format!(
                        "global argument '{}' must be an option",
                        arg
                    )));
                }
                expect_value = arg == "-c";
            }
            if expect_value {
                return Err(ConfigError::InvalidValue(
                    "global argument '-c' needs a value".to_string(),
                ));
            }
        }

        if let Some(keys) = &self.passthrough_env {
            if let Some(bad) = keys.iter().find(|k| k.is_empty() || k.contains('=')) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid passthrough environment key '{}'",
                    bad
                )));
            }
        }

        Ok(())
    }

    /// Default timeout as a duration, `None` when disabled.
    pub fn default_timeout(&self) -> Option<Duration> {
        match self.default_timeout_secs {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }

    /// Threshold for the slow-command debug log.
    pub fn slow_command_threshold(&self) -> Duration {
        Duration::from_secs(self.slow_command_secs.unwrap_or(1))
    }
}
