//! gitcmd::env
//!
//! The git executable and the environment every git process runs in.
//!
//! A [`GitEnv`] is resolved once at startup and shared by every command
//! through an `Arc`. Git never sees the host environment: each process
//! starts from an empty environment plus an isolated `HOME`, a small
//! allowlist of host variables and the settings that keep system config,
//! replace refs and credential prompts out of the way.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::args::{to_trusted_cmd_args, TrustedCmdArgs};
use super::process::ProcessRegistry;
use crate::core::config::{ConfigError, Settings};

/// Host variables always forwarded to git.
pub const PASSTHROUGH_ENV: &[&str] = &["GNUPGHOME", "PATH", "SYSTEMROOT"];

/// Errors from resolving the git environment.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("git executable not found on PATH: {0}")]
    GitNotFound(#[from] which::Error),

    #[error("cannot resolve git executable '{path}': {source}")]
    Executable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot create git home directory '{path}': {source}")]
    HomeDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Resolved git executable plus per-process settings.
#[derive(Debug)]
pub struct GitEnv {
    executable: PathBuf,
    home_dir: PathBuf,
    global_args: TrustedCmdArgs,
    default_timeout: Option<Duration>,
    passthrough_env: Vec<String>,
    slow_threshold: Duration,
    processes: Arc<ProcessRegistry>,
}

impl GitEnv {
    /// Resolve git from `settings.git_path`, or from `PATH` when unset.
    pub fn new(settings: &Settings) -> Result<Arc<Self>, EnvError> {
        let executable = match &settings.git_path {
            Some(path) => path.clone(),
            None => which::which("git")?,
        };
        Self::with_executable(executable, settings)
    }

    /// Use an explicit executable, ignoring `settings.git_path`.
    pub fn with_executable(
        executable: impl AsRef<Path>,
        settings: &Settings,
    ) -> Result<Arc<Self>, EnvError> {
        settings.validate()?;

        let executable = executable.as_ref();
        let executable = fs::canonicalize(executable).map_err(|source| EnvError::Executable {
            path: executable.to_path_buf(),
            source,
        })?;

        let home_dir = settings.home_dir.clone().unwrap_or_else(default_home_dir);
        fs::create_dir_all(&home_dir).map_err(|source| EnvError::HomeDir {
            path: home_dir.clone(),
            source,
        })?;

        let mut passthrough_env: Vec<String> =
            PASSTHROUGH_ENV.iter().map(|key| key.to_string()).collect();
        for key in settings.passthrough_env.iter().flatten() {
            if !passthrough_env.contains(key) {
                passthrough_env.push(key.clone());
            }
        }

        tracing::debug!(git = %executable.display(), home = %home_dir.display(), "resolved git environment");

        Ok(Arc::new(Self {
            executable,
            home_dir,
            global_args: to_trusted_cmd_args(settings.global_args.clone().unwrap_or_default()),
            default_timeout: settings.default_timeout(),
            passthrough_env,
            slow_threshold: settings.slow_command_threshold(),
            processes: ProcessRegistry::new(),
        }))
    }

    /// Absolute path of the git executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// The isolated HOME given to git.
    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn global_args(&self) -> &TrustedCmdArgs {
        &self.global_args
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    pub fn processes(&self) -> &Arc<ProcessRegistry> {
        &self.processes
    }

    /// Environment for git commands run on behalf of this library.
    pub fn common_git_cmd_envs(&self) -> Vec<(OsString, OsString)> {
        let mut envs = self.common_cmd_serv_envs();
        envs.push(("LC_ALL".into(), "C".into()));
        envs.push(("GIT_TERMINAL_PROMPT".into(), "0".into()));
        envs
    }

    /// Environment for git serving a remote client (upload-pack and
    /// friends), where the locale and prompt settings are left alone.
    pub fn common_cmd_serv_envs(&self) -> Vec<(OsString, OsString)> {
        let mut envs: Vec<(OsString, OsString)> = self
            .passthrough_env
            .iter()
            .filter_map(|key| std::env::var_os(key).map(|value| (key.into(), value)))
            .collect();
        envs.push(("HOME".into(), self.home_dir.clone().into_os_string()));
        envs.push(("GIT_CONFIG_NOSYSTEM".into(), "1".into()));
        envs.push(("GIT_NO_REPLACE_OBJECTS".into(), "1".into()));
        envs
    }
}

fn default_home_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("gitpipe").join("home"))
        .unwrap_or_else(|| std::env::temp_dir().join("gitpipe-home"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_env(temp: &TempDir, settings: Settings) -> Arc<GitEnv> {
        let settings = Settings {
            home_dir: Some(temp.path().join("home")),
            ..settings
        };
        GitEnv::new(&settings).unwrap()
    }

    fn lookup<'a>(envs: &'a [(OsString, OsString)], key: &str) -> Option<&'a OsString> {
        envs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[test]
    fn resolves_absolute_executable() {
        let temp = TempDir::new().unwrap();
        let env = test_env(&temp, Settings::default());
        assert!(env.executable().is_absolute());
        assert!(env.home_dir().is_dir());
    }

    #[test]
    fn git_envs_are_sanitized() {
        let temp = TempDir::new().unwrap();
        let env = test_env(&temp, Settings::default());
        let envs = env.common_git_cmd_envs();

        assert_eq!(
            lookup(&envs, "HOME").map(PathBuf::from),
            Some(temp.path().join("home"))
        );
        assert_eq!(lookup(&envs, "LC_ALL"), Some(&OsString::from("C")));
        assert_eq!(lookup(&envs, "GIT_TERMINAL_PROMPT"), Some(&OsString::from("0")));
        assert_eq!(lookup(&envs, "GIT_CONFIG_NOSYSTEM"), Some(&OsString::from("1")));
        assert_eq!(lookup(&envs, "GIT_NO_REPLACE_OBJECTS"), Some(&OsString::from("1")));
    }

    #[test]
    fn serv_envs_leave_locale_alone() {
        let temp = TempDir::new().unwrap();
        let env = test_env(&temp, Settings::default());
        let envs = env.common_cmd_serv_envs();
        assert!(lookup(&envs, "LC_ALL").is_none());
        assert!(lookup(&envs, "GIT_TERMINAL_PROMPT").is_none());
        assert!(lookup(&envs, "HOME").is_some());
    }

    #[test]
    fn missing_executable_is_error() {
        let temp = TempDir::new().unwrap();
        let result = GitEnv::with_executable(temp.path().join("no-git"), &Settings::default());
        assert!(matches!(result, Err(EnvError::Executable { .. })));
    }

    #[test]
    fn settings_carry_over() {
        let temp = TempDir::new().unwrap();
        let env = test_env(
            &temp,
            Settings {
                default_timeout_secs: Some(5),
                global_args: Some(vec!["-c".into(), "core.quotepath=false".into()]),
                ..Default::default()
            },
        );
        assert_eq!(env.default_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(env.global_args().len(), 2);
    }
}
