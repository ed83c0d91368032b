//! gitcmd::error
//!
//! Errors from building, starting and waiting on git commands.
//!
//! # Taxonomy
//!
//! - [`Error::BrokenCommand`]: argument problems found while building the
//!   command. Nothing was spawned.
//! - [`Error::Spawn`]: the OS could not start the process.
//! - [`Error::Io`]: creating a pipe or a copy thread failed.
//! - [`Error::Run`]: the process ran and failed. A [`RunError`] tells a
//!   clean non-zero exit apart from a kill by timeout or cancellation.

use std::fmt;
use std::process::ExitStatus;

use thiserror::Error;

use super::args::ArgumentError;
use super::context::CancelCause;

/// Error returned by a pipeline callback.
pub type PipelineError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from running a git command.
#[derive(Debug, Error)]
pub enum Error {
    #[error("broken command {command}: {}", join_problems(.problems))]
    BrokenCommand {
        command: String,
        problems: Vec<ArgumentError>,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("git command i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Run(#[from] RunError),
}

fn join_problems(problems: &[ArgumentError]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// The run error, if the process actually ran.
    pub fn as_run(&self) -> Option<&RunError> {
        match self {
            Error::Run(err) => Some(err),
            _ => None,
        }
    }

    /// Captured stderr text, empty unless the command captured it.
    pub fn stderr(&self) -> &str {
        self.as_run().map(RunError::stderr).unwrap_or("")
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.as_run().and_then(RunError::exit_code)
    }

    pub fn is_exit_code(&self, code: i32) -> bool {
        self.exit_code() == Some(code)
    }

    pub fn is_canceled_or_killed(&self) -> bool {
        self.as_run().is_some_and(RunError::is_canceled_or_killed)
    }
}

/// A git process that ran and did not succeed.
#[derive(Debug, Default)]
pub struct RunError {
    pub(crate) pipeline: Option<PipelineError>,
    pub(crate) cause: Option<CancelCause>,
    pub(crate) status: Option<ExitStatus>,
    pub(crate) io: Option<std::io::Error>,
    pub(crate) stderr: String,
}

impl RunError {
    /// Trimmed stderr captured from the process.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub(crate) fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.trim().to_string();
        self
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }

    /// Exit code of a process that exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|status| status.code())
    }

    pub fn is_exit_code(&self, code: i32) -> bool {
        self.exit_code() == Some(code)
    }

    /// Whether the process was terminated by a signal.
    #[cfg(unix)]
    pub fn killed_by_signal(&self) -> bool {
        use std::os::unix::process::ExitStatusExt;
        self.status.is_some_and(|status| status.signal().is_some())
    }

    #[cfg(not(unix))]
    pub fn killed_by_signal(&self) -> bool {
        false
    }

    /// Whether the process was stopped by cancellation, a deadline or a
    /// signal, as opposed to git reporting a failure.
    pub fn is_canceled_or_killed(&self) -> bool {
        matches!(
            self.cause,
            Some(CancelCause::Canceled | CancelCause::DeadlineExceeded)
        ) || self.killed_by_signal()
    }

    /// The error returned by the pipeline callback.
    pub fn pipeline_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.pipeline.as_deref()
    }

    pub fn into_pipeline_error(self) -> Option<PipelineError> {
        self.pipeline
    }

    pub fn cancel_cause(&self) -> Option<CancelCause> {
        self.cause
    }

    pub fn io_error(&self) -> Option<&std::io::Error> {
        self.io.as_ref()
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(err) = &self.pipeline {
            parts.push(err.to_string());
        }
        if let Some(cause) = self.cause {
            parts.push(cause.to_string());
        }
        if let Some(status) = self.status.filter(|status| !status.success()) {
            parts.push(status.to_string());
        }
        if let Some(err) = &self.io {
            parts.push(err.to_string());
        }
        if parts.is_empty() {
            parts.push("git command failed".to_string());
        }

        f.write_str(&parts.join("; "))?;
        if !self.stderr.is_empty() {
            write!(f, " - {}", self.stderr)?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Some(err) = &self.pipeline {
            return Some(err.as_ref());
        }
        self.io
            .as_ref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn status(raw: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(raw)
    }

    #[cfg(unix)]
    #[test]
    fn exit_code_and_stderr() {
        let err = RunError {
            status: Some(status(128 << 8)),
            ..Default::default()
        }
        .with_stderr("fatal: not a git repository\n");

        assert_eq!(err.exit_code(), Some(128));
        assert!(err.is_exit_code(128));
        assert!(!err.killed_by_signal());
        assert!(!err.is_canceled_or_killed());
        assert_eq!(
            err.to_string(),
            "exit status: 128 - fatal: not a git repository"
        );
    }

    #[cfg(unix)]
    #[test]
    fn signal_kill_is_canceled_or_killed() {
        let err = RunError {
            status: Some(status(9)),
            ..Default::default()
        };
        assert!(err.killed_by_signal());
        assert_eq!(err.exit_code(), None);
        assert!(err.is_canceled_or_killed());
    }

    #[test]
    fn deadline_is_canceled_or_killed() {
        let err = Error::Run(RunError {
            cause: Some(CancelCause::DeadlineExceeded),
            ..Default::default()
        });
        assert!(err.is_canceled_or_killed());
        assert!(err.to_string().contains("deadline exceeded"));
    }

    #[test]
    fn pipeline_error_is_reachable() {
        let err = RunError {
            pipeline: Some("read enough".into()),
            ..Default::default()
        };
        assert_eq!(err.pipeline_error().unwrap().to_string(), "read enough");
        assert!(!err.is_canceled_or_killed());
    }

    #[test]
    fn broken_command_lists_problems() {
        let err = Error::BrokenCommand {
            command: "git log".into(),
            problems: vec![
                ArgumentError::OptionLikeValue("-x".into()),
                ArgumentError::NotAnOption("y".into()),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("broken command git log: "));
        assert!(msg.contains("\"-x\""));
        assert!(msg.contains("\"y\""));
    }
}
