//! cli
//!
//! Command-line interface layer for gitpipe.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load settings and apply flag overrides
//! - Install the log subscriber
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, builds one
//! [`GitEnv`] and one cancellation [`Context`] for the process, and
//! dispatches to the handlers in [`commands`].

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::gitcmd::{Context, GitEnv};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "GITPIPE_LOG";

/// Everything a command handler needs.
#[derive(Debug)]
pub struct Invocation {
    /// Repository the command runs in
    pub repo: PathBuf,
    /// Print JSON instead of text
    pub json: bool,
    pub git: Arc<GitEnv>,
    pub ctx: Context,
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let config = Config::load().context("Failed to load configuration")?;
    if let Some(path) = config.loaded_from() {
        tracing::debug!(path = %path.display(), "loaded configuration");
    }

    // CLI flags take precedence over the settings file.
    let mut settings = config.settings;
    if let Some(git) = &cli.git {
        settings.git_path = Some(git.clone());
    }
    if let Some(secs) = cli.timeout {
        settings.default_timeout_secs = Some(secs);
    }
    settings.validate()?;

    let git = GitEnv::new(&settings).context("Failed to set up git")?;
    let repo = match cli.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let ctx = match cli.timeout.filter(|secs| *secs > 0) {
        Some(secs) => Context::background().with_timeout(Duration::from_secs(secs)),
        None => Context::background(),
    };

    let invocation = Invocation {
        repo,
        json: cli.json,
        git,
        ctx,
    };
    commands::dispatch(cli.command, &invocation)
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
