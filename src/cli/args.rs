//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Repository to operate on
//! - `--debug`: Enable debug logging
//! - `--git <path>`: git executable to use
//! - `--timeout <secs>`: Abort git commands after this long
//! - `--json`: Machine-readable output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gitpipe - Inspect a git repository through pooled git processes
#[derive(Parser, Debug)]
#[command(name = "gitpipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Repository to operate on (defaults to the current directory)
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// git executable to use instead of the one found on PATH
    #[arg(long, global = true, value_name = "PATH")]
    pub git: Option<PathBuf>,

    /// Abort git commands that run longer than this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show type and size of objects
    #[command(
        name = "info",
        long_about = "Show the id, type and size of each object.\n\n\
            Every revision is looked up through one shared cat-file --batch-check \
            session. A revision that names no object is reported as missing and \
            makes the command exit with status 1.",
        after_help = "\
EXAMPLES:
    gitpipe info HEAD HEAD^{tree}
    gitpipe --json info v1.0 main:README.md"
    )]
    Info {
        /// Revisions to look up
        #[arg(required = true, value_name = "REF")]
        refs: Vec<String>,
    },

    /// Write an object's payload to stdout
    #[command(name = "show")]
    Show {
        /// Revision to print
        #[arg(value_name = "REF")]
        rev: String,
    },

    /// List references with for-each-ref
    #[command(
        name = "refs",
        after_help = "\
EXAMPLES:
    gitpipe refs --pattern refs/tags/
    gitpipe refs --field refname:short --field objectname --sort=-creatordate"
    )]
    Refs {
        /// Field to print (repeatable)
        #[arg(long = "field", value_name = "FIELD")]
        fields: Vec<String>,

        /// Only list references matching this pattern (repeatable)
        #[arg(long = "pattern", value_name = "PATTERN")]
        patterns: Vec<String>,

        /// Sort key, e.g. refname or -creatordate
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<String>,

        /// Stop after this many references
        #[arg(long)]
        count: Option<usize>,
    },

    /// Summarize the diff between two revisions
    #[command(name = "stat")]
    Stat {
        /// Base revision
        base: String,

        /// Head revision
        head: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gitpipe", "info", "HEAD", "--json", "--timeout", "5"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.timeout, Some(5));
        match cli.command {
            Command::Info { refs } => assert_eq!(refs, ["HEAD"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn info_needs_a_ref() {
        assert!(Cli::try_parse_from(["gitpipe", "info"]).is_err());
    }

    #[test]
    fn refs_repeatable_flags() {
        let cli = Cli::try_parse_from([
            "gitpipe",
            "refs",
            "--field",
            "refname",
            "--field",
            "objecttype",
            "--pattern",
            "refs/heads/",
            "--sort",
            "-refname",
        ])
        .unwrap();
        match cli.command {
            Command::Refs {
                fields,
                patterns,
                sort,
                count,
            } => {
                assert_eq!(fields, ["refname", "objecttype"]);
                assert_eq!(patterns, ["refs/heads/"]);
                assert_eq!(sort.as_deref(), Some("-refname"));
                assert_eq!(count, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
