//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens what it needs from the library (a pool, a for-each-ref run)
//! 2. Formats and displays output
//! 3. Reports an exit code
//!
//! A missing object is an expected outcome: it is printed next to the
//! other results and turns the exit code to 1 instead of aborting.

mod info;
mod refs;
mod show;
mod stat;

pub use info::info;
pub use refs::refs;
pub use show::show;
pub use stat::stat;

use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;

use super::args::Command;
use super::Invocation;

/// Exit code when at least one requested object does not exist.
pub const EXIT_MISSING: u8 = 1;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, inv: &Invocation) -> Result<ExitCode> {
    match command {
        Command::Info { refs } => info::info(inv, &refs),
        Command::Show { rev } => show::show(inv, &rev),
        Command::Refs {
            fields,
            patterns,
            sort,
            count,
        } => refs::refs(inv, fields, patterns, sort, count),
        Command::Stat { base, head } => stat::stat(inv, &base, &head),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
