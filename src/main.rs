//! gitpipe binary entry point.

use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    gitpipe::cli::run()
}
