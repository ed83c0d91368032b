//! stat command - Summarize the diff between two revisions

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use super::print_json;
use crate::cli::Invocation;
use crate::diffstat::diff_short_stat;

pub fn stat(inv: &Invocation, base: &str, head: &str) -> Result<ExitCode> {
    let stat = diff_short_stat(&inv.git, &inv.ctx, &inv.repo, base, head)
        .with_context(|| format!("Failed to diff {base}..{head}"))?;

    if inv.json {
        print_json(&stat)?;
    } else {
        println!(
            "{} files changed, {} insertions(+), {} deletions(-)",
            stat.files, stat.additions, stat.deletions
        );
    }
    Ok(ExitCode::SUCCESS)
}
