//! refs command - List references with for-each-ref

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use super::print_json;
use crate::cli::Invocation;
use crate::foreachref::{list_refs, Format, RefQuery};

/// Fields printed when none are requested.
pub const DEFAULT_FIELDS: &[&str] = &["objectname", "objecttype", "refname"];

/// Print one line per reference with the requested fields in order.
pub fn refs(
    inv: &Invocation,
    fields: Vec<String>,
    patterns: Vec<String>,
    sort: Option<String>,
    count: Option<usize>,
) -> Result<ExitCode> {
    let format = if fields.is_empty() {
        Format::new(DEFAULT_FIELDS.iter().copied())
    } else {
        Format::new(fields)
    };
    let query = RefQuery {
        sort,
        count,
        patterns,
    };
    let refs = list_refs(&inv.git, &inv.ctx, &inv.repo, &format, &query)
        .context("Failed to list references")?;

    if inv.json {
        print_json(&refs)?;
    } else {
        for parsed in &refs {
            let values: Vec<&str> = format
                .field_names()
                .iter()
                .map(|name| parsed.get(name).unwrap_or_default())
                .collect();
            println!("{}", values.join(" "));
        }
    }
    Ok(ExitCode::SUCCESS)
}
