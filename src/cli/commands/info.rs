//! info command - Show id, type and size of objects

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::{print_json, EXIT_MISSING};
use crate::catfile::{ObjectInfo, ObjectPool};
use crate::cli::Invocation;

#[derive(Debug, Serialize)]
struct InfoRecord<'a> {
    #[serde(rename = "ref")]
    rev: &'a str,
    #[serde(flatten)]
    info: Option<ObjectInfo>,
    missing: bool,
}

/// Look up every revision in `refs` through one batch-check session.
pub fn info(inv: &Invocation, refs: &[String]) -> Result<ExitCode> {
    let pool = ObjectPool::new(&inv.git, &inv.ctx, &inv.repo);
    let mut records = Vec::with_capacity(refs.len());

    for rev in refs {
        let info = match pool.object_info(rev) {
            Ok(info) => Some(info),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err).with_context(|| format!("Failed to look up '{rev}'")),
        };
        if !inv.json {
            match &info {
                Some(info) => println!("{} {} {}", info.id, info.kind, info.size),
                None => println!("{rev} missing"),
            }
        }
        records.push(InfoRecord {
            rev,
            missing: info.is_none(),
            info,
        });
    }

    if inv.json {
        print_json(&records)?;
    }
    let any_missing = records.iter().any(|record| record.missing);
    Ok(if any_missing {
        ExitCode::from(EXIT_MISSING)
    } else {
        ExitCode::SUCCESS
    })
}
