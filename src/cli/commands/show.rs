//! show command - Write an object's payload to stdout

use std::io::{self, Read, Write};
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::{print_json, EXIT_MISSING};
use crate::catfile::{ObjectInfo, ObjectPool};
use crate::cli::Invocation;

#[derive(Debug, Serialize)]
struct ShowRecord {
    #[serde(flatten)]
    info: ObjectInfo,
    content: String,
}

/// Stream the payload of `rev`. With `--json` the payload is decoded as
/// lossy UTF-8 and printed next to the header.
pub fn show(inv: &Invocation, rev: &str) -> Result<ExitCode> {
    let pool = ObjectPool::new(&inv.git, &inv.ctx, &inv.repo);
    let (info, mut reader) = match pool.object(rev) {
        Ok(found) => found,
        Err(err) if err.is_not_found() => {
            eprintln!("{rev}: object not found");
            return Ok(ExitCode::from(EXIT_MISSING));
        }
        Err(err) => return Err(err).with_context(|| format!("Failed to read '{rev}'")),
    };

    if inv.json {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        reader.close()?;
        print_json(&ShowRecord {
            info,
            content: String::from_utf8_lossy(&payload).into_owned(),
        })?;
    } else {
        let mut stdout = io::stdout().lock();
        io::copy(&mut reader, &mut stdout).context("Failed to write object")?;
        stdout.flush()?;
        reader.close()?;
    }
    Ok(ExitCode::SUCCESS)
}
