//! foreachref
//!
//! Structured output of `git for-each-ref`.
//!
//! A [`Format`] names the fields to request. Its [`flag`](Format::flag) is
//! passed to git and its [`parser`](Format::parser) reads the result back,
//! so the two cannot drift apart.
//!
//! ```
//! use gitpipe::foreachref::Format;
//!
//! let format = Format::new(["refname:short", "objecttype"]);
//! let output: &[u8] = b"refname:short main\x00objecttype commit\x00\x00\n";
//! let refs: Vec<_> = format.parser(output).collect::<Result<_, _>>().unwrap();
//! assert_eq!(refs[0].get("objecttype"), Some("commit"));
//! ```

pub mod format;
pub mod parser;

pub use format::Format;
pub use parser::{ParsedReference, Parser, MAX_BLOCK_SIZE};

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::gitcmd::{self, Command, Context, GitEnv};

#[derive(Debug, Error)]
pub enum RefParseError {
    #[error("unexpected number of reference fields: wanted {wanted}, was {found}")]
    FieldCount { wanted: usize, found: usize },

    #[error("unexpected field name at position {position}: wanted '{wanted}', was '{found}'")]
    FieldName {
        position: usize,
        wanted: String,
        found: String,
    },

    #[error("reference block larger than {0} bytes")]
    TooLarge(usize),

    #[error("reading for-each-ref output: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Command(#[from] gitcmd::Error),
}

/// Which references to list and in what order.
#[derive(Debug, Clone, Default)]
pub struct RefQuery {
    /// Passed as `--sort=<key>`; a leading `-` reverses the order.
    pub sort: Option<String>,
    /// Stop after this many references.
    pub count: Option<usize>,
    /// Ref patterns such as `refs/tags/`. Empty lists every reference.
    pub patterns: Vec<String>,
}

/// Run `git for-each-ref` in `repo` and parse its output as it streams in.
pub fn list_refs(
    env: &Arc<GitEnv>,
    ctx: &Context,
    repo: &Path,
    format: &Format,
    query: &RefQuery,
) -> Result<Vec<ParsedReference>, RefParseError> {
    let mut cmd = Command::new(env);
    cmd.add_arguments(["for-each-ref"])
        .add_option_format("--format={}", &[&format.flag()]);
    if let Some(sort) = &query.sort {
        cmd.add_option_format("--sort={}", &[sort]);
    }
    if let Some(count) = query.count {
        cmd.add_option_format("--count={}", &[&count]);
    }
    cmd.add_dynamic_arguments(&query.patterns).with_dir(repo);

    let stdout = cmd.make_stdout_pipe()?;
    cmd.start_with_stderr(ctx)?;
    // dropping the parser closes our end, so git cannot block on a full pipe
    let parsed: Result<Vec<_>, _> = format.parser(BufReader::new(stdout)).collect();
    let waited = cmd.wait_with_stderr();

    let refs = parsed?;
    waited?;
    tracing::debug!(repo = %repo.display(), refs = refs.len(), "listed references");
    Ok(refs)
}
