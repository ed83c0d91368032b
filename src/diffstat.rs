//! diffstat
//!
//! `git diff --shortstat` between two revisions.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::gitcmd::{self, Command, Context, GitEnv};

static SHORTSTAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(\d+) files? changed(?:, (\d+) insertions?\(\+\))?(?:, (\d+) deletions?\(-\))?")
        .expect("shortstat pattern compiles")
});

#[derive(Debug, Error)]
pub enum DiffStatError {
    #[error("unable to parse shortstat output: {0:?}")]
    Unparseable(String),

    #[error("shortstat count out of range: {0}")]
    Count(#[from] std::num::ParseIntError),

    #[error(transparent)]
    Command(#[from] gitcmd::Error),
}

/// Totals of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub files: u64,
    pub additions: u64,
    pub deletions: u64,
}

/// Parse one line of `git diff --shortstat` output.
///
/// Git prints nothing for an empty diff, which parses as all zeros.
///
/// ```
/// use gitpipe::diffstat::{parse_diff_stat, DiffStat};
///
/// let stat = parse_diff_stat(" 3 files changed, 10 insertions(+), 1 deletion(-)\n").unwrap();
/// assert_eq!(stat, DiffStat { files: 3, additions: 10, deletions: 1 });
/// ```
pub fn parse_diff_stat(text: &str) -> Result<DiffStat, DiffStatError> {
    if text.is_empty() || text == "\n" {
        return Ok(DiffStat::default());
    }
    let caps = SHORTSTAT
        .captures(text)
        .ok_or_else(|| DiffStatError::Unparseable(text.to_string()))?;

    let count = |idx: usize| -> Result<u64, DiffStatError> {
        match caps.get(idx) {
            Some(m) => Ok(m.as_str().parse()?),
            None => Ok(0),
        }
    };
    Ok(DiffStat {
        files: count(1)?,
        additions: count(2)?,
        deletions: count(3)?,
    })
}

/// Diff totals for `base..head` in `repo`.
pub fn diff_short_stat(
    env: &Arc<GitEnv>,
    ctx: &Context,
    repo: &Path,
    base: &str,
    head: &str,
) -> Result<DiffStat, DiffStatError> {
    let output = Command::new(env)
        .add_arguments(["diff", "--shortstat"])
        .add_dynamic_arguments([format!("{base}..{head}")])
        .with_dir(repo)
        .run_std_string(ctx)?;
    parse_diff_stat(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_is_zero() {
        assert_eq!(parse_diff_stat("").unwrap(), DiffStat::default());
        assert_eq!(parse_diff_stat("\n").unwrap(), DiffStat::default());
    }

    #[test]
    fn singular_forms() {
        let stat = parse_diff_stat(" 1 file changed, 1 insertion(+), 1 deletion(-)\n").unwrap();
        assert_eq!(
            stat,
            DiffStat {
                files: 1,
                additions: 1,
                deletions: 1
            }
        );
    }

    #[test]
    fn insertions_only() {
        let stat = parse_diff_stat(" 2 files changed, 7 insertions(+)\n").unwrap();
        assert_eq!(stat.files, 2);
        assert_eq!(stat.additions, 7);
        assert_eq!(stat.deletions, 0);
    }

    #[test]
    fn deletions_only() {
        let stat = parse_diff_stat(" 4 files changed, 12 deletions(-)\n").unwrap();
        assert_eq!(stat.files, 4);
        assert_eq!(stat.additions, 0);
        assert_eq!(stat.deletions, 12);
    }

    #[test]
    fn garbage_is_an_error() {
        let err = parse_diff_stat("fatal: bad revision\n").unwrap_err();
        assert!(matches!(err, DiffStatError::Unparseable(_)));
    }

    #[test]
    fn overflow_is_an_error() {
        let err = parse_diff_stat(" 99999999999999999999999 files changed\n").unwrap_err();
        assert!(matches!(err, DiffStatError::Count(_)));
    }
}
