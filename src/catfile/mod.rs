//! catfile
//!
//! Persistent `git cat-file --batch` and `--batch-check` sessions.
//!
//! # Protocol
//!
//! A request is one line, `<rev>\n`, written to the session's stdin. The
//! answer is a header line `<oid> <type> <size>\n`; in `--batch` mode it is
//! followed by exactly `<size>` payload bytes and a newline. An unknown
//! revision is answered with `<rev> missing\n` and no payload.
//!
//! The protocol is strictly one request at a time per session, so every
//! payload must be fully consumed before the next request. [`ObjectPool`]
//! enforces this by draining unread payload when an [`ObjectReader`] is
//! dropped.
//!
//! # Modules
//!
//! - [`reader`] - header, tag, commit and tree payload readers
//! - [`batch`] - one live cat-file process
//! - [`pool`] - reusable sessions per repository

pub mod batch;
pub mod pool;
pub mod reader;

pub use batch::{ensure_valid_git_repository, BatchKind, BatchSession};
pub use pool::{ObjectPool, ObjectReader};
pub use reader::{
    discard_full, parse_tree_entry, read_batch_line, read_tag_object_id, read_tree_entries,
    read_tree_id, ObjectInfo, TreeEntry, TreeEntryBuf,
};

use std::path::PathBuf;

use thiserror::Error;

use crate::gitcmd::{self, CancelCause};

/// Errors from cat-file sessions and their output.
#[derive(Debug, Error)]
pub enum CatFileError {
    /// The revision does not name an object.
    #[error("object does not exist [id: {id}]")]
    NotFound { id: String },

    /// The output did not follow the batch protocol.
    #[error("malformed cat-file output: {0}")]
    Protocol(String),

    /// The revision cannot be sent as one request line.
    #[error("invalid revision {0:?}")]
    InvalidRevision(String),

    #[error("not a valid git repository '{path}': {source}")]
    InvalidRepository {
        path: PathBuf,
        source: gitcmd::Error,
    },

    /// The pool was closed or its context is done.
    #[error("object pool is closed: {0}")]
    Closed(CancelCause),

    #[error(transparent)]
    Command(#[from] gitcmd::Error),

    #[error("cat-file i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CatFileError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatFileError::NotFound { .. })
    }

    /// Whether the session that produced this error is still in sync.
    pub(crate) fn keeps_session(&self) -> bool {
        matches!(
            self,
            CatFileError::NotFound { .. } | CatFileError::InvalidRevision(_)
        )
    }
}
