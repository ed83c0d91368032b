//! catfile::batch
//!
//! One live `git cat-file --batch` or `--batch-check` process.

use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use super::reader::{read_batch_line, ObjectInfo};
use super::CatFileError;
use crate::gitcmd::{Command, Context, GitEnv, PipeReader, PipeWriter};

/// Which batch protocol a session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// `--batch`: header and payload.
    Contents,
    /// `--batch-check`: header only.
    Check,
}

impl BatchKind {
    fn flag(self) -> &'static str {
        match self {
            BatchKind::Contents => "--batch",
            BatchKind::Check => "--batch-check",
        }
    }
}

/// Fail unless `repo` is inside a git repository.
pub fn ensure_valid_git_repository(
    env: &Arc<GitEnv>,
    ctx: &Context,
    repo: &Path,
) -> Result<(), CatFileError> {
    Command::new(env)
        .add_arguments(["rev-parse"])
        .with_dir(repo)
        .run_with_stderr(ctx)
        .map_err(|source| CatFileError::InvalidRepository {
            path: repo.to_path_buf(),
            source,
        })
}

/// A running cat-file process with its request and response pipes.
///
/// The session is a strict request/response channel: after
/// [`request`](Self::request) in [`BatchKind::Contents`] mode the caller
/// must consume the payload and its trailing newline from
/// [`reader`](Self::reader) before the next request.
#[derive(Debug)]
pub struct BatchSession {
    kind: BatchKind,
    ctx: Context,
    cmd: Command,
    writer: PipeWriter,
    reader: BufReader<PipeReader>,
}

impl BatchSession {
    /// Start a session in `repo`.
    ///
    /// The process lives until [`close`](Self::close), drop, or
    /// cancellation of `ctx`; per-command timeouts do not apply to it.
    pub fn spawn(
        env: &Arc<GitEnv>,
        ctx: &Context,
        repo: &Path,
        kind: BatchKind,
    ) -> Result<Self, CatFileError> {
        ensure_valid_git_repository(env, ctx, repo)?;

        let ctx = ctx.child();
        let mut cmd = Command::new(env);
        cmd.add_arguments(["cat-file", kind.flag()])
            .with_dir(repo)
            .use_context_timeout();
        let (writer, reader) = cmd.make_stdin_stdout_pipe()?;
        cmd.start(&ctx)?;

        tracing::debug!(repo = %repo.display(), mode = kind.flag(), "opened cat-file session");
        Ok(Self {
            kind,
            ctx,
            cmd,
            writer,
            reader: BufReader::new(reader),
        })
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    /// Send one revision and read its header.
    ///
    /// A revision containing a newline cannot be framed as one request
    /// and is rejected without being sent.
    pub fn request(&mut self, rev: &str) -> Result<ObjectInfo, CatFileError> {
        if rev.contains(['\n', '\r']) {
            return Err(CatFileError::InvalidRevision(rev.to_string()));
        }
        let mut line = Vec::with_capacity(rev.len() + 1);
        line.extend_from_slice(rev.as_bytes());
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;

        read_batch_line(&mut self.reader)
    }

    /// The response stream.
    pub fn reader(&mut self) -> &mut BufReader<PipeReader> {
        &mut self.reader
    }

    pub fn is_alive(&self) -> bool {
        !self.ctx.is_done()
    }

    /// Kill the process and reap it.
    pub fn close(mut self) {
        self.ctx.cancel();
        self.writer.close();
        if let Err(err) = self.cmd.wait() {
            if !err.is_canceled_or_killed() {
                tracing::debug!(error = %err, "cat-file session exited with error");
            }
        }
    }
}
