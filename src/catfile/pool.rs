//! catfile::pool
//!
//! Reusable cat-file sessions for one repository.
//!
//! # Concurrency
//!
//! The pool is shared between threads. Each session serves one request at
//! a time: acquiring takes it out of its slot and releasing puts it back.
//! The scan for a free session and the creation of a new one happen under
//! the same lock, so two callers never end up with the same session.
//!
//! # Draining
//!
//! An [`ObjectReader`] owns its session until dropped. On drop the unread
//! payload and its trailing newline are skipped so the session is back in
//! sync. A session that cannot be drained, or that has more than
//! [`MAX_DRAIN`] bytes left, is killed instead of being returned.

use std::io::{self, BufRead, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::batch::{BatchKind, BatchSession};
use super::reader::{discard_full, read_tag_object_id, read_tree_entries, read_tree_id, ObjectInfo, TreeEntry};
use super::CatFileError;
use crate::core::types::{ObjectId, ObjectType};
use crate::gitcmd::{Context, GitEnv};

/// Largest unread payload skipped on drop before killing the session.
pub const MAX_DRAIN: u64 = 1 << 20;

struct Slot {
    id: u64,
    /// `None` while the session is lent out.
    session: Option<BatchSession>,
}

struct Lease {
    kind: BatchKind,
    id: u64,
    session: BatchSession,
}

/// Pooled `--batch` and `--batch-check` sessions for one repository.
pub struct ObjectPool {
    env: Arc<GitEnv>,
    repo: PathBuf,
    ctx: Context,
    next_id: AtomicU64,
    contents: Mutex<Vec<Slot>>,
    check: Mutex<Vec<Slot>>,
}

impl ObjectPool {
    /// A pool for `repo`. Sessions are spawned on first use and live as
    /// long as `ctx` and the pool.
    pub fn new(env: &Arc<GitEnv>, ctx: &Context, repo: impl AsRef<Path>) -> Self {
        Self {
            env: Arc::clone(env),
            repo: repo.as_ref().to_path_buf(),
            ctx: ctx.child(),
            next_id: AtomicU64::new(0),
            contents: Mutex::new(Vec::new()),
            check: Mutex::new(Vec::new()),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo
    }

    fn slots(&self, kind: BatchKind) -> MutexGuard<'_, Vec<Slot>> {
        let slots = match kind {
            BatchKind::Contents => &self.contents,
            BatchKind::Check => &self.check,
        };
        slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of sessions of `kind`, busy or idle.
    pub fn session_count(&self, kind: BatchKind) -> usize {
        self.slots(kind).len()
    }

    fn acquire(&self, kind: BatchKind) -> Result<Lease, CatFileError> {
        if let Some(cause) = self.ctx.cause() {
            return Err(CatFileError::Closed(cause));
        }

        let mut slots = self.slots(kind);
        if let Some((id, session)) = slots
            .iter_mut()
            .find_map(|slot| slot.session.take().map(|session| (slot.id, session)))
        {
            return Ok(Lease { kind, id, session });
        }

        let session = BatchSession::spawn(&self.env, &self.ctx, &self.repo, kind)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        slots.push(Slot { id, session: None });
        if slots.len() > 1 {
            tracing::warn!(
                repo = %self.repo.display(),
                sessions = slots.len(),
                ?kind,
                "more than one cat-file session in use at once"
            );
        }
        Ok(Lease { kind, id, session })
    }

    fn release(&self, lease: Lease) {
        let Lease { kind, id, session } = lease;
        let unwanted = {
            let mut slots = self.slots(kind);
            match slots.iter_mut().find(|slot| slot.id == id) {
                Some(slot) if !self.ctx.is_done() => {
                    slot.session = Some(session);
                    None
                }
                _ => Some(session),
            }
        };
        if let Some(session) = unwanted {
            session.close();
        }
    }

    fn discard(&self, lease: Lease) {
        tracing::debug!(repo = %self.repo.display(), kind = ?lease.kind, "dropping out-of-sync cat-file session");
        self.slots(lease.kind).retain(|slot| slot.id != lease.id);
        lease.session.close();
    }

    fn settle(&self, lease: Lease, in_sync: bool) {
        if in_sync {
            self.release(lease);
        } else {
            self.discard(lease);
        }
    }

    /// Look up the header of `rev` without reading its payload.
    pub fn object_info(&self, rev: &str) -> Result<ObjectInfo, CatFileError> {
        let mut lease = self.acquire(BatchKind::Check)?;
        let result = lease.session.request(rev);
        let in_sync = match &result {
            Ok(_) => true,
            Err(err) => err.keeps_session(),
        };
        self.settle(lease, in_sync);
        result
    }

    /// Look up `rev` and return its header plus a reader over its payload.
    ///
    /// The session stays out of the pool until the reader is dropped or
    /// closed.
    pub fn object(&self, rev: &str) -> Result<(ObjectInfo, ObjectReader<'_>), CatFileError> {
        let mut lease = self.acquire(BatchKind::Contents)?;
        match lease.session.request(rev) {
            Ok(info) => {
                let reader = ObjectReader {
                    pool: self,
                    lease: Some(lease),
                    remaining: info.size,
                };
                Ok((info, reader))
            }
            Err(err) => {
                self.settle(lease, err.keeps_session());
                Err(err)
            }
        }
    }

    /// Read the whole payload of `rev`.
    pub fn object_bytes(&self, rev: &str) -> Result<(ObjectInfo, Vec<u8>), CatFileError> {
        let (info, mut reader) = self.object(rev)?;
        let mut payload = Vec::with_capacity(usize::try_from(info.size).unwrap_or(0));
        reader.read_to_end(&mut payload)?;
        reader.close()?;
        Ok((info, payload))
    }

    fn with_payload<T>(
        &self,
        rev: &str,
        expect: ObjectType,
        read: impl FnOnce(&ObjectInfo, &mut BatchSession) -> Result<T, CatFileError>,
    ) -> Result<T, CatFileError> {
        let mut lease = self.acquire(BatchKind::Contents)?;
        let (result, in_sync) = match lease.session.request(rev) {
            Err(err) => {
                let in_sync = err.keeps_session();
                (Err(err), in_sync)
            }
            Ok(info) if info.kind != expect => {
                match discard_full(lease.session.reader(), info.size + 1) {
                    Ok(()) => (
                        Err(CatFileError::Protocol(format!(
                            "{rev} is a {}, expected a {expect}",
                            info.kind
                        ))),
                        true,
                    ),
                    Err(err) => (Err(err.into()), false),
                }
            }
            Ok(info) => {
                let result = read(&info, &mut lease.session);
                let in_sync = result.is_ok();
                (result, in_sync)
            }
        };
        self.settle(lease, in_sync);
        result
    }

    /// The object a tag points at.
    pub fn tag_object_id(&self, rev: &str) -> Result<ObjectId, CatFileError> {
        self.with_payload(rev, ObjectType::Tag, |info, session| {
            read_tag_object_id(session.reader(), info.size)
        })
    }

    /// The root tree of a commit.
    pub fn tree_id(&self, rev: &str) -> Result<ObjectId, CatFileError> {
        self.with_payload(rev, ObjectType::Commit, |info, session| {
            read_tree_id(session.reader(), info.size)
        })
    }

    /// The entries of a tree object.
    pub fn tree_entries(&self, rev: &str) -> Result<Vec<TreeEntry>, CatFileError> {
        self.with_payload(rev, ObjectType::Tree, |info, session| {
            read_tree_entries(info.id.format(), session.reader(), info.size)
        })
    }

    /// Kill every session. Later requests fail with
    /// [`CatFileError::Closed`]; sessions still lent out are killed and
    /// closed when their reader is dropped.
    pub fn close(&self) {
        self.ctx.cancel();
        for kind in [BatchKind::Contents, BatchKind::Check] {
            let slots = std::mem::take(&mut *self.slots(kind));
            for session in slots.into_iter().filter_map(|slot| slot.session) {
                session.close();
            }
        }
    }
}

impl Drop for ObjectPool {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("repo", &self.repo)
            .field("batch", &self.session_count(BatchKind::Contents))
            .field("batch_check", &self.session_count(BatchKind::Check))
            .finish()
    }
}

/// The payload of one object, bound to the session it is read from.
///
/// Reads end at the declared object size. Dropping the reader returns the
/// session to its pool.
pub struct ObjectReader<'a> {
    pool: &'a ObjectPool,
    lease: Option<Lease>,
    remaining: u64,
}

impl ObjectReader<'_> {
    /// Payload bytes not read yet.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Skip the unread payload and return the session, reporting a
    /// failure to drain.
    pub fn close(mut self) -> Result<(), CatFileError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), CatFileError> {
        let Some(mut lease) = self.lease.take() else {
            return Ok(());
        };
        if self.remaining > MAX_DRAIN {
            self.pool.discard(lease);
            return Ok(());
        }

        let drained = discard_full(lease.session.reader(), self.remaining + 1);
        self.remaining = 0;
        match drained {
            Ok(()) => {
                self.pool.release(lease);
                Ok(())
            }
            Err(err) => {
                self.pool.discard(lease);
                Err(err.into())
            }
        }
    }
}

impl Read for ObjectReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for ObjectReader<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let limit = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        let Some(lease) = self.lease.as_mut().filter(|_| limit > 0) else {
            return Ok(&[]);
        };
        let buf = lease.session.reader().fill_buf()?;
        if buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "cat-file output ended inside an object",
            ));
        }
        Ok(&buf[..buf.len().min(limit)])
    }

    fn consume(&mut self, amt: usize) {
        if let Some(lease) = self.lease.as_mut() {
            lease.session.reader().consume(amt);
            self.remaining -= amt as u64;
        }
    }
}

impl Drop for ObjectReader<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            tracing::debug!(error = %err, "failed to drain cat-file payload");
        }
    }
}

impl std::fmt::Debug for ObjectReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}
