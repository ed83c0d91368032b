//! gitcmd::pipe
//!
//! Parent-side pipe ends and capture buffers for git subprocesses.
//!
//! The parent end of every pipe handed out by a command is shared with the
//! command itself, so that `wait` can close it after a pipeline callback
//! and unblock a child still writing into it. Closing is idempotent: the
//! caller and the command may both close the same end.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Slot<T> = Arc<Mutex<Option<T>>>;

fn lock<T>(slot: &Slot<T>) -> MutexGuard<'_, Option<T>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create an OS pipe, returning the shared parent read end and the raw
/// child write end.
pub(crate) fn reader_pipe() -> io::Result<(PipeReader, io::PipeWriter)> {
    let (reader, writer) = io::pipe()?;
    Ok((PipeReader(Arc::new(Mutex::new(Some(reader)))), writer))
}

/// Create an OS pipe, returning the shared parent write end and the raw
/// child read end.
pub(crate) fn writer_pipe() -> io::Result<(PipeWriter, io::PipeReader)> {
    let (reader, writer) = io::pipe()?;
    Ok((PipeWriter(Arc::new(Mutex::new(Some(writer)))), reader))
}

/// Parent read end of a child's stdout or stderr.
///
/// Reads after [`close`](Self::close) return end-of-file.
#[derive(Debug)]
pub struct PipeReader(Slot<io::PipeReader>);

impl PipeReader {
    /// Close the pipe. Safe to call more than once.
    pub fn close(&self) {
        lock(&self.0).take();
    }

    pub fn closer(&self) -> PipeCloser {
        PipeCloser(Closer::Reader(Arc::clone(&self.0)))
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match lock(&self.0).as_mut() {
            Some(reader) => reader.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parent write end of a child's stdin.
///
/// Writes after [`close`](Self::close) fail with `BrokenPipe`.
#[derive(Debug)]
pub struct PipeWriter(Slot<io::PipeWriter>);

impl PipeWriter {
    /// Close the pipe, signalling end-of-input to the child.
    pub fn close(&self) {
        lock(&self.0).take();
    }

    pub fn closer(&self) -> PipeCloser {
        PipeCloser(Closer::Writer(Arc::clone(&self.0)))
    }
}

fn closed_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "pipe is closed")
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match lock(&self.0).as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(closed_pipe()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.0).as_mut() {
            Some(writer) => writer.flush(),
            None => Err(closed_pipe()),
        }
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, Clone)]
enum Closer {
    Reader(Slot<io::PipeReader>),
    Writer(Slot<io::PipeWriter>),
}

/// Idempotent close handle for either end of a pipe.
#[derive(Debug, Clone)]
pub struct PipeCloser(Closer);

impl PipeCloser {
    pub fn close(&self) {
        match &self.0 {
            Closer::Reader(slot) => drop(lock(slot).take()),
            Closer::Writer(slot) => drop(lock(slot).take()),
        }
    }

    pub(crate) fn is_writer(&self) -> bool {
        matches!(self.0, Closer::Writer(_))
    }

    /// Read a still open reader end to end-of-file, throwing the data
    /// away. Writer ends are left alone.
    pub(crate) fn discard(&self) -> io::Result<u64> {
        match &self.0 {
            Closer::Reader(slot) => match lock(slot).as_mut() {
                Some(reader) => io::copy(reader, &mut io::sink()),
                None => Ok(0),
            },
            Closer::Writer(_) => Ok(0),
        }
    }
}

/// A byte buffer shared between a command and its caller.
///
/// The command appends the child's output on a copy thread; the caller
/// reads it once the command has been waited on.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current contents.
    pub fn bytes(&self) -> Vec<u8> {
        lock_buffer(&self.0).clone()
    }

    /// Take the contents, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *lock_buffer(&self.0))
    }

    /// The contents as text, with invalid UTF-8 replaced.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&lock_buffer(&self.0)).into_owned()
    }

    pub fn len(&self) -> usize {
        lock_buffer(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_buffer(buf: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock_buffer(&self.0).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_child_writes_then_eof() {
        let (mut reader, mut child_end) = reader_pipe().unwrap();
        child_end.write_all(b"hello").unwrap();
        drop(child_end);

        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn closed_reader_reads_eof() {
        let (mut reader, _child_end) = reader_pipe().unwrap();
        let closer = reader.closer();
        closer.close();
        closer.close();
        reader.close();

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn closing_writer_signals_eof_to_child_end() {
        let (mut writer, mut child_end) = writer_pipe().unwrap();
        writer.write_all(b"abc").unwrap();
        writer.closer().close();

        let mut out = Vec::new();
        child_end.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
        assert_eq!(
            writer.write(b"x").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }

    #[test]
    fn discard_reads_to_eof() {
        let (mut reader, mut child_end) = reader_pipe().unwrap();
        child_end.write_all(b"unread output").unwrap();
        drop(child_end);

        let closer = reader.closer();
        assert!(!closer.is_writer());
        assert_eq!(closer.discard().unwrap(), 13);
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);

        let (writer, _child_end) = writer_pipe().unwrap();
        assert!(writer.closer().is_writer());
        assert_eq!(writer.closer().discard().unwrap(), 0);
    }

    #[test]
    fn shared_buffer_is_shared() {
        let buf = SharedBuffer::new();
        let mut sink = buf.clone();
        sink.write_all(b"out").unwrap();
        assert_eq!(buf.bytes(), b"out");
        assert_eq!(buf.take(), b"out");
        assert!(buf.is_empty());
    }
}
