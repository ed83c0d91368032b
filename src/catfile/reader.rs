//! catfile::reader
//!
//! Readers for cat-file batch output.
//!
//! These work on the raw session stream: they know the declared payload
//! size and leave the stream positioned at the next response, trailing
//! newline included.

use std::io::{self, BufRead, Read};

use serde::Serialize;

use super::CatFileError;
use crate::core::types::{ObjectFormat, ObjectId, ObjectType, TypeError};

/// Decoded header of one batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub kind: ObjectType,
    pub size: u64,
}

/// Read one `<oid> <type> <size>` header line.
///
/// A lone newline before the header is skipped once. A `<rev> missing`
/// line becomes [`CatFileError::NotFound`] carrying the revision.
pub fn read_batch_line<R: BufRead>(rd: &mut R) -> Result<ObjectInfo, CatFileError> {
    let mut line = String::new();
    read_line(rd, &mut line)?;
    if line.len() <= 1 {
        line.clear();
        read_line(rd, &mut line)?;
    }
    let line = line.strip_suffix('\n').unwrap_or(&line);

    if let Some((rev, status)) = line.rsplit_once(' ') {
        if status == "missing" || status == "ambiguous" {
            tracing::debug!(rev, status, "cat-file could not resolve revision");
            return Err(CatFileError::NotFound {
                id: rev.to_string(),
            });
        }
    }

    let mut parts = line.splitn(3, ' ');
    let (Some(id), Some(kind), Some(size)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CatFileError::Protocol(format!("unexpected header {line:?}")));
    };

    Ok(ObjectInfo {
        id: ObjectId::new(id).map_err(|e| CatFileError::Protocol(e.to_string()))?,
        kind: kind
            .parse()
            .map_err(|e: TypeError| CatFileError::Protocol(e.to_string()))?,
        size: size
            .parse()
            .map_err(|_| CatFileError::Protocol(format!("invalid object size {size:?}")))?,
    })
}

fn read_line<R: BufRead>(rd: &mut R, line: &mut String) -> Result<(), CatFileError> {
    if rd.read_line(line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "cat-file output ended").into());
    }
    Ok(())
}

/// Skip exactly `n` bytes.
///
/// Works through the reader's buffer one fill at a time, so any 64-bit
/// count is fine.
pub fn discard_full<R: BufRead>(rd: &mut R, mut n: u64) -> io::Result<()> {
    while n > 0 {
        let available = rd.fill_buf()?.len();
        if available == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{n} bytes left to discard"),
            ));
        }
        let step = available.min(usize::try_from(n).unwrap_or(usize::MAX));
        rd.consume(step);
        n -= step as u64;
    }
    Ok(())
}

/// Find the `object <id>` header of a tag payload of `size` bytes and
/// skip the rest of the payload.
pub fn read_tag_object_id<R: BufRead>(rd: &mut R, size: u64) -> Result<ObjectId, CatFileError> {
    read_header_id(rd, size, "object")
}

/// Find the `tree <id>` header of a commit payload of `size` bytes and
/// skip the rest of the payload.
pub fn read_tree_id<R: BufRead>(rd: &mut R, size: u64) -> Result<ObjectId, CatFileError> {
    read_header_id(rd, size, "tree")
}

fn read_header_id<R: BufRead>(
    rd: &mut R,
    size: u64,
    key: &str,
) -> Result<ObjectId, CatFileError> {
    let mut read = 0u64;
    let mut found = None;
    let mut line = Vec::new();

    // headers end at the first blank line
    while read < size && found.is_none() {
        line.clear();
        let n = rd.by_ref().take(size - read).read_until(b'\n', &mut line)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "payload ended early").into());
        }
        read += n as u64;
        if line == b"\n" {
            break;
        }
        if let Some(value) = line
            .strip_prefix(key.as_bytes())
            .and_then(|rest| rest.strip_prefix(b" "))
        {
            let value = value.strip_suffix(b"\n").unwrap_or(value);
            found = Some(String::from_utf8_lossy(value).into_owned());
        }
    }

    // the rest of the payload plus its trailing newline
    discard_full(rd, size - read + 1)?;

    let value = found.ok_or_else(|| CatFileError::Protocol(format!("no {key} header in payload")))?;
    ObjectId::new(value).map_err(|e| CatFileError::Protocol(e.to_string()))
}

/// Reusable buffers for [`parse_tree_entry`].
#[derive(Debug, Default, Clone)]
pub struct TreeEntryBuf {
    pub mode: Vec<u8>,
    pub name: Vec<u8>,
    pub hash: Vec<u8>,
}

/// Parse one `<mode> SP <name> NUL <raw hash>` tree record into `buf`,
/// returning the number of bytes consumed.
///
/// The buffers are overwritten, never reallocated once large enough, so a
/// caller walking a whole tree reuses one [`TreeEntryBuf`].
pub fn parse_tree_entry<R: BufRead>(
    format: ObjectFormat,
    rd: &mut R,
    buf: &mut TreeEntryBuf,
) -> Result<usize, CatFileError> {
    buf.mode.clear();
    buf.name.clear();

    let mode_len = rd.read_until(b' ', &mut buf.mode)?;
    if buf.mode.pop() != Some(b' ') {
        return Err(CatFileError::Protocol(format!(
            "tree entry mode not terminated: {:?}",
            String::from_utf8_lossy(&buf.mode)
        )));
    }

    // read_until keeps filling the buffer until NUL, however long the name
    let name_len = rd.read_until(0, &mut buf.name)?;
    if buf.name.pop() != Some(0) {
        return Err(CatFileError::Protocol("tree entry name not terminated".into()));
    }

    buf.hash.resize(format.raw_len(), 0);
    rd.read_exact(&mut buf.hash)?;

    Ok(mode_len + name_len + format.raw_len())
}

/// One entry of a tree object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub mode: String,
    pub name: String,
    pub id: ObjectId,
}

impl TreeEntry {
    /// The object type implied by the entry mode.
    pub fn kind(&self) -> ObjectType {
        match self.mode.as_str() {
            "40000" => ObjectType::Tree,
            "160000" => ObjectType::Commit,
            _ => ObjectType::Blob,
        }
    }
}

/// Read every entry of a tree payload of `size` bytes, then skip the
/// trailing newline.
pub fn read_tree_entries<R: BufRead>(
    format: ObjectFormat,
    rd: &mut R,
    size: u64,
) -> Result<Vec<TreeEntry>, CatFileError> {
    let mut entries = Vec::new();
    let mut buf = TreeEntryBuf::default();
    let mut read = 0u64;

    while read < size {
        read += parse_tree_entry(format, rd, &mut buf)? as u64;
        entries.push(TreeEntry {
            mode: String::from_utf8_lossy(&buf.mode).into_owned(),
            name: String::from_utf8_lossy(&buf.name).into_owned(),
            id: ObjectId::from_raw(&buf.hash).map_err(|e| CatFileError::Protocol(e.to_string()))?,
        });
    }
    if read != size {
        return Err(CatFileError::Protocol(format!(
            "tree entries overran payload: {read} of {size} bytes"
        )));
    }

    discard_full(rd, 1)?;
    Ok(entries)
}
