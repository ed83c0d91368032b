//! foreachref::parser
//!
//! Streaming parser for `git for-each-ref` output.

use std::collections::BTreeMap;
use std::io::{BufRead, Read};

use serde::Serialize;

use super::format::{Format, FIELD_DELIM, REF_DELIM};
use super::RefParseError;

/// Largest accepted reference block.
pub const MAX_BLOCK_SIZE: usize = 4 * 64 * 1024;

/// Field values of one reference, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParsedReference(BTreeMap<String, String>);

impl ParsedReference {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// Yields one [`ParsedReference`] per reference block.
///
/// Git ends every block with the format's double NUL plus a newline of
/// its own; a final block without that terminator is accepted at
/// end of input. Iteration stops after the first error.
#[derive(Debug)]
pub struct Parser<R> {
    reader: R,
    format: Format,
    block: Vec<u8>,
    done: bool,
}

impl<R: BufRead> Parser<R> {
    pub fn new(reader: R, format: Format) -> Self {
        Self {
            reader,
            format,
            block: Vec::new(),
            done: false,
        }
    }

    /// Read the next raw block, without its terminator.
    ///
    /// Never buffers more than `MAX_BLOCK_SIZE` plus one byte, newline or
    /// not.
    fn next_block(&mut self) -> Result<Option<Vec<u8>>, RefParseError> {
        self.block.clear();
        loop {
            let budget = (MAX_BLOCK_SIZE + 1 - self.block.len()) as u64;
            let n = self
                .reader
                .by_ref()
                .take(budget)
                .read_until(b'\n', &mut self.block)?;
            if n == 0 {
                if self.block.ends_with(REF_DELIM) {
                    self.block.truncate(self.block.len() - REF_DELIM.len());
                }
                return Ok((!self.block.is_empty()).then(|| std::mem::take(&mut self.block)));
            }
            if let Some(line) = self.block.strip_suffix(b"\n") {
                if line.ends_with(REF_DELIM) {
                    let end = line.len() - REF_DELIM.len();
                    self.block.truncate(end);
                    return Ok(Some(std::mem::take(&mut self.block)));
                }
            }
            if self.block.len() > MAX_BLOCK_SIZE {
                return Err(RefParseError::TooLarge(MAX_BLOCK_SIZE));
            }
        }
    }

    fn parse_block(&self, block: &[u8]) -> Result<ParsedReference, RefParseError> {
        let fields: Vec<&[u8]> = split(block, FIELD_DELIM).collect();
        let wanted = self.format.field_names();
        if fields.len() != wanted.len() {
            return Err(RefParseError::FieldCount {
                wanted: wanted.len(),
                found: fields.len(),
            });
        }

        let mut values = BTreeMap::new();
        for (position, (field, name)) in fields.into_iter().zip(wanted).enumerate() {
            let field = String::from_utf8_lossy(field);
            let field = field.trim();
            // a field with no value has no space after its name
            let (key, value) = match field.find(' ') {
                Some(space) if space > 0 => (&field[..space], &field[space + 1..]),
                _ => (field, ""),
            };
            if key != name {
                return Err(RefParseError::FieldName {
                    position,
                    wanted: name.clone(),
                    found: key.to_string(),
                });
            }
            values.insert(key.to_string(), value.to_string());
        }
        Ok(ParsedReference(values))
    }
}

impl<R: BufRead> Iterator for Parser<R> {
    type Item = Result<ParsedReference, RefParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let block = match self.next_block() {
                Ok(Some(block)) => block,
                Ok(None) => break,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            if block.is_empty() {
                continue;
            }
            let parsed = self.parse_block(&block);
            self.done = parsed.is_err();
            return Some(parsed);
        }
        self.done = true;
        None
    }
}

fn split<'a>(data: &'a [u8], delim: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
    let mut rest = Some(data);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.windows(delim.len()).position(|window| window == delim) {
            Some(idx) => {
                rest = Some(&current[idx + delim.len()..]);
                Some(&current[..idx])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}
