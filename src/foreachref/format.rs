//! foreachref::format
//!
//! The field list shared by the `--format` flag and the parser.

use std::io::BufRead;

use super::parser::Parser;

/// Separates fields within one reference block.
pub(crate) const FIELD_DELIM: &[u8] = b"\x00";
/// Terminates one reference block.
pub(crate) const REF_DELIM: &[u8] = b"\x00\x00";

/// Which reference fields to request, in order.
///
/// ```
/// use gitpipe::foreachref::Format;
///
/// let format = Format::new(["refname:short", "objecttype"]);
/// assert_eq!(
///     format.flag(),
///     "refname:short %(refname:short)%00objecttype %(objecttype)%00%00",
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    field_names: Vec<String>,
}

impl Format {
    pub fn new<I, S>(field_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_names: field_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// The value for `git for-each-ref --format=`.
    ///
    /// Each field is written as `<name> %(<name>)`. The delimiters are
    /// hex-escaped so no control character ends up in the argument.
    pub fn flag(&self) -> String {
        let field_delim = hex_escaped(FIELD_DELIM);
        let mut flag = self
            .field_names
            .iter()
            .map(|name| format!("{name} %({name})"))
            .collect::<Vec<_>>()
            .join(&field_delim);
        flag.push_str(&hex_escaped(REF_DELIM));
        flag
    }

    /// A parser for output produced with this format.
    pub fn parser<R: BufRead>(&self, reader: R) -> Parser<R> {
        Parser::new(reader, self.clone())
    }
}

fn hex_escaped(delim: &[u8]) -> String {
    delim.iter().map(|byte| format!("%{}", hex::encode([*byte]))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field_flag() {
        assert_eq!(Format::new(["refname"]).flag(), "refname %(refname)%00%00");
    }

    #[test]
    fn hex_escapes_every_byte() {
        assert_eq!(hex_escaped(b"\x00\x0a"), "%00%0a");
    }

    #[test]
    fn keeps_field_order() {
        let format = Format::new(["objectname", "refname", "creatordate"]);
        assert_eq!(format.field_names(), ["objectname", "refname", "creatordate"]);
        assert!(format
            .flag()
            .starts_with("objectname %(objectname)%00refname %(refname)%00"));
    }
}
