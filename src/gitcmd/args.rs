//! gitcmd::args
//!
//! Trusted and dynamic command arguments.
//!
//! # Safety Model
//!
//! A [`CmdArg`] is an argument that is known, by construction, not to come
//! from unchecked input. Outside this crate it can only be built from a
//! `&'static str` (a literal in source code) or through the explicit
//! [`to_trusted_cmd_args`] escape hatch. Everything else must go through the
//! `add_dynamic_arguments` family on [`Command`](super::Command), which
//! rejects values that would be parsed as options.

use std::borrow::Cow;
use std::fmt::Display;

use thiserror::Error;

/// A trusted argument for a git command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CmdArg(Cow<'static, str>);

/// A list of trusted arguments.
pub type TrustedCmdArgs = Vec<CmdArg>;

impl CmdArg {
    pub(crate) fn trusted(arg: impl Into<Cow<'static, str>>) -> Self {
        Self(arg.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for CmdArg {
    fn from(arg: &'static str) -> Self {
        Self(Cow::Borrowed(arg))
    }
}

impl AsRef<str> for CmdArg {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CmdArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert runtime strings into trusted arguments.
///
/// In most cases this shouldn't be used: build the command with the
/// `add_*` methods instead. It exists for argument lists that were
/// validated elsewhere, such as configured global arguments.
pub fn to_trusted_cmd_args<I, S>(args: I) -> TrustedCmdArgs
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter()
        .map(|arg| CmdArg::trusted(arg.into()))
        .collect()
}

/// A problem found while building a command, reported when it starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    /// A dynamic value would be interpreted as an option.
    #[error("broken git command argument {0:?}: value must not start with '-'")]
    OptionLikeValue(String),

    /// An option slot was given something that is not an option.
    #[error("broken git command argument {0:?}: option must start with '-'")]
    NotAnOption(String),

    /// A format string does not match its argument count.
    #[error("broken git command argument {format:?}: {placeholders} placeholder(s) for {args} argument(s)")]
    FormatArity {
        format: String,
        placeholders: usize,
        args: usize,
    },

    /// A format string has an unbalanced brace.
    #[error("broken git command argument {0:?}: malformed format string")]
    MalformedFormat(String),
}

/// Check if the argument is safe to be used as a value (not an option).
pub fn is_safe_argument_value(s: &str) -> bool {
    !s.starts_with('-')
}

/// Check if the argument is a valid option (starting with '-').
///
/// It doesn't check whether the option is supported or not.
pub fn is_valid_argument_option(s: &str) -> bool {
    s.starts_with('-')
}

/// Render an option from a `{}` format string.
///
/// `{{` and `}}` are literal braces. The number of `{}` placeholders must
/// match `args` exactly, to find low-level mistakes as early as possible.
pub(crate) fn format_option(format: &str, args: &[&dyn Display]) -> Result<String, ArgumentError> {
    if !is_valid_argument_option(format) {
        return Err(ArgumentError::NotAnOption(format.to_string()));
    }

    let mut literal = String::new();
    let mut rendered = String::with_capacity(format.len());
    let mut placeholders = 0;
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('{', Some('{')) | ('}', Some('}')) => {
                chars.next();
                literal.push(c);
            }
            ('{', Some('}')) => {
                chars.next();
                placeholders += 1;
                if let Some(arg) = args.get(placeholders - 1) {
                    rendered.push_str(&literal);
                    rendered.push_str(&arg.to_string());
                    literal.clear();
                }
            }
            ('{', _) | ('}', _) => return Err(ArgumentError::MalformedFormat(format.to_string())),
            _ => literal.push(c),
        }
    }

    if placeholders != args.len() {
        return Err(ArgumentError::FormatArity {
            format: format.to_string(),
            placeholders,
            args: args.len(),
        });
    }

    rendered.push_str(&literal);
    Ok(rendered)
}
