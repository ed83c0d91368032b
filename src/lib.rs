//! gitpipe - Safe git subprocess orchestration
//!
//! gitpipe drives the external `git` executable: one-shot commands with
//! checked arguments, cancellation and timeouts, long-lived `cat-file`
//! batch sessions shared through a pool, and streaming parsers for the
//! formats git prints.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, calls the library)
//! - [`catfile`] - Batch sessions, the object pool and payload readers
//! - [`foreachref`] - `for-each-ref` format and parser
//! - [`diffstat`] - `diff --shortstat` parsing
//! - [`gitcmd`] - Command builder and runner over the git executable
//! - [`core`] - Domain types and configuration
//!
//! # Correctness Invariants
//!
//! gitpipe maintains the following invariants:
//!
//! 1. A runtime value never reaches git's argv where it could be read as an option
//! 2. A batch session serves one request at a time and is back in sync before reuse
//! 3. Output that does not match the expected format is an error, never a guess
//! 4. Every started process is reaped

pub mod catfile;
pub mod cli;
pub mod core;
pub mod diffstat;
pub mod foreachref;
pub mod gitcmd;
