//! gitcmd
//!
//! Safe invocation of the git executable.
//!
//! # Architecture
//!
//! - [`args`] - trusted arguments and pre-error detection
//! - [`context`] - cancellation scopes with deadlines and causes
//! - [`pipe`] - parent pipe ends and capture buffers
//! - [`env`] - executable resolution and the sanitized environment
//! - [`process`] - registry of running processes
//! - [`command`] - the command builder and runner
//! - [`sanitize`] - redaction of arguments for logs
//!
//! # Example
//!
//! ```no_run
//! use gitpipe::core::config::Settings;
//! use gitpipe::gitcmd::{Command, Context, GitEnv};
//!
//! let env = GitEnv::new(&Settings::default()).unwrap();
//! let output = Command::new(&env)
//!     .add_arguments(["rev-parse"])
//!     .add_dynamic_arguments(["HEAD"])
//!     .with_dir("/path/to/repo")
//!     .run_std_string(&Context::background())
//!     .unwrap();
//! println!("{}", output.stdout.trim());
//! ```

pub mod args;
pub mod command;
pub mod context;
pub mod env;
pub mod error;
pub mod pipe;
pub mod process;
pub mod sanitize;

pub use args::{
    is_safe_argument_value, is_valid_argument_option, to_trusted_cmd_args, ArgumentError, CmdArg,
    TrustedCmdArgs,
};
pub use command::{Command, PipelineContext, PipelineFn, RunOutput};
pub use context::{CancelCause, Context};
pub use env::{EnvError, GitEnv};
pub use error::{Error, PipelineError, RunError};
pub use pipe::{PipeCloser, PipeReader, PipeWriter, SharedBuffer};
pub use process::{ProcessInfo, ProcessRegistry};
pub use sanitize::{log_arg_sanitize, sanitize_credential_urls};
