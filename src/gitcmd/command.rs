//! gitcmd::command
//!
//! Building and running one git process.
//!
//! A [`Command`] moves through three states: unstarted, started and
//! finished. Arguments are collected while unstarted; problems found there
//! are kept as pre-errors and reported together by [`Command::start`],
//! before anything is spawned. Starting twice, waiting twice or giving one
//! stream two sinks is a caller bug and panics.
//!
//! Every started process runs under a child [`Context`] of the caller's,
//! bounded by the command timeout. A watchdog thread kills the process when
//! that context is canceled, so a deadline also interrupts a pipeline
//! callback blocked on the child's output.

use std::fmt::{self, Display};
use std::io::{self, Read, Write};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::{self, Child, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use super::args::{format_option, is_safe_argument_value, is_valid_argument_option, ArgumentError, CmdArg};
use super::context::{CancelCause, Context};
use super::env::GitEnv;
use super::error::{Error, PipelineError, RunError};
use super::pipe::{reader_pipe, writer_pipe, PipeCloser, PipeReader, PipeWriter, SharedBuffer};
use super::process::Registration;
use super::sanitize::log_arg_sanitize;

/// Longest stretch `wait` blocks on the child before checking for
/// cancellation.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Callback run by [`Command::wait`] while the process is alive.
pub type PipelineFn = Box<dyn FnOnce(&PipelineContext) -> Result<(), PipelineError> + Send>;

/// The view of a running command handed to a pipeline callback.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    ctx: Context,
}

impl PipelineContext {
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Stop the command without treating the stop as a failure.
    ///
    /// Use this once the callback has read everything it needs.
    pub fn cancel_pipeline(&self) {
        self.ctx.cancel_with_cause(CancelCause::PipelineStop);
    }

    pub fn is_done(&self) -> bool {
        self.ctx.is_done()
    }
}

/// Captured output of [`Command::run_std_bytes`] and friends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput<T = Vec<u8>> {
    pub stdout: T,
    pub stderr: T,
}

enum Input {
    Pipe(io::PipeReader),
    Bytes(Vec<u8>),
    Copy(Box<dyn Read + Send>),
}

enum Output {
    Pipe(io::PipeWriter),
    Buffer(SharedBuffer),
    Copy(Box<dyn Write + Send>),
}

enum State {
    Unstarted,
    Started(Box<Running>),
    Finished,
}

/// One invocation of git.
pub struct Command {
    env: Arc<GitEnv>,
    config_args: Vec<CmdArg>,
    args: Vec<CmdArg>,
    pre_errors: Vec<ArgumentError>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
    timeout: Option<Duration>,
    use_context_timeout: bool,
    stdin: Option<Input>,
    stdout: Option<Output>,
    stderr: Option<Output>,
    managed_stderr: Option<SharedBuffer>,
    pipeline: Option<PipelineFn>,
    parent_pipes: Vec<PipeCloser>,
    caller: Option<String>,
    state: State,
    exit_status: Option<ExitStatus>,
}

impl Command {
    /// A command with no arguments beyond the configured global ones.
    pub fn new(env: &Arc<GitEnv>) -> Self {
        Self {
            env: Arc::clone(env),
            config_args: Vec::new(),
            args: Vec::new(),
            pre_errors: Vec::new(),
            dir: None,
            envs: Vec::new(),
            timeout: None,
            use_context_timeout: false,
            stdin: None,
            stdout: None,
            stderr: None,
            managed_stderr: None,
            pipeline: None,
            parent_pipes: Vec::new(),
            caller: None,
            state: State::Unstarted,
            exit_status: None,
        }
    }

    /// Append trusted arguments.
    pub fn add_arguments<I>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<CmdArg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append runtime values. A value starting with `-` is a pre-error and
    /// none of the values are added.
    pub fn add_dynamic_arguments<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        let before = self.pre_errors.len();
        for value in &values {
            if !is_safe_argument_value(value) {
                self.pre_errors.push(ArgumentError::OptionLikeValue(value.clone()));
            }
        }
        if self.pre_errors.len() == before {
            self.args.extend(values.into_iter().map(CmdArg::trusted));
        }
        self
    }

    /// Append an option followed by runtime values, e.g. `--points-at <oid>`.
    pub fn add_option_values<I, S>(&mut self, option: impl Into<CmdArg>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let option = option.into();
        if !is_valid_argument_option(option.as_str()) {
            self.pre_errors
                .push(ArgumentError::NotAnOption(option.as_str().to_string()));
            return self;
        }
        self.args.push(option);
        self.add_dynamic_arguments(values)
    }

    /// Append one option rendered from a `{}` format string.
    ///
    /// ```
    /// # use gitpipe::gitcmd::{Command, GitEnv};
    /// # use gitpipe::core::config::Settings;
    /// # let home = tempfile::tempdir().unwrap();
    /// # let settings = Settings { home_dir: Some(home.path().into()), ..Default::default() };
    /// # let env = GitEnv::new(&settings).unwrap();
    /// let mut cmd = Command::new(&env);
    /// cmd.add_arguments(["log"]).add_option_format("--max-count={}", &[&10]);
    /// assert!(cmd.log_string().ends_with("log --max-count=10"));
    /// ```
    pub fn add_option_format(&mut self, format: &'static str, args: &[&dyn Display]) -> &mut Self {
        match format_option(format, args) {
            Ok(option) => self.args.push(CmdArg::trusted(option)),
            Err(err) => self.pre_errors.push(err),
        }
        self
    }

    /// Append `--` and then `values` verbatim.
    ///
    /// Git stops option parsing at `--`, so the values may start with `-`.
    pub fn add_dashes_and_list<I, S>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.push(CmdArg::from("--"));
        self.args.extend(
            values
                .into_iter()
                .map(|value| CmdArg::trusted(value.as_ref().to_string())),
        );
        self
    }

    /// Pass `-c key=value` ahead of the subcommand.
    pub fn add_config(&mut self, key: &str, value: &str) -> &mut Self {
        let pair = format!("{key}={value}");
        if is_safe_argument_value(&pair) {
            self.config_args.push(CmdArg::from("-c"));
            self.config_args.push(CmdArg::trusted(pair));
        } else {
            self.pre_errors.push(ArgumentError::OptionLikeValue(pair));
        }
        self
    }

    pub fn with_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add a variable on top of the sanitized environment. The fixed git
    /// settings still win over a variable of the same name.
    pub fn with_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Kill the process if it runs longer than `timeout`.
    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bound the process only by the caller's context, ignoring both the
    /// command timeout and the configured default.
    pub fn use_context_timeout(&mut self) -> &mut Self {
        self.use_context_timeout = true;
        self
    }

    /// Run `pipeline` from [`wait`](Self::wait) while the process is alive.
    pub fn with_pipeline<F>(&mut self, pipeline: F) -> &mut Self
    where
        F: FnOnce(&PipelineContext) -> Result<(), PipelineError> + Send + 'static,
    {
        self.pipeline = Some(Box::new(pipeline));
        self
    }

    /// Record where the command was issued from. Only the first call has
    /// an effect; with `None` the calling location is used.
    #[track_caller]
    pub fn with_parent_caller_info(&mut self, info: Option<&str>) -> &mut Self {
        if self.caller.is_none() {
            self.caller = Some(match info {
                Some(info) => info.to_string(),
                None => location(Location::caller()),
            });
        }
        self
    }

    pub fn with_stdin_bytes(&mut self, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.set_stdin(Input::Bytes(bytes.into()));
        self
    }

    pub fn with_stdin_copy(&mut self, reader: impl Read + Send + 'static) -> &mut Self {
        self.set_stdin(Input::Copy(Box::new(reader)));
        self
    }

    pub fn with_stdout_buffer(&mut self, buffer: &SharedBuffer) -> &mut Self {
        self.set_stdout(Output::Buffer(buffer.clone()));
        self
    }

    pub fn with_stdout_copy(&mut self, writer: impl Write + Send + 'static) -> &mut Self {
        self.set_stdout(Output::Copy(Box::new(writer)));
        self
    }

    pub fn with_stderr_buffer(&mut self, buffer: &SharedBuffer) -> &mut Self {
        self.set_stderr(Output::Buffer(buffer.clone()));
        self
    }

    pub fn with_stderr_copy(&mut self, writer: impl Write + Send + 'static) -> &mut Self {
        self.set_stderr(Output::Copy(Box::new(writer)));
        self
    }

    /// Connect the child's stdin to a pipe and return the parent end.
    pub fn make_stdin_pipe(&mut self) -> io::Result<PipeWriter> {
        let (writer, child_end) = writer_pipe()?;
        self.set_stdin(Input::Pipe(child_end));
        self.parent_pipes.push(writer.closer());
        Ok(writer)
    }

    /// Connect the child's stdout to a pipe and return the parent end.
    pub fn make_stdout_pipe(&mut self) -> io::Result<PipeReader> {
        let (reader, child_end) = reader_pipe()?;
        self.set_stdout(Output::Pipe(child_end));
        self.parent_pipes.push(reader.closer());
        Ok(reader)
    }

    /// Connect the child's stderr to a pipe and return the parent end.
    pub fn make_stderr_pipe(&mut self) -> io::Result<PipeReader> {
        let (reader, child_end) = reader_pipe()?;
        self.set_stderr(Output::Pipe(child_end));
        self.parent_pipes.push(reader.closer());
        Ok(reader)
    }

    pub fn make_stdin_stdout_pipe(&mut self) -> io::Result<(PipeWriter, PipeReader)> {
        let stdin = self.make_stdin_pipe()?;
        let stdout = self.make_stdout_pipe()?;
        Ok((stdin, stdout))
    }

    fn set_stdin(&mut self, input: Input) {
        assert!(self.stdin.is_none(), "git command stdin is already set");
        self.stdin = Some(input);
    }

    fn set_stdout(&mut self, output: Output) {
        assert!(self.stdout.is_none(), "git command stdout is already set");
        self.stdout = Some(output);
    }

    fn set_stderr(&mut self, output: Output) {
        assert!(self.stderr.is_none(), "git command stderr is already set");
        self.stderr = Some(output);
    }

    /// Full argument vector: global args, `-c` pairs, then the rest.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.env
            .global_args()
            .iter()
            .chain(&self.config_args)
            .chain(&self.args)
            .map(CmdArg::as_str)
    }

    /// The command line for logs, with credentials and absolute paths
    /// redacted and the global arguments elided.
    ///
    /// Quoting is approximate and only meant for reading.
    pub fn log_string(&self) -> String {
        let program = self.env.executable().to_string_lossy();
        let mut parts = vec![debug_quote(&log_arg_sanitize(&program))];
        if !self.env.global_args().is_empty() {
            parts.push("...global...".to_string());
        }
        parts.extend(
            self.config_args
                .iter()
                .chain(&self.args)
                .map(|arg| debug_quote(&log_arg_sanitize(arg.as_str()))),
        );
        parts.join(" ")
    }

    /// Spawn the process.
    ///
    /// # Errors
    ///
    /// [`Error::BrokenCommand`] if any argument was rejected while
    /// building; nothing is spawned in that case.
    ///
    /// # Panics
    ///
    /// If the command was already started.
    #[track_caller]
    pub fn start(&mut self, ctx: &Context) -> Result<(), Error> {
        assert!(
            matches!(self.state, State::Unstarted),
            "git command {} was already started",
            self.log_string()
        );
        self.with_parent_caller_info(None);

        let description = self.log_string();
        let span = tracing::debug_span!(
            "git.run",
            caller = self.caller.as_deref().unwrap_or_default(),
            command = %description,
        );
        let _entered = span.enter();

        match self.spawn(ctx, description) {
            Ok(running) => {
                self.state = State::Started(Box::new(running));
                Ok(())
            }
            Err(err) => {
                self.close_parent_pipes();
                self.state = State::Finished;
                Err(err)
            }
        }
    }

    fn spawn(&mut self, parent: &Context, description: String) -> Result<Running, Error> {
        if !self.pre_errors.is_empty() {
            tracing::error!(problems = ?self.pre_errors, "refusing to run broken git command");
            return Err(Error::BrokenCommand {
                command: description,
                problems: std::mem::take(&mut self.pre_errors),
            });
        }

        let timeout = if self.use_context_timeout {
            None
        } else {
            self.timeout.or(self.env.default_timeout())
        };
        let ctx = match timeout {
            Some(timeout) => parent.with_timeout(timeout),
            None => parent.child(),
        };
        if let Some(cause) = ctx.cause() {
            return Err(RunError {
                cause: Some(cause),
                ..Default::default()
            }
            .into());
        }

        let mut cmd = process::Command::new(self.env.executable());
        cmd.args(self.args());
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd.env_clear()
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .envs(self.env.common_git_cmd_envs());

        let stdin_source = match self.stdin.take() {
            None => {
                cmd.stdin(Stdio::null());
                None
            }
            Some(Input::Pipe(child_end)) => {
                cmd.stdin(child_end);
                None
            }
            Some(source) => {
                cmd.stdin(Stdio::piped());
                Some(source)
            }
        };
        let stdout_sink = attach_output(self.stdout.take(), |stdio| {
            cmd.stdout(stdio);
        });
        let stderr_sink = attach_output(self.stderr.take(), |stdio| {
            cmd.stderr(stdio);
        });

        tracing::debug!("starting git command");
        let registration = self.env.processes().register(description.clone());
        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            program: self.env.executable().display().to_string(),
            source,
        })?;
        // the parent must not keep the child's ends of the pipes open
        drop(cmd);

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let mut running = Running {
            child: Arc::new(Mutex::new(child)),
            ctx,
            watchdog: None,
            io_threads: Vec::new(),
            registration: Some(registration),
            started: Instant::now(),
            description,
        };
        running.spawn_watchdog()?;
        if let (Some(source), Some(stdin)) = (stdin_source, stdin) {
            running.spawn_io("git-stdin", move || feed_stdin(source, stdin))?;
        }
        if let (Some(sink), Some(stdout)) = (stdout_sink, stdout) {
            running.spawn_io("git-stdout", move || drain_output(stdout, sink))?;
        }
        if let (Some(sink), Some(stderr)) = (stderr_sink, stderr) {
            running.spawn_io("git-stderr", move || drain_output(stderr, sink))?;
        }
        Ok(running)
    }

    /// Wait for the process to exit.
    ///
    /// With a pipeline callback, the callback runs first. If it did not
    /// stop the command through [`PipelineContext::cancel_pipeline`], the
    /// parent stdin is closed, unread output is discarded and the process
    /// is left to exit on its own. The outcome then merges the callback
    /// error, the context cause and the exit status. A callback that
    /// stopped the command and returned `Ok` makes it successful, since the
    /// kill that follows is its own doing. Without a callback, the caller
    /// owns the parent pipe ends until the process exits.
    ///
    /// # Panics
    ///
    /// If the command was not started or was already waited on.
    pub fn wait(&mut self) -> Result<(), Error> {
        let mut running = match std::mem::replace(&mut self.state, State::Finished) {
            State::Started(running) => running,
            State::Unstarted => panic!("git command waited on before start"),
            State::Finished => panic!("git command waited on twice"),
        };

        let mut pipeline = None;
        if let Some(callback) = self.pipeline.take() {
            let result = callback(&PipelineContext {
                ctx: running.ctx.clone(),
            });
            if running.ctx.cause().is_none() {
                self.discard_parent_output();
            }
            self.close_parent_pipes();
            pipeline = Some(result);
        }

        let waited = running.wait_child();
        let copy_err = running.join_io();
        let cause = running.ctx.cause();
        running.finish(self.env.slow_threshold());
        self.close_parent_pipes();

        let (status, io) = match waited {
            Ok(status) => (Some(status), copy_err),
            Err(err) => (None, Some(err)),
        };
        self.exit_status = status;

        let stopped = cause == Some(CancelCause::PipelineStop);
        let failure = match pipeline {
            Some(Ok(())) if stopped => return Ok(()),
            Some(result) => RunError {
                pipeline: result.err(),
                cause: cause.filter(|_| !stopped),
                status,
                io,
                ..Default::default()
            },
            None => RunError {
                cause,
                status,
                io,
                ..Default::default()
            },
        };
        if failure.pipeline.is_none()
            && failure.cause.is_none()
            && failure.io.is_none()
            && status.is_some_and(|s| s.success())
        {
            return Ok(());
        }
        Err(failure.into())
    }

    /// Start and wait.
    #[track_caller]
    pub fn run(&mut self, ctx: &Context) -> Result<(), Error> {
        self.start(ctx)?;
        self.wait()
    }

    /// Start with stderr captured for [`wait_with_stderr`](Self::wait_with_stderr).
    ///
    /// # Panics
    ///
    /// If a stderr sink is already set.
    #[track_caller]
    pub fn start_with_stderr(&mut self, ctx: &Context) -> Result<(), Error> {
        assert!(
            self.stderr.is_none(),
            "start_with_stderr needs a command without a stderr sink"
        );
        let buffer = SharedBuffer::new();
        self.set_stderr(Output::Buffer(buffer.clone()));
        self.managed_stderr = Some(buffer);
        self.start(ctx)
    }

    /// Wait and attach the captured stderr to a run error.
    pub fn wait_with_stderr(&mut self) -> Result<(), Error> {
        let Some(stderr) = self.managed_stderr.take() else {
            panic!("wait_with_stderr called without start_with_stderr");
        };
        self.wait().map_err(|err| attach_stderr(err, &stderr))
    }

    #[track_caller]
    pub fn run_with_stderr(&mut self, ctx: &Context) -> Result<(), Error> {
        self.start_with_stderr(ctx)?;
        self.wait_with_stderr()
    }

    /// Run and capture stdout and stderr.
    ///
    /// # Panics
    ///
    /// If stdout or stderr is already set.
    #[track_caller]
    pub fn run_std_bytes(&mut self, ctx: &Context) -> Result<RunOutput, Error> {
        assert!(
            self.stdout.is_none() && self.stderr.is_none(),
            "run_std_bytes needs a command without stdout and stderr sinks"
        );
        let stdout = SharedBuffer::new();
        let stderr = SharedBuffer::new();
        self.set_stdout(Output::Buffer(stdout.clone()));
        self.set_stderr(Output::Buffer(stderr.clone()));

        self.run(ctx).map_err(|err| attach_stderr(err, &stderr))?;
        Ok(RunOutput {
            stdout: stdout.take(),
            stderr: stderr.take(),
        })
    }

    /// [`run_std_bytes`](Self::run_std_bytes) with lossy UTF-8 output.
    #[track_caller]
    pub fn run_std_string(&mut self, ctx: &Context) -> Result<RunOutput<String>, Error> {
        let output = self.run_std_bytes(ctx)?;
        Ok(RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Exit status once the command has been waited on.
    pub fn process_state(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Whether the command is started and not yet waited on.
    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Started(_))
    }

    /// Kill a started process. For tests and debugging.
    pub fn debug_kill(&self) {
        if let State::Started(running) = &self.state {
            if let Err(err) = running.lock_child().kill() {
                tracing::debug!(error = %err, "debug kill failed");
            }
        }
    }

    /// Close the parent stdin, then read every parent output end to EOF so
    /// a child blocked on a full pipe can exit.
    fn discard_parent_output(&self) {
        for closer in self.parent_pipes.iter().filter(|closer| closer.is_writer()) {
            closer.close();
        }
        for closer in &self.parent_pipes {
            if let Err(err) = closer.discard() {
                tracing::debug!(error = %err, "failed to discard git output");
            }
        }
    }

    fn close_parent_pipes(&mut self) {
        for closer in self.parent_pipes.drain(..) {
            closer.close();
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("command", &self.log_string())
            .field("dir", &self.dir)
            .field("timeout", &self.timeout)
            .field("pre_errors", &self.pre_errors)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log_string())
    }
}

/// A spawned process and the threads serving it.
struct Running {
    child: Arc<Mutex<Child>>,
    ctx: Context,
    watchdog: Option<JoinHandle<()>>,
    io_threads: Vec<JoinHandle<io::Result<()>>>,
    registration: Option<Registration>,
    started: Instant,
    description: String,
}

impl Running {
    fn lock_child(&self) -> MutexGuard<'_, Child> {
        lock_child(&self.child)
    }

    fn spawn_watchdog(&mut self) -> io::Result<()> {
        let ctx = self.ctx.clone();
        let child = Arc::clone(&self.child);
        let handle = thread::Builder::new()
            .name("git-watchdog".into())
            .spawn(move || {
                let cause = ctx.wait();
                if cause == CancelCause::Finished {
                    return;
                }
                tracing::debug!(%cause, "killing git process");
                if let Err(err) = lock_child(&child).kill() {
                    tracing::debug!(error = %err, "failed to kill git process");
                }
            })?;
        self.watchdog = Some(handle);
        Ok(())
    }

    fn spawn_io<F>(&mut self, name: &str, work: F) -> io::Result<()>
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_string()).spawn(work)?;
        self.io_threads.push(handle);
        Ok(())
    }

    /// Wait for exit until the context is done, then kill and reap.
    ///
    /// The child lock is held for one slice at a time so the watchdog can
    /// still get at the child.
    fn wait_child(&self) -> io::Result<ExitStatus> {
        loop {
            if self.ctx.is_done() {
                let mut child = self.lock_child();
                if let Err(err) = child.kill() {
                    if err.kind() != io::ErrorKind::InvalidInput {
                        return Err(err);
                    }
                }
                return child.wait();
            }
            let slice = match self.ctx.deadline() {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(WAIT_SLICE),
                None => WAIT_SLICE,
            };
            if let Some(status) = self.lock_child().wait_timeout(slice)? {
                return Ok(status);
            }
        }
    }

    /// Join the copy threads, keeping the first error.
    fn join_io(&mut self) -> Option<io::Error> {
        let mut first = None;
        for handle in self.io_threads.drain(..) {
            let result = handle
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("git output copy thread panicked")));
            if let Err(err) = result {
                first.get_or_insert(err);
            }
        }
        first
    }

    fn finish(&mut self, slow_threshold: Duration) {
        self.ctx.cancel_with_cause(CancelCause::Finished);
        if let Some(watchdog) = self.watchdog.take() {
            if watchdog.join().is_err() {
                tracing::debug!("git watchdog thread panicked");
            }
        }

        let elapsed = self.started.elapsed();
        if elapsed > slow_threshold {
            tracing::debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                command = %self.description,
                "slow git command"
            );
        }
        self.registration.take();
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        if self.registration.is_none() {
            return;
        }
        // never waited on: don't leave a zombie behind
        self.ctx.cancel();
        let mut child = self.lock_child();
        if child.kill().is_ok() {
            let _ = child.wait();
        }
    }
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Point a stream at its configured target, returning the sink a copy
/// thread has to serve.
fn attach_output(output: Option<Output>, set: impl FnOnce(Stdio)) -> Option<Output> {
    match output {
        None => {
            set(Stdio::null());
            None
        }
        Some(Output::Pipe(child_end)) => {
            set(Stdio::from(child_end));
            None
        }
        Some(sink) => {
            set(Stdio::piped());
            Some(sink)
        }
    }
}

fn feed_stdin(source: Input, mut stdin: process::ChildStdin) -> io::Result<()> {
    let result = match source {
        Input::Bytes(bytes) => stdin.write_all(&bytes),
        Input::Copy(mut reader) => io::copy(&mut reader, &mut stdin).map(drop),
        Input::Pipe(_) => Ok(()),
    };
    // the child may exit without reading all of its input
    match result {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn drain_output(mut from: impl Read, sink: Output) -> io::Result<()> {
    match sink {
        Output::Buffer(mut buffer) => io::copy(&mut from, &mut buffer).map(drop),
        Output::Copy(mut writer) => {
            io::copy(&mut from, &mut writer)?;
            writer.flush()
        }
        Output::Pipe(_) => Ok(()),
    }
}

fn attach_stderr(err: Error, stderr: &SharedBuffer) -> Error {
    match err {
        Error::Run(run) => Error::Run(run.with_stderr(&stderr.to_string_lossy())),
        other => other,
    }
}

fn location(location: &Location<'_>) -> String {
    format!("{}:{}", location.file(), location.line())
}

fn debug_quote(s: &str) -> String {
    if s.contains([' ', '`', '\'', '"', '\t', '\r', '\n']) {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}
