//! Result of a spawned process
//!
//! [`ExecResult`] owns the child's three pipes and the buffers they drain into.
//! It is either running (no exit code yet) or finished (exit code recorded);
//! killing only requests termination, whose effect the next [`poll`] observes.
//!
//! Once the exit code is observed, stdout and stderr are drained to the end
//! before the result reports itself finished, so output read after
//! [`is_finished`] returns `true` is complete and never changes again.
//!
//! [`poll`]: ExecResult::poll
//! [`is_finished`]: ExecResult::is_finished

use std::fmt;
use std::io::{self, Read};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, ExitStatus};
use std::time::{Duration, Instant};

use crate::error::{CommandTimeout, ExecError, ExecOutcome, ExecutionError};
use crate::runner::CommandSpec;
use crate::sys::AsRawPipe;

use super::io::{read_chunk, set_non_blocking, write_chunk};
use super::ioloop::{IoLoop, Readiness};
use super::waiting::Waiter;

/// Largest slice of stdin written per handler invocation
pub const MAX_INPUT_CHUNK_SIZE: usize = 1024;

/// Read size used when the platform cannot say how much is waiting
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// One of the three standard streams of a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

/// Handler value registered in an [`IoLoop`]: which result, which stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandler {
    pub slot: usize,
    pub stream: Stream,
}

impl StreamHandler {
    pub fn new(slot: usize, stream: Stream) -> Self {
        Self { slot, stream }
    }
}

/// A spawned process, its pipes and its captured output
#[derive(Debug)]
pub struct ExecResult {
    command: CommandSpec,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    output: Vec<u8>,
    error: Vec<u8>,
    input: Vec<u8>,
    input_pos: usize,
    exit_code: Option<i32>,
    deadline: Option<Instant>,
    assert_success: bool,
}

impl ExecResult {
    /// Wrap a freshly spawned child.
    ///
    /// The child's pipes are taken over and made non-blocking. A relative
    /// `timeout` becomes an absolute deadline here. With no stdin payload the
    /// stdin pipe is closed right away so the child sees end-of-file.
    ///
    /// # Errors
    /// * `ExecError::Io` - If a pipe cannot be made non-blocking
    pub fn new(
        command: CommandSpec,
        mut child: Child,
        stdin: Option<Vec<u8>>,
        assert_success: bool,
        timeout: Option<Duration>,
    ) -> ExecOutcome<Self> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let input = stdin.unwrap_or_default();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take().filter(|_| !input.is_empty());

        if let Some(ref pipe) = stdout {
            set_non_blocking(pipe)?;
        }
        if let Some(ref pipe) = stderr {
            set_non_blocking(pipe)?;
        }
        if let Some(ref pipe) = stdin {
            set_non_blocking(pipe)?;
        }

        tracing::debug!(pid = child.id(), "Started: {}", command);

        Ok(Self {
            command,
            child,
            stdin,
            stdout,
            stderr,
            output: Vec::new(),
            error: Vec::new(),
            input,
            input_pos: 0,
            exit_code: None,
            deadline,
            assert_success,
        })
    }

    /// Process id
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// The command this process was started from
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// Everything read from stdout so far
    pub fn stdout(&self) -> &[u8] {
        &self.output
    }

    /// Everything read from stderr so far
    pub fn stderr(&self) -> &[u8] {
        &self.error
    }

    /// Exit code, `None` while running. A process killed by a signal reports
    /// the negated signal number.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Absolute deadline, if a timeout was given at launch
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn asserts_success(&self) -> bool {
        self.assert_success
    }

    /// Poll the process and report whether it has exited.
    ///
    /// # Errors
    /// Same as [`poll`](Self::poll).
    pub fn is_finished(&mut self) -> ExecOutcome<bool> {
        Ok(self.poll()?.is_some())
    }

    /// Whether an exit has already been observed, without asking the process
    pub(crate) fn has_exited(&self) -> bool {
        self.exit_code.is_some()
    }

    /// Register a handler for every open pipe into `ioloop`, tagged `slot`.
    ///
    /// stdin is only registered while unsent input remains.
    pub fn register_to(&self, ioloop: &mut IoLoop<StreamHandler>, slot: usize) -> ExecOutcome<()> {
        if let Some(ref pipe) = self.stdout {
            ioloop.register_read(pipe.as_raw_pipe(), StreamHandler::new(slot, Stream::Stdout))?;
        }
        if let Some(ref pipe) = self.stderr {
            ioloop.register_read(pipe.as_raw_pipe(), StreamHandler::new(slot, Stream::Stderr))?;
        }
        if let Some(ref pipe) = self.stdin {
            if self.input_pos < self.input.len() {
                ioloop.register_write(pipe.as_raw_pipe(), StreamHandler::new(slot, Stream::Stdin))?;
            }
        }
        Ok(())
    }

    /// Remove the handlers [`register_to`](Self::register_to) installed for
    /// the pipes that are still open.
    pub fn unregister_from(&self, ioloop: &mut IoLoop<StreamHandler>) -> ExecOutcome<()> {
        if let Some(ref pipe) = self.stdout {
            ioloop.unregister_read(pipe.as_raw_pipe())?;
        }
        if let Some(ref pipe) = self.stderr {
            ioloop.unregister_read(pipe.as_raw_pipe())?;
        }
        if let Some(ref pipe) = self.stdin {
            ioloop.unregister_write(pipe.as_raw_pipe())?;
        }
        Ok(())
    }

    /// Service one ready pipe. The handler was popped from `ioloop`; it is
    /// registered again unless its pipe reached the end.
    pub fn handle(
        &mut self,
        ioloop: &mut IoLoop<StreamHandler>,
        handler: StreamHandler,
        readiness: Readiness,
    ) -> ExecOutcome<()> {
        self.service(ioloop, handler, readiness, false)
    }

    fn service(
        &mut self,
        ioloop: &mut IoLoop<StreamHandler>,
        handler: StreamHandler,
        readiness: Readiness,
        exited: bool,
    ) -> ExecOutcome<()> {
        match handler.stream {
            Stream::Stdout => {
                Drain { ioloop, handler, readiness, exited }.run(&mut self.stdout, &mut self.output)
            }
            Stream::Stderr => {
                Drain { ioloop, handler, readiness, exited }.run(&mut self.stderr, &mut self.error)
            }
            Stream::Stdin => self.feed_input(ioloop, handler),
        }
    }

    fn feed_input(&mut self, ioloop: &mut IoLoop<StreamHandler>, handler: StreamHandler) -> ExecOutcome<()> {
        let Some(pipe) = self.stdin.as_mut() else {
            return Ok(());
        };
        let raw = pipe.as_raw_pipe();
        let end = (self.input_pos + MAX_INPUT_CHUNK_SIZE).min(self.input.len());

        match write_chunk(pipe, &self.input[self.input_pos..end]) {
            Ok(written) => {
                tracing::trace!(pid = self.child.id(), written, "stdin");
                self.input_pos += written;
            }
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::trace!(pid = self.child.id(), "stdin reader went away");
                self.input_pos = self.input.len();
            }
            Err(e) => return Err(e.into()),
        }

        if self.input_pos >= self.input.len() {
            self.stdin = None;
            Ok(())
        } else {
            ioloop.register_write(raw, handler)
        }
    }

    /// Drain stdout and stderr to end-of-file, ignoring readiness. Only
    /// called once the child has exited: a pipe that still stalls is held open
    /// by a descendant and is abandoned instead of failing the result.
    fn flush(&mut self) -> ExecOutcome<()> {
        let mut ioloop = IoLoop::new();
        if let Some(ref pipe) = self.stdout {
            ioloop.register_read(pipe.as_raw_pipe(), StreamHandler::new(0, Stream::Stdout))?;
        }
        if let Some(ref pipe) = self.stderr {
            ioloop.register_read(pipe.as_raw_pipe(), StreamHandler::new(0, Stream::Stderr))?;
        }
        ioloop.flush(|ioloop, handler, readiness| self.service(ioloop, handler, readiness, true))
    }

    /// Check, without blocking, whether the process has exited.
    ///
    /// On the first observation of an exit the remaining output is flushed
    /// and stdin is closed. Returns the exit code, or `None` while running.
    ///
    /// # Errors
    /// * `ExecError::Execution` - If the assert-success policy is set and the
    ///   exit code is non-zero (on every call once that is known)
    /// * `ExecError::Io` - If querying the process or draining a pipe fails
    pub fn poll(&mut self) -> ExecOutcome<Option<i32>> {
        if self.exit_code.is_none() {
            if let Some(status) = self.child.try_wait()? {
                self.flush()?;
                self.stdin = None;
                let code = exit_code_of(status);
                self.exit_code = Some(code);
                tracing::debug!(pid = self.child.id(), exit_code = code, "Finished: {}", self.command);
            }
        }
        self.check_return_code()?;
        Ok(self.exit_code)
    }

    fn check_return_code(&self) -> ExecOutcome<()> {
        match self.exit_code {
            Some(code) if self.assert_success && code != 0 => {
                Err(ExecError::Execution(Box::new(ExecutionError {
                    command: self.command.to_string(),
                    pid: self.pid(),
                    exit_code: code,
                    stdout: self.output.clone(),
                    stderr: self.error.clone(),
                })))
            }
            _ => Ok(()),
        }
    }

    /// Ask the process to terminate (SIGTERM on unix). No-op once finished.
    ///
    /// Does not reap: a later [`poll`](Self::poll) or [`wait`](Self::wait)
    /// observes the exit.
    #[cfg(unix)]
    pub fn kill(&mut self) -> ExecOutcome<()> {
        self.kill_with(nix::sys::signal::Signal::SIGTERM)
    }

    /// Send `signal` to the process. No-op once finished.
    #[cfg(unix)]
    pub fn kill_with(&mut self, signal: nix::sys::signal::Signal) -> ExecOutcome<()> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        if self.has_exited() {
            return Ok(());
        }
        let pid = i32::try_from(self.pid())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "pid out of range"))?;

        tracing::debug!(pid, ?signal, "Killing: {}", self.command);

        match kill(Pid::from_raw(pid), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno).into()),
        }
    }

    /// Ask the process to terminate. No-op once finished.
    #[cfg(windows)]
    pub fn kill(&mut self) -> ExecOutcome<()> {
        if self.has_exited() {
            return Ok(());
        }
        tracing::debug!(pid = self.pid(), "Killing: {}", self.command);
        self.child.kill()?;
        Ok(())
    }

    /// Wait for the process with the default sample interval.
    ///
    /// Returns whether it finished. With no deadline anywhere this only
    /// returns once it has.
    ///
    /// # Errors
    /// * `ExecError::Timeout` - If the result's own deadline or `timeout`
    ///   elapsed first (`result` is `None`: the caller still holds it)
    /// * `ExecError::Execution` - Under the assert-success policy
    pub fn wait(&mut self, timeout: Option<Duration>) -> ExecOutcome<bool> {
        self.wait_with(&Waiter::default(), timeout)
    }

    /// [`wait`](Self::wait) driven by a specific [`Waiter`]
    pub fn wait_with(&mut self, waiter: &Waiter, timeout: Option<Duration>) -> ExecOutcome<bool> {
        let bounded = self.deadline.is_some() || timeout.is_some();
        let finished = waiter
            .wait_for_many(std::iter::once(&mut *self), timeout)?
            .into_iter()
            .flatten()
            .next()
            .is_some();

        if !finished && bounded {
            tracing::debug!(pid = self.pid(), "Timed out: {}", self.command);
            return Err(ExecError::Timeout(Box::new(self.timeout_error())));
        }
        Ok(finished)
    }

    /// Wait, handing the result back. On timeout the still-running result is
    /// attached to the error.
    pub fn wait_owned(self, timeout: Option<Duration>) -> ExecOutcome<ExecResult> {
        self.wait_owned_with(&Waiter::default(), timeout)
    }

    /// [`wait_owned`](Self::wait_owned) driven by a specific [`Waiter`]
    pub fn wait_owned_with(mut self, waiter: &Waiter, timeout: Option<Duration>) -> ExecOutcome<ExecResult> {
        match self.wait_with(waiter, timeout) {
            Ok(_) => Ok(self),
            Err(ExecError::Timeout(mut timed_out)) => {
                timed_out.result = Some(self);
                Err(ExecError::Timeout(timed_out))
            }
            Err(e) => Err(e),
        }
    }

    fn timeout_error(&self) -> CommandTimeout {
        CommandTimeout {
            command: self.command.to_string(),
            pid: self.pid(),
            result: None,
        }
    }
}

impl fmt::Display for ExecResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<pid {}: {}>", self.pid(), self.command)
    }
}

/// One output-pipe servicing step
struct Drain<'l> {
    ioloop: &'l mut IoLoop<StreamHandler>,
    handler: StreamHandler,
    readiness: Readiness,
    /// The child is known to have exited
    exited: bool,
}

impl Drain<'_> {
    /// Read one chunk from an output pipe into its buffer; close the pipe at
    /// end-of-file, otherwise register for the next chunk.
    fn run<P: Read + AsRawPipe>(self, pipe: &mut Option<P>, buffer: &mut Vec<u8>) -> ExecOutcome<()> {
        let stream = self.handler.stream;
        let Some(reader) = pipe.as_mut() else {
            return Ok(());
        };
        let raw = reader.as_raw_pipe();
        let chunk = match read_chunk(reader, Some(self.readiness.limit(READ_CHUNK_SIZE))) {
            Ok(chunk) => chunk,
            // A descendant that outlived the child can keep the write end open.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock && self.exited => {
                tracing::debug!(?stream, "pipe stalled after exit, giving up on it");
                *pipe = None;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if chunk.is_empty() {
            tracing::trace!(?stream, "end of stream");
            *pipe = None;
            return Ok(());
        }

        tracing::trace!(?stream, bytes = chunk.len(), "read");
        buffer.extend_from_slice(&chunk);
        self.ioloop.register_read(raw, self.handler)
    }
}

#[cfg(unix)]
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| -signal))
        .unwrap_or(-1)
}

#[cfg(windows)]
fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
