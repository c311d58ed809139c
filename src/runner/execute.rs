//! Runner: the entry points that launch a command and hand back a result
//!
//! A [`Runner`] pairs a launcher with defaults (timeout, wait sampling). There
//! is no process-wide runner; the application builds one and passes it around.

use std::time::Duration;

use crate::error::ExecOutcome;
use crate::executor::{wait_async_with, ExecResult, Waiter};

use super::local::LocalLauncher;
use super::remote::RemoteLauncher;
use super::traits::{CommandSpec, ExecOptions, Launch};

/// Launches commands through `L` and wraps them in [`ExecResult`]s
#[derive(Debug, Clone)]
pub struct Runner<L = LocalLauncher> {
    launcher: L,
    default_timeout: Option<Duration>,
    waiter: Waiter,
}

impl Runner<LocalLauncher> {
    /// Runner for the local machine
    pub fn local() -> Self {
        Self::new(LocalLauncher::new())
    }
}

impl Default for Runner<LocalLauncher> {
    fn default() -> Self {
        Self::local()
    }
}

impl<L: Launch> Runner<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher,
            default_timeout: None,
            waiter: Waiter::default(),
        }
    }

    /// Timeout applied when the options carry none
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Waiter used by the blocking entry points
    pub fn with_waiter(mut self, waiter: Waiter) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    pub fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    /// Start `command` and return at once.
    ///
    /// The options' timeout (or the runner's default) becomes the result's
    /// absolute deadline.
    ///
    /// # Errors
    /// * `ExecError::SpawnFailed` - If the launcher cannot start the process
    /// * `ExecError::Io` - If a pipe cannot be made non-blocking
    pub fn execute_async(
        &self,
        command: impl Into<CommandSpec>,
        options: &ExecOptions,
    ) -> ExecOutcome<ExecResult> {
        let command = command.into();
        let child = self.launcher.spawn(&command, &options.spawn_options())?;

        ExecResult::new(
            command,
            child,
            options.stdin.clone(),
            options.assert_success,
            options.timeout.or(self.default_timeout),
        )
    }

    /// [`execute_async`](Self::execute_async) with the assert-success policy on
    pub fn execute_async_assert_success(
        &self,
        command: impl Into<CommandSpec>,
        options: &ExecOptions,
    ) -> ExecOutcome<ExecResult> {
        self.execute_async(command, &options.clone().assert_success())
    }

    /// Start `command` and wait for it.
    ///
    /// # Errors
    /// * `ExecError::Timeout` - If the deadline elapsed; the still-running
    ///   result is attached and should be killed by the caller
    /// * `ExecError::Execution` - If assert-success is set and the exit code
    ///   is non-zero
    /// * `ExecError::SpawnFailed` - If the process could not be started
    pub fn execute(
        &self,
        command: impl Into<CommandSpec>,
        options: &ExecOptions,
    ) -> ExecOutcome<ExecResult> {
        self.execute_async(command, options)?
            .wait_owned_with(&self.waiter, None)
    }

    /// [`execute`](Self::execute) with the assert-success policy on
    pub fn execute_assert_success(
        &self,
        command: impl Into<CommandSpec>,
        options: &ExecOptions,
    ) -> ExecOutcome<ExecResult> {
        self.execute(command, &options.clone().assert_success())
    }

    /// [`execute`](Self::execute) for async callers; the wait runs on the
    /// blocking pool.
    pub async fn execute_tokio(
        &self,
        command: impl Into<CommandSpec>,
        options: &ExecOptions,
    ) -> ExecOutcome<ExecResult> {
        let result = self.execute_async(command, options)?;
        wait_async_with(self.waiter, result, None).await
    }
}

impl<L: Launch + Clone> Runner<L> {
    /// Runner executing on `host` via ssh, on top of this runner's launcher
    pub fn through_ssh(&self, host: impl Into<String>) -> Runner<RemoteLauncher<L>> {
        Runner {
            launcher: RemoteLauncher::with_base(host, self.launcher.clone()),
            default_timeout: self.default_timeout,
            waiter: self.waiter,
        }
    }
}

impl<L: Launch> Runner<RemoteLauncher<L>> {
    /// Use a different remote-shell binary
    pub fn with_ssh_command(mut self, ssh_command: impl Into<String>) -> Self {
        self.launcher = self.launcher.with_ssh_command(ssh_command);
        self
    }
}
