//! Remote launcher: run a command on another host through ssh
//!
//! The command is rewritten into a local shell line of the form
//! `<ssh-binary> <host> <quoted-command>` and handed to an underlying launcher,
//! so the remote process produces the same `ExecResult` contract as a local one.

use std::process::Child;

use crate::error::ExecOutcome;

use super::local::LocalLauncher;
use super::quote::quote;
use super::traits::{CommandSpec, Launch, SpawnOptions};

/// Default remote-shell binary
pub const DEFAULT_SSH_COMMAND: &str = "ssh";

/// Launches commands on `host` via a base launcher
#[derive(Debug, Clone)]
pub struct RemoteLauncher<L = LocalLauncher> {
    host: String,
    ssh_command: String,
    base: L,
}

impl RemoteLauncher<LocalLauncher> {
    /// Remote launcher going through the local machine
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_base(host, LocalLauncher::new())
    }
}

impl<L: Launch> RemoteLauncher<L> {
    /// Remote launcher going through `base`
    pub fn with_base(host: impl Into<String>, base: L) -> Self {
        Self {
            host: host.into(),
            ssh_command: DEFAULT_SSH_COMMAND.to_string(),
            base,
        }
    }

    /// Use a different remote-shell binary (e.g. `/usr/bin/ssh`)
    pub fn with_ssh_command(mut self, ssh_command: impl Into<String>) -> Self {
        self.ssh_command = ssh_command.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ssh_command(&self) -> &str {
        &self.ssh_command
    }

    pub fn base(&self) -> &L {
        &self.base
    }

    /// Rewrite `command` into the local shell line that runs it remotely.
    ///
    /// argv tokens are quoted one by one and joined with spaces; the whole
    /// remote command is then quoted once more for the local shell.
    pub fn rewrite(&self, command: &CommandSpec) -> CommandSpec {
        let remote = command.to_shell_line();
        CommandSpec::Line(format!(
            "{} {} {}",
            self.ssh_command,
            self.host,
            quote(&remote)
        ))
    }
}

impl<L: Launch> Launch for RemoteLauncher<L> {
    fn name(&self) -> String {
        format!("{}@{}", self.ssh_command, self.host)
    }

    fn spawn(&self, command: &CommandSpec, options: &SpawnOptions) -> ExecOutcome<Child> {
        let remote = self.rewrite(command);
        let options = SpawnOptions {
            shell: true,
            ..options.clone()
        };

        tracing::debug!("Forwarding to {}: {}", self.host, command);

        self.base.spawn(&remote, &options)
    }
}
