//! Common traits and types for process launchers
//!
//! Defines the capability every launcher (local, remote) implements, plus the
//! command and option types the launch boundary accepts.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Child;
use std::time::Duration;

use crate::error::ExecOutcome;
use crate::runner::quote::quote;

/// A command to launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// A single command line, interpreted by the shell when `shell` is set
    Line(String),
    /// argv-style tokens, the first one naming the program
    Argv(Vec<String>),
}

impl CommandSpec {
    /// Render as one shell line, quoting argv tokens
    pub fn to_shell_line(&self) -> String {
        match self {
            CommandSpec::Line(line) => line.clone(),
            CommandSpec::Argv(argv) => argv.iter().map(|a| quote(a)).collect::<Vec<_>>().join(" "),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Line(line) => f.write_str(line),
            CommandSpec::Argv(argv) => write!(f, "{:?}", argv),
        }
    }
}

impl From<&str> for CommandSpec {
    fn from(line: &str) -> Self {
        CommandSpec::Line(line.to_string())
    }
}

impl From<String> for CommandSpec {
    fn from(line: String) -> Self {
        CommandSpec::Line(line)
    }
}

impl From<Vec<String>> for CommandSpec {
    fn from(argv: Vec<String>) -> Self {
        CommandSpec::Argv(argv)
    }
}

impl From<&[&str]> for CommandSpec {
    fn from(argv: &[&str]) -> Self {
        CommandSpec::Argv(argv.iter().map(|a| a.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandSpec {
    fn from(argv: [&str; N]) -> Self {
        CommandSpec::Argv(argv.iter().map(|a| a.to_string()).collect())
    }
}

/// What a launcher needs to know to start a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOptions {
    /// Run the command through the platform shell
    pub shell: bool,
    /// Environment variables to set
    pub env: HashMap<String, String>,
    /// Start from an empty environment instead of inheriting ours
    pub clear_env: bool,
    /// Working directory for the process
    pub working_dir: Option<PathBuf>,
    /// Close every inherited descriptor above stderr in the child (unix)
    pub close_other_fds: bool,
}

impl Default for SpawnOptions {
    fn default() -> Self {
        Self {
            shell: true,
            env: HashMap::new(),
            clear_env: false,
            working_dir: None,
            close_other_fds: false,
        }
    }
}

/// Capability to turn a command into a running process.
///
/// Implementations must hand back a child whose stdin, stdout and stderr are
/// all piped.
#[cfg_attr(test, mockall::automock)]
pub trait Launch: Send + Sync {
    /// Get the name of this launcher (e.g., "local", "ssh")
    fn name(&self) -> String;

    /// Spawn `command`.
    ///
    /// # Errors
    /// * `ExecError::SpawnFailed` - If the process could not be started
    fn spawn(&self, command: &CommandSpec, options: &SpawnOptions) -> ExecOutcome<Child>;
}

/// Options for one execution
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Run the command through the shell
    pub shell: bool,
    /// Fail `poll()`/`wait()` with `ExecutionError` on a non-zero exit
    pub assert_success: bool,
    /// Bytes fed to the process' stdin
    pub stdin: Option<Vec<u8>>,
    /// Relative timeout, turned into an absolute deadline at spawn
    pub timeout: Option<Duration>,
    /// Environment variables to set
    pub env: HashMap<String, String>,
    /// Start from an empty environment
    pub clear_env: bool,
    /// Working directory for the command
    pub working_dir: Option<PathBuf>,
    /// Close inherited descriptors above stderr in the child
    pub close_other_fds: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            shell: true,
            assert_success: false,
            stdin: None,
            timeout: None,
            env: HashMap::new(),
            clear_env: false,
            working_dir: None,
            close_other_fds: false,
        }
    }
}

impl ExecOptions {
    /// Create options with a working directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Feed `input` to the process' stdin
    pub fn with_stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set timeout in seconds
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        self.with_timeout(Duration::from_secs(secs))
    }

    /// Turn on the assert-success policy
    pub fn assert_success(mut self) -> Self {
        self.assert_success = true;
        self
    }

    /// Run argv directly instead of through the shell
    pub fn without_shell(mut self) -> Self {
        self.shell = false;
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Start from an empty environment; only `env` is visible to the process
    pub fn with_clear_env(mut self) -> Self {
        self.clear_env = true;
        self
    }

    /// Close inherited descriptors above stderr in the child
    pub fn with_close_other_fds(mut self) -> Self {
        self.close_other_fds = true;
        self
    }

    /// The part of these options a launcher cares about
    pub fn spawn_options(&self) -> SpawnOptions {
        SpawnOptions {
            shell: self.shell,
            env: self.env.clone(),
            clear_env: self.clear_env,
            working_dir: self.working_dir.clone(),
            close_other_fds: self.close_other_fds,
        }
    }
}
