//! Error types for execmux
//!
//! Every failure is returned to the immediate caller of `wait()`, `poll()` or
//! one of the `execute*()` entry points; there is no background error channel.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::executor::ExecResult;
use crate::sys::{Interest, RawPipe};

/// Result alias used throughout the crate
pub type ExecOutcome<T> = Result<T, ExecError>;

/// Main error type for process execution
#[derive(Error, Debug)]
pub enum ExecError {
    /// The process exited non-zero while the assert-success policy was set
    #[error("{0}")]
    Execution(Box<ExecutionError>),

    /// A wait deadline elapsed before the process finished
    #[error("{0}")]
    Timeout(Box<CommandTimeout>),

    /// The launcher could not start the process
    #[error("Failed to spawn command: {command}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The I/O loop registration contract was violated (a caller bug)
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ExecError {
    /// True for both a failed exit status and a timeout, the latter being a
    /// specialization of the former.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, ExecError::Execution(_) | ExecError::Timeout(_))
    }

    /// True if this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout(_))
    }

    /// Exit code recorded by an execution failure
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecError::Execution(e) => Some(e.exit_code),
            _ => None,
        }
    }
}

/// Details of a process that exited non-zero under the assert-success policy
#[derive(Debug, Clone)]
pub struct ExecutionError {
    pub command: String,
    pub pid: u32,
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Execution of {:?} failed!\nresult={}\nstdout={:?}\nstderr={:?}",
            self.command,
            self.exit_code,
            String::from_utf8_lossy(&self.stdout),
            String::from_utf8_lossy(&self.stderr)
        )
    }
}

/// A wait that ran past its deadline.
///
/// The process is left running. `result` holds the still-running
/// [`ExecResult`] when the library owned it at the time (e.g.
/// [`Runner::execute`](crate::runner::Runner::execute)); when the caller
/// already holds the result (e.g. [`ExecResult::wait`]) it is `None`.
/// Either way the caller is expected to `kill()` it.
#[derive(Debug)]
pub struct CommandTimeout {
    pub command: String,
    pub pid: u32,
    pub result: Option<ExecResult>,
}

impl CommandTimeout {
    /// Take the still-running result out of the error, if it was attached
    pub fn take_result(&mut self) -> Option<ExecResult> {
        self.result.take()
    }
}

impl fmt::Display for CommandTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command timed out: <pid {}: {}>", self.pid, self.command)
    }
}

/// Violations of the single-registration contract of the I/O loop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("multiple {interest} registrations on pipe {pipe:?}")]
    AlreadyRegistered { interest: Interest, pipe: RawPipe },

    #[error("pipe {pipe:?} is not registered for {interest}")]
    NotRegistered { interest: Interest, pipe: RawPipe },
}

/// Serializable error info for JSON output
#[derive(Debug, Serialize, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl From<&ExecError> for ErrorInfo {
    fn from(err: &ExecError) -> Self {
        match err {
            ExecError::Execution(e) => ErrorInfo {
                message: format!("Execution of {:?} failed", e.command),
                error_type: "execution_error".to_string(),
                suggestion: None,
                exit_code: Some(e.exit_code),
                pid: Some(e.pid),
                stdout: Some(String::from_utf8_lossy(&e.stdout).into_owned()),
                stderr: Some(String::from_utf8_lossy(&e.stderr).into_owned()),
            },
            ExecError::Timeout(t) => ErrorInfo {
                message: t.to_string(),
                error_type: "command_timeout".to_string(),
                suggestion: Some(
                    "The process is still running; kill it or wait again with a longer timeout"
                        .to_string(),
                ),
                exit_code: None,
                pid: Some(t.pid),
                stdout: t
                    .result
                    .as_ref()
                    .map(|r| String::from_utf8_lossy(r.stdout()).into_owned()),
                stderr: t
                    .result
                    .as_ref()
                    .map(|r| String::from_utf8_lossy(r.stderr()).into_owned()),
            },
            ExecError::SpawnFailed { command, source } => ErrorInfo {
                message: format!("Failed to spawn command: {}", command),
                error_type: "spawn_failed".to_string(),
                suggestion: Some(format!("Check if the command exists: {}", source)),
                exit_code: None,
                pid: None,
                stdout: None,
                stderr: None,
            },
            ExecError::Registration(e) => ErrorInfo {
                message: format!("Registration error: {}", e),
                error_type: "registration_error".to_string(),
                suggestion: None,
                exit_code: None,
                pid: None,
                stdout: None,
                stderr: None,
            },
            ExecError::Io(e) => ErrorInfo {
                message: format!("IO error: {}", e),
                error_type: "io_error".to_string(),
                suggestion: None,
                exit_code: None,
                pid: None,
                stdout: None,
                stderr: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution_error() -> ExecError {
        ExecError::Execution(Box::new(ExecutionError {
            command: "false".to_string(),
            pid: 42,
            exit_code: 1,
            stdout: b"out".to_vec(),
            stderr: b"err".to_vec(),
        }))
    }

    #[test]
    fn test_execution_error_display() {
        let err = execution_error();
        let message = err.to_string();

        assert!(message.starts_with("Execution of \"false\" failed!"));
        assert!(message.contains("result=1"));
        assert!(message.contains("stdout=\"out\""));
        assert!(message.contains("stderr=\"err\""));
    }

    #[test]
    fn test_timeout_is_an_execution_error() {
        let err = ExecError::Timeout(Box::new(CommandTimeout {
            command: "sleep 100".to_string(),
            pid: 7,
            result: None,
        }));

        assert!(err.is_execution_error());
        assert!(err.is_timeout());
        assert_eq!(err.exit_code(), None);
        assert_eq!(err.to_string(), "Command timed out: <pid 7: sleep 100>");
    }

    #[test]
    fn test_execution_error_helpers() {
        let err = execution_error();
        assert!(err.is_execution_error());
        assert!(!err.is_timeout());
        assert_eq!(err.exit_code(), Some(1));

        let io = ExecError::from(io::Error::other("boom"));
        assert!(!io.is_execution_error());
    }

    #[test]
    fn test_spawn_failed_keeps_source() {
        use std::error::Error as _;

        let err = ExecError::SpawnFailed {
            command: "nope".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };

        assert_eq!(err.to_string(), "Failed to spawn command: nope");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::AlreadyRegistered {
            interest: Interest::Read,
            pipe: sample_pipe(),
        };
        assert!(err.to_string().contains("multiple read registrations"));
    }

    fn sample_pipe() -> RawPipe {
        3
    }

    #[test]
    fn test_error_info_execution() {
        let info = ErrorInfo::from(&execution_error());

        assert_eq!(info.error_type, "execution_error");
        assert_eq!(info.exit_code, Some(1));
        assert_eq!(info.stdout.as_deref(), Some("out"));
        assert_eq!(info.stderr.as_deref(), Some("err"));
    }

    #[test]
    fn test_error_info_skips_empty_fields() {
        let err = ExecError::Io(io::Error::other("disk on fire"));
        let json = serde_json::to_string(&ErrorInfo::from(&err)).unwrap();

        assert!(json.contains("io_error"));
        assert!(!json.contains("suggestion"));
        assert!(!json.contains("exit_code"));
        assert!(!json.contains("stdout"));
    }
}
