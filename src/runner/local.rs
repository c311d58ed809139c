//! Local process launcher
//!
//! Spawns the command on this machine with all three standard streams piped.

use std::io;
use std::process::{Child, Command, Stdio};

use crate::error::{ExecError, ExecOutcome};

use super::traits::{CommandSpec, Launch, SpawnOptions};

/// Shell used for command lines
#[cfg(unix)]
const SHELL: (&str, &str) = ("/bin/sh", "-c");

#[cfg(windows)]
const SHELL: (&str, &str) = ("cmd", "/C");

/// Cap on the descriptor range closed by `close_other_fds`
#[cfg(unix)]
const MAX_CLOSED_FD: u64 = 65_536;

/// Launches processes on the local machine
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

impl LocalLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Build the `std::process::Command` for a spec, without spawning it
    pub fn build_command(
        &self,
        command: &CommandSpec,
        options: &SpawnOptions,
    ) -> ExecOutcome<Command> {
        let mut cmd = match (command, options.shell) {
            (spec, true) => {
                let mut cmd = Command::new(SHELL.0);
                cmd.arg(SHELL.1).arg(spec.to_shell_line());
                cmd
            }
            (CommandSpec::Line(program), false) => Command::new(program),
            (CommandSpec::Argv(argv), false) => {
                let (program, args) = argv.split_first().ok_or_else(|| ExecError::SpawnFailed {
                    command: command.to_string(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "empty argv"),
                })?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        };

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        if options.clear_env {
            cmd.env_clear();
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        if let Some(ref dir) = options.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        if options.close_other_fds {
            close_other_fds_on_exec(&mut cmd)?;
        }

        Ok(cmd)
    }
}

/// Close every descriptor above stderr in the child, right before exec.
#[cfg(unix)]
fn close_other_fds_on_exec(cmd: &mut Command) -> ExecOutcome<()> {
    use nix::sys::resource::{getrlimit, Resource};
    use std::os::unix::process::CommandExt;

    let (soft, _) = getrlimit(Resource::RLIMIT_NOFILE).map_err(io::Error::from)?;
    let limit = i32::try_from(soft.min(MAX_CLOSED_FD)).unwrap_or(i32::MAX);

    // SAFETY: the hook only calls close(2), which is async-signal-safe, and
    // allocates nothing.
    unsafe {
        cmd.pre_exec(move || {
            for fd in 3..limit {
                let _ = nix::unistd::close(fd);
            }
            Ok(())
        });
    }
    Ok(())
}

impl Launch for LocalLauncher {
    fn name(&self) -> String {
        "local".to_string()
    }

    fn spawn(&self, command: &CommandSpec, options: &SpawnOptions) -> ExecOutcome<Child> {
        let mut cmd = self.build_command(command, options)?;

        tracing::debug!("Spawning: {}", command);

        cmd.spawn().map_err(|source| ExecError::SpawnFailed {
            command: command.to_string(),
            source,
        })
    }
}
