//! CLI command definitions using clap
//!
//! Defines all CLI subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::CommandSpec;

/// Run commands locally or over ssh and capture their output.
///
/// Children are driven through a single readiness loop: output is collected
/// while they run, and deadlines are enforced without threads per process.
#[derive(Parser, Debug)]
#[command(name = "execmux")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (implies debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (overrides default XDG paths)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (overrides EXECMUX_LOG)
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one command and wait for it
    Run(RunArgs),

    /// Run several shell commands concurrently and wait for all of them
    Many(ManyArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the `run` subcommand
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Timeout in seconds (0 for no timeout, default from config)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Run on this host through ssh
    #[arg(long)]
    pub ssh: Option<String>,

    /// Treat a non-zero exit code as an error
    #[arg(short, long)]
    pub assert_success: bool,

    /// Text fed to the command's stdin
    #[arg(long)]
    pub stdin: Option<String>,

    /// Execute argv directly instead of through the shell
    #[arg(long)]
    pub no_shell: bool,

    /// Environment variables in KEY=VALUE format
    #[arg(short = 'e', long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Working directory for the command
    #[arg(short = 'C', long)]
    pub dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// The command: one shell line, or argv tokens
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// A single token through the shell is a command line; anything else is
    /// argv.
    pub fn command_spec(&self) -> CommandSpec {
        match self.command.as_slice() {
            [line] if !self.no_shell => CommandSpec::Line(line.clone()),
            argv => CommandSpec::Argv(argv.to_vec()),
        }
    }

    /// Convert env args to a HashMap
    pub fn env_as_map(&self) -> HashMap<String, String> {
        self.env.iter().cloned().collect()
    }

    /// `Some(None)` means the timeout was explicitly disabled
    pub fn timeout(&self) -> Option<Option<Duration>> {
        self.timeout.map(secs_to_timeout)
    }
}

/// Arguments for the `many` subcommand
#[derive(Parser, Debug)]
pub struct ManyArgs {
    /// Overall timeout in seconds; unfinished commands are killed
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Shell command lines, one per process
    #[arg(required = true)]
    pub commands: Vec<String>,
}

impl ManyArgs {
    /// `Some(None)` means the timeout was explicitly disabled
    pub fn timeout(&self) -> Option<Option<Duration>> {
        self.timeout.map(secs_to_timeout)
    }
}

/// Arguments for the `config` subcommand
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Text,
    /// JSON output
    Json,
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn secs_to_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Parse KEY=VALUE argument
fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid argument '{}': expected KEY=VALUE format", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
