//! CLI module for execmux
//!
//! Provides command-line interface with the following subcommands:
//! - `run` - Run one command, locally or over ssh
//! - `many` - Run several commands concurrently
//! - `config` - Show configuration

pub mod commands;
pub mod logging;

pub use commands::{Cli, Commands};
pub use logging::init_logging;
