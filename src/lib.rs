//! execmux - process execution with multiplexed, non-blocking pipe I/O
//!
//! Launches child processes locally or through ssh and collects their output
//! from a single thread:
//! - **IoLoop** - readiness multiplexer over pipe handles (`poll(2)` on unix,
//!   peek-based emulation on windows)
//! - **ExecResult** - per-process state machine owning the pipes and buffers
//! - **Waiter** - waits on many results at once, honouring deadlines
//! - **Runner** - `execute*` entry points over a local or remote launcher
//!
//! ## Example
//!
//! ```no_run
//! use execmux::{ExecOptions, Runner};
//!
//! let runner = Runner::local();
//! let result = runner.execute("cat", &ExecOptions::default().with_stdin("hello"))?;
//! assert_eq!(result.stdout(), b"hello");
//! # Ok::<(), execmux::ExecError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod runner;
pub mod sys;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{CommandTimeout, ErrorInfo, ExecError, ExecOutcome, ExecutionError};
pub use executor::{
    wait_async, wait_for_many_async, wait_for_many_results, ExecResult, IoLoop, Readiness, Waiter,
};
pub use runner::{
    quote, CommandSpec, ExecOptions, Launch, LocalLauncher, RemoteLauncher, Runner, SpawnOptions,
};
