//! Launch boundary and runners
//!
//! Provides:
//! - The `Launch` capability with local and ssh-remote launchers
//! - Shell quoting for forwarded commands
//! - `Runner`, the `execute*` entry points built on a launcher

pub mod execute;
pub mod local;
pub mod quote;
pub mod remote;
pub mod traits;

pub use execute::Runner;
pub use local::LocalLauncher;
pub use quote::quote;
pub use remote::{RemoteLauncher, DEFAULT_SSH_COMMAND};
pub use traits::*;
