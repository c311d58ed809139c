//! Configuration module for execmux
//!
//! Provides XDG-compliant layered configuration loading for execution
//! defaults and remote settings.

pub mod loader;
pub mod model;

pub use loader::{config_paths, find_config_files, load_config};
pub use model::*;
