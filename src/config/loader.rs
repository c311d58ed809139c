//! Configuration loader with XDG-compliant path resolution
//!
//! Layers, from lowest to highest priority:
//! 1. built-in defaults
//! 2. `/etc/execmux/config.toml`
//! 3. `$XDG_CONFIG_HOME/execmux/config.toml`
//! 4. `~/.execmux.toml`
//! 5. `./.execmux.toml`
//! 6. the file given with `--config`
//! 7. `EXECMUX_*` environment variables

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use super::model::Config;

/// Application name used for XDG directories
const APP_NAME: &str = "execmux";

/// Prefix of configuration environment variables
const ENV_PREFIX: &str = "EXECMUX_";

/// Config file search paths, lowest priority first
pub fn config_paths() -> Vec<PathBuf> {
    let system = PathBuf::from("/etc").join(APP_NAME).join("config.toml");
    let xdg = dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"));
    let home = dirs::home_dir().map(|home| home.join(format!(".{}.toml", APP_NAME)));
    let local = PathBuf::from(format!(".{}.toml", APP_NAME));

    std::iter::once(system)
        .chain(xdg)
        .chain(home)
        .chain(std::iter::once(local))
        .collect()
}

/// Load the layered configuration.
///
/// # Arguments
/// * `override_path` - Config file layered above every search path; a missing
///   file is skipped with a warning
///
/// # Errors
/// Returns an error if a present file is not valid TOML or a value has the
/// wrong type
pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    for path in find_config_files() {
        tracing::debug!("Loading config from: {}", path.display());
        figment = figment.merge(Toml::file(&path));
    }

    match override_path {
        Some(path) if path.exists() => {
            tracing::debug!("Loading override config from: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        Some(path) => tracing::warn!("Override config not found: {}", path.display()),
        None => {}
    }

    // EXECMUX_EXECUTION__TIMEOUT=600 sets execution.timeout
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")
}

/// Config files that exist on this machine, lowest priority first
pub fn find_config_files() -> Vec<PathBuf> {
    config_paths().into_iter().filter(|p| p.exists()).collect()
}
