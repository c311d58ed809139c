//! Configuration model for execmux
//!
//! Defines the structure for XDG-compliant layered configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::executor::Waiter;
use crate::runner::{ExecOptions, Runner, DEFAULT_SSH_COMMAND};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Defaults for every execution
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Remote execution settings
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Defaults applied to every execution
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Default timeout in seconds (0 = wait forever)
    #[serde(default)]
    pub timeout: u64,

    /// How long one I/O loop iteration may block while waiting, in milliseconds
    /// (raised to 1 if lower)
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Run commands through the shell
    #[serde(default = "default_shell")]
    pub shell: bool,

    /// Close inherited descriptors above stderr in children
    #[serde(default)]
    pub close_other_fds: bool,
}

fn default_sample_interval_ms() -> u64 {
    50
}

fn default_shell() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: 0,
            sample_interval_ms: default_sample_interval_ms(),
            shell: default_shell(),
            close_other_fds: false,
        }
    }
}

/// Remote execution configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Remote-shell binary used to reach other hosts
    #[serde(default = "default_ssh_command")]
    pub ssh_command: String,
}

fn default_ssh_command() -> String {
    DEFAULT_SSH_COMMAND.to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            ssh_command: default_ssh_command(),
        }
    }
}

impl ExecutionConfig {
    /// Default timeout, `None` when unlimited
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn waiter(&self) -> Waiter {
        Waiter::new(self.sample_interval())
    }

    /// Execution options seeded from these defaults
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            shell: self.shell,
            close_other_fds: self.close_other_fds,
            ..Default::default()
        }
    }
}

impl Config {
    /// Local runner carrying the configured timeout and sampling
    pub fn runner(&self) -> Runner {
        Runner::local()
            .with_default_timeout(self.execution.timeout())
            .with_waiter(self.execution.waiter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::{Format, Serialized, Toml};
    use figment::Figment;

    fn from_toml(toml: &str) -> Config {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.execution.timeout, 0);
        assert_eq!(config.execution.sample_interval_ms, 50);
        assert!(config.execution.shell);
        assert!(!config.execution.close_other_fds);
        assert_eq!(config.remote.ssh_command, "ssh");
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let config = from_toml(
            r#"
            [execution]
            timeout = 600
        "#,
        );

        assert_eq!(config.execution.timeout, 600);
        // Defaults should still apply
        assert_eq!(config.execution.sample_interval_ms, 50);
        assert_eq!(config.remote.ssh_command, "ssh");
    }

    #[test]
    fn test_deserialize_full_config() {
        let config = from_toml(
            r#"
            [execution]
            timeout = 120
            sample_interval_ms = 10
            shell = false
            close_other_fds = true

            [remote]
            ssh_command = "/usr/bin/ssh"
        "#,
        );

        assert_eq!(config.execution.timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.execution.sample_interval(), Duration::from_millis(10));
        assert!(!config.execution.shell);
        assert!(config.execution.close_other_fds);
        assert_eq!(config.remote.ssh_command, "/usr/bin/ssh");
    }

    #[test]
    fn test_zero_sample_interval_does_not_spin() {
        let config = from_toml(
            r#"
            [execution]
            sample_interval_ms = 0
        "#,
        );

        assert_eq!(
            config.execution.waiter().sample_interval(),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_zero_timeout_means_none() {
        assert_eq!(ExecutionConfig::default().timeout(), None);
    }

    #[test]
    fn test_exec_options_from_config() {
        let execution = ExecutionConfig {
            shell: false,
            close_other_fds: true,
            ..Default::default()
        };

        let options = execution.exec_options();

        assert!(!options.shell);
        assert!(options.close_other_fds);
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_runner_from_config() {
        let config = from_toml(
            r#"
            [execution]
            timeout = 30
            sample_interval_ms = 20
        "#,
        );

        let runner = config.runner();

        assert_eq!(runner.default_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(runner.waiter().sample_interval(), Duration::from_millis(20));
    }
}
