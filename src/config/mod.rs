//! Configuration for the shell bridge
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! `PENPI_*` environment variables, then command-line overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub mod loader;


pub use loader::{default_config_path, load_config, parse_config};

pub const DEFAULT_SHELL: &str = "/bin/bash";
pub const DEFAULT_QUIESCENCE_WINDOW: Duration = Duration::from_millis(100);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_DRAIN: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PenpiConfig {
    #[serde(default)]
    pub shell: ShellConfig,

    #[serde(default)]
    pub bridge: BridgeSettings,
}

/// The interactive process behind the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment layered over the inherited one
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Directory the shell changes into once it starts
    #[serde(default = "default_home_dir", skip_serializing_if = "Option::is_none")]
    pub home_dir: Option<PathBuf>,
}

/// Timing of drains and notification polling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// How long a drain waits for the next unit before calling output complete
    #[serde(with = "humantime_serde", default = "default_quiescence_window")]
    pub quiescence_window: Duration,

    /// Period of the pending-output check while notifications are enabled
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Upper bound on a single drain while output keeps arriving
    #[serde(with = "humantime_serde", default = "default_max_drain")]
    pub max_drain: Duration,
}

fn default_program() -> String {
    DEFAULT_SHELL.to_string()
}

fn default_home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

fn default_quiescence_window() -> Duration {
    DEFAULT_QUIESCENCE_WINDOW
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_max_drain() -> Duration {
    DEFAULT_MAX_DRAIN
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            env: BTreeMap::new(),
            home_dir: default_home_dir(),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            quiescence_window: DEFAULT_QUIESCENCE_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_drain: DEFAULT_MAX_DRAIN,
        }
    }
}

impl PenpiConfig {
    pub fn merge_env_vars(&mut self) {
        self.merge_env_from(|key| std::env::var(key).ok());
    }

    /// Apply `PENPI_*` overrides using `lookup` as the environment
    pub fn merge_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(shell) = lookup("PENPI_SHELL") {
            self.shell.program = shell;
        }

        if let Some(home) = lookup("PENPI_HOME_DIR") {
            self.shell.home_dir = Some(PathBuf::from(home));
        }

        if let Some(ms) = lookup("PENPI_QUIESCENCE_MS") {
            match ms.parse::<u64>() {
                Ok(value) => self.bridge.quiescence_window = Duration::from_millis(value),
                Err(_) => tracing::warn!("Ignoring invalid PENPI_QUIESCENCE_MS: {}", ms),
            }
        }

        if let Some(ms) = lookup("PENPI_POLL_INTERVAL_MS") {
            match ms.parse::<u64>() {
                Ok(value) => self.bridge.poll_interval = Duration::from_millis(value),
                Err(_) => tracing::warn!("Ignoring invalid PENPI_POLL_INTERVAL_MS: {}", ms),
            }
        }

        if let Some(ms) = lookup("PENPI_MAX_DRAIN_MS") {
            match ms.parse::<u64>() {
                Ok(value) => self.bridge.max_drain = Duration::from_millis(value),
                Err(_) => tracing::warn!("Ignoring invalid PENPI_MAX_DRAIN_MS: {}", ms),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.shell.program.trim().is_empty() {
            return Err(Error::Config("shell.program must not be empty".to_string()));
        }

        if self.bridge.quiescence_window.is_zero() {
            return Err(Error::Config(
                "bridge.quiescence_window must be greater than zero".to_string(),
            ));
        }

        if self.bridge.poll_interval.is_zero() {
            return Err(Error::Config(
                "bridge.poll_interval must be greater than zero".to_string(),
            ));
        }

        if self.bridge.quiescence_window >= self.bridge.poll_interval {
            return Err(Error::Config(format!(
                "bridge.quiescence_window ({:?}) must be shorter than bridge.poll_interval ({:?})",
                self.bridge.quiescence_window, self.bridge.poll_interval
            )));
        }

        if self.bridge.max_drain < self.bridge.quiescence_window {
            return Err(Error::Config(format!(
                "bridge.max_drain ({:?}) must be at least bridge.quiescence_window ({:?})",
                self.bridge.max_drain, self.bridge.quiescence_window
            )));
        }

        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
