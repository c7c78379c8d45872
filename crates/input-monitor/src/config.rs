//! TOML configuration for the monitor.
//!
//! Read from an explicit path or from the platform-appropriate file:
//! - Windows:  `%APPDATA%\InputMonitor\config.toml`
//! - Linux:    `~/.config/input-monitor/config.toml`
//! - macOS:    `~/Library/Application Support/InputMonitor/config.toml`
//!
//! ```toml
//! [core]
//! use_producer_thread = true
//! allow_background_joystick_events = true
//!
//! [monitor]
//! log_level = "debug"
//! output = "json"
//! run_seconds = 10
//! ```
//!
//! Both tables are optional.  The `[core]` table is passed to
//! [`InputContext::new`](input_core::InputContext::new) unchanged.

use std::path::{Path, PathBuf};

use input_core::CoreConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::output::OutputFormat;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level monitor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    #[serde(default)]
    pub core: CoreConfig,
    #[serde(default)]
    pub monitor: MonitorSection,
}

/// Settings of the monitor binary itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorSection {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub output: OutputFormat,
    /// Stop after this many seconds.  Absent means run until Ctrl-C or a quit event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_seconds: Option<u64>,
    /// Replay the built-in demo controller session.
    #[serde(default = "default_true")]
    pub demo: bool,
    /// JSON-lines file of device reports to replay instead of the demo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    /// Delay between replayed reports.
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    /// Open every controller as soon as it is announced.
    #[serde(default = "default_true")]
    pub auto_open_controllers: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_step_interval_ms() -> u64 {
    200
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            output: OutputFormat::default(),
            run_seconds: None,
            demo: default_true(),
            script: None,
            step_interval_ms: default_step_interval_ms(),
            auto_open_controllers: default_true(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the configuration from `path`, or from the platform file when `None`.
///
/// A missing file yields `MonitorConfig::default()`.  Without an explicit path
/// an undeterminable platform directory also yields the defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<MonitorConfig, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match config_file_path() {
            Ok(path) => path,
            Err(ConfigError::NoPlatformConfigDir) => return Ok(MonitorConfig::default()),
            Err(e) => return Err(e),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MonitorConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

pub fn parse_config(content: &str) -> Result<MonitorConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Renders `config` as TOML, e.g. to seed a new config file.
pub fn render_config(config: &MonitorConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("InputMonitor"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("InputMonitor")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("input-monitor"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
