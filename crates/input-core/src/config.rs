//! Runtime configuration of an [`InputContext`](crate::context::InputContext).
//!
//! `CoreConfig` is plain data.  The core never reads files for it; hosts
//! embed it in their own configuration (the monitor keeps it under a `[core]`
//! TOML table) and hand the parsed value to `InputContext::new`.
//!
//! ```toml
//! [core]
//! queue_capacity = 4096
//! use_producer_thread = true
//! allow_background_joystick_events = true
//! mapping_files = ["/etc/input/gamecontrollerdb.txt"]
//! ```
//!
//! Every field has a `#[serde(default = ...)]` helper, so a missing field,
//! or a missing table, behaves exactly like `CoreConfig::default()`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the event system and device subsystems.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoreConfig {
    /// Maximum number of queued events.  Pushes beyond this are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Poll producers from a dedicated thread instead of from the consumer.
    #[serde(default)]
    pub use_producer_thread: bool,
    /// Sleep between producer-thread iterations.
    #[serde(default = "default_producer_interval_ms")]
    pub producer_interval_ms: u64,
    /// Upper bound on how long `wait` sleeps before pumping producers again.
    #[serde(default = "default_wait_granularity_ms")]
    pub wait_granularity_ms: u64,
    /// Deliver joystick events even when no window has keyboard focus.
    #[serde(default)]
    pub allow_background_joystick_events: bool,
    #[serde(default = "default_double_click_time_ms")]
    pub double_click_time_ms: u64,
    /// Maximum pointer travel, in pixels per axis, between the presses of a multi-click.
    #[serde(default = "default_double_click_radius")]
    pub double_click_radius: i32,
    /// Environment variable holding extra controller mapping records.
    #[serde(default = "default_mapping_env_var")]
    pub mapping_env_var: String,
    /// Controller mapping files loaded at startup, in order.
    #[serde(default)]
    pub mapping_files: Vec<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_queue_capacity() -> usize {
    crate::events::DEFAULT_CAPACITY
}
fn default_producer_interval_ms() -> u64 {
    1
}
fn default_wait_granularity_ms() -> u64 {
    10
}
fn default_double_click_time_ms() -> u64 {
    500
}
fn default_double_click_radius() -> i32 {
    1
}
fn default_mapping_env_var() -> String {
    "INPUTCORE_CONTROLLERCONFIG".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            use_producer_thread: false,
            producer_interval_ms: default_producer_interval_ms(),
            wait_granularity_ms: default_wait_granularity_ms(),
            allow_background_joystick_events: false,
            double_click_time_ms: default_double_click_time_ms(),
            double_click_radius: default_double_click_radius(),
            mapping_env_var: default_mapping_env_var(),
            mapping_files: Vec::new(),
        }
    }
}

impl CoreConfig {
    pub fn producer_interval(&self) -> Duration {
        Duration::from_millis(self.producer_interval_ms)
    }

    /// Wait granularity, never shorter than one millisecond.
    pub fn wait_granularity(&self) -> Duration {
        Duration::from_millis(self.wait_granularity_ms.max(1))
    }

    pub fn double_click_time(&self) -> Duration {
        Duration::from_millis(self.double_click_time_ms)
    }
}
