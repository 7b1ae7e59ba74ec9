//! # Simulation Configuration
//!
//! External TOML, loaded once:
//!
//! ```toml
//! seed = 7
//! words = 100
//! max_steps = 100000
//! timeout_ms = 5000
//!
//! [channel]
//! stages = 3
//! word_width_bits = 16
//!
//! [schedule]
//! kind = "starvation"
//! max_burst = 32
//! ```

use std::path::Path;
use std::time::Duration;

use handoff_core::ChannelConfig;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::schedule::ScheduleConfig;

/// One simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Channel under test.
    pub channel: ChannelConfig,
    /// Domain stepping schedule (cooperative runs).
    pub schedule: ScheduleConfig,
    /// Seed for schedules and word generation.
    pub seed: u64,
    /// Words to push through the channel.
    pub words: usize,
    /// Step budget before a cooperative run counts as stalled.
    pub max_steps: u64,
    /// Wall-clock budget for threaded runs.
    pub timeout_ms: u64,
    /// Upper bound on busy-wait iterations injected per threaded step.
    pub max_spin: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            schedule: ScheduleConfig::default(),
            seed: 0x5EED,
            words: 256,
            max_steps: 1_000_000,
            timeout_ms: 10_000,
            max_spin: 64,
        }
    }
}

impl SimConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// `Toml` on malformed input.
    pub fn from_toml_str(text: &str) -> SimResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Toml` if it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Threaded-run deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
