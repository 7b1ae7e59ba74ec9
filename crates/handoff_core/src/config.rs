//! # Channel Configuration
//!
//! Loaded once at startup (typically from a TOML table), validated before
//! any channel is built.

use serde::{Deserialize, Serialize};

use crate::bits::check_word_width;
use crate::error::{ConfigResult, ConfigurationError};
use crate::sync::MIN_STAGES;

/// Construction parameters shared by every channel form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Depth of each stabilizing filter (request and acknowledge paths).
    pub stages: usize,
    /// Declared width of the transferred word, in bits.
    pub word_width_bits: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            stages: MIN_STAGES,
            word_width_bits: 32,
        }
    }
}

impl ChannelConfig {
    /// Creates a config with the given depth and width.
    #[must_use]
    pub const fn new(stages: usize, word_width_bits: usize) -> Self {
        Self {
            stages,
            word_width_bits,
        }
    }

    /// Checks the config against the word type `T`.
    ///
    /// # Errors
    ///
    /// Returns the first violated construction rule.
    pub fn validate<T>(&self) -> ConfigResult<()> {
        if self.stages < MIN_STAGES {
            return Err(ConfigurationError::TooFewStages {
                stages: self.stages,
                min: MIN_STAGES,
            });
        }
        check_word_width::<T>(self.word_width_bits)
    }

    /// Producer steps of the slower domain a full round trip needs at best.
    ///
    /// Request and acknowledge each cross one filter, twice (rise and fall).
    #[must_use]
    pub const fn min_round_trip_steps(&self) -> usize {
        self.stages * 2
    }
}
