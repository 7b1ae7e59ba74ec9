//! # Handshake Error Types
//!
//! Construction errors are fatal. `ChannelBusy` is flow control.

use std::time::Duration;

use thiserror::Error;

/// Invalid construction parameters.
///
/// Raised once, at construction time. Never retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Filter depth below the two-stage minimum.
    #[error("stabilizing filter needs at least {min} stages, got {stages}")]
    TooFewStages {
        /// Requested depth.
        stages: usize,
        /// Minimum accepted depth.
        min: usize,
    },

    /// Word type or declared width carries no bits.
    #[error("word width must be non-zero")]
    ZeroWidthWord,

    /// Declared width does not fit the word type.
    #[error("word width {width} bits exceeds the {capacity}-bit word type")]
    WordTooWide {
        /// Declared width in bits.
        width: usize,
        /// Bits available in the word type.
        capacity: usize,
    },
}

/// A transfer is already in flight (or the producer is halted).
///
/// This is backpressure, not a failure: poll the producer and retry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[error("channel busy: transfer in flight")]
pub struct ChannelBusy;

/// `send_timeout` gave up waiting.
///
/// The transfer itself was not aborted and completes on later steps.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTimeout {
    /// The channel never became free within the timeout.
    #[error("channel still busy after {0:?}")]
    Busy(Duration),

    /// The word was accepted but its round trip did not finish in time.
    #[error("transfer accepted but not completed after {0:?}")]
    Incomplete(Duration),
}

/// Result type for construction.
pub type ConfigResult<T> = Result<T, ConfigurationError>;
