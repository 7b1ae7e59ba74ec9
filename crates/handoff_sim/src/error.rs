//! # Simulation Error Types

use std::time::Duration;

use handoff_core::ConfigurationError;
use thiserror::Error;

/// A broken protocol invariant. Always a bug in the channel, never in the
/// caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The consumer saw more words than the producer had accepted.
    #[error("delivery #{index} with only {accepted} words accepted")]
    DuplicateDelivery {
        /// Zero-based delivery index.
        index: usize,
        /// Sends accepted so far.
        accepted: usize,
    },

    /// A word arrived out of order or corrupted.
    #[error("delivery #{index}: expected {expected}, got {got}")]
    WrongWord {
        /// Zero-based delivery index.
        index: usize,
        /// Word the producer sent.
        expected: String,
        /// Word the consumer received.
        got: String,
    },

    /// The producer completed a transfer the consumer never saw.
    #[error("completion #{completed} with only {delivered} words delivered")]
    CompletionWithoutDelivery {
        /// Completions so far.
        completed: usize,
        /// Deliveries so far.
        delivered: usize,
    },

    /// `try_send` was accepted while a transfer was in flight.
    #[error("send accepted in flight at step {step}")]
    AcceptedInFlight {
        /// Harness step.
        step: u64,
    },

    /// A rejected `try_send` changed producer state.
    #[error("busy rejection mutated producer state at step {step}")]
    BusyProbeMutated {
        /// Harness step.
        step: u64,
    },

    /// Step budget exhausted with words outstanding.
    #[error("stalled after {steps} steps: {completed}/{total} completed")]
    Stalled {
        /// Steps executed.
        steps: u64,
        /// Completions reached.
        completed: usize,
        /// Words in the script.
        total: usize,
    },
}

/// Errors from configuring or running a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    /// Channel construction rejected the config.
    #[error("channel config: {0}")]
    Config(#[from] ConfigurationError),

    /// Schedule parameters make progress impossible.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Config file did not parse.
    #[error("config parse: {0}")]
    Toml(#[from] toml::de::Error),

    /// Config file could not be read.
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    /// The channel broke an invariant.
    #[error("protocol violation: {0}")]
    Violation(#[from] Violation),

    /// A threaded run exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A domain thread panicked.
    #[error("domain thread '{0}' panicked")]
    ThreadPanicked(&'static str),
}

/// Result type for simulation runs.
pub type SimResult<T> = Result<T, SimError>;
