//! # HANDOFF Core
//!
//! Moving a value between two domains that advance independently, with no
//! shared notion of "now" and no bound on their relative rate or phase.
//!
//! - **Stabilizing filter**: a fixed-depth register chain; a crossed value is
//!   visible only after it has propagated through every stage
//! - **Control synchronizer**: fast assertion, filtered deassertion
//! - **Handshake channel**: four-phase request/acknowledge, one word per
//!   round trip, exactly once, for every interleaving of the two domains
//!
//! ## Architecture Rules
//!
//! 1. **No shared mutable state** - each wire has exactly one writer
//! 2. **Receiver owns the filter** - crossing happens in the reader's step
//! 3. **Backpressure is not an error** - `ChannelBusy` means "poll and retry"
//!
//! ## Example
//!
//! ```rust
//! use handoff_core::{HandshakeChannel, ProducerEvent};
//!
//! let mut channel = HandshakeChannel::<u16>::new(2, 12).unwrap();
//! channel.try_send(0x0AB).unwrap();
//! assert!(channel.try_send(0x0CD).is_err()); // one transfer in flight
//!
//! let mut words = Vec::new();
//! while channel.step_producer() != ProducerEvent::Sent {
//!     words.extend(channel.step_consumer().into_word());
//! }
//! assert_eq!(words, vec![0x0AB]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bits;
pub mod config;
pub mod error;
pub mod sync;

pub use config::ChannelConfig;
pub use error::{ChannelBusy, ConfigResult, ConfigurationError, SendTimeout};
pub use sync::{
    split, ChannelStats, Consumer, ConsumerEvent, ConsumerSide, ControlSynchronizer,
    HaltHandle, HandshakeChannel, Producer, ProducerEvent, ProducerSide, ProducerState,
    StabilizingFilter, MIN_STAGES,
};
