//! # Cross-Domain Synchronization Primitives
//!
//! Two domains, no shared clock, no shared mutable state.
//!
//! ## The Problem
//!
//! ```text
//! Producer domain:  writes word, raises REQUEST
//! Consumer domain:  must read word exactly once
//!
//! Direct read:  consumer may see a value mid-change, or the same value twice
//! With a lock:  both domains now share progress (the thing we cannot assume)
//! ```
//!
//! ## The Solution: Four-Phase Handshake
//!
//! ```text
//!   PRODUCER                                   CONSUMER
//!   try_send(w) ── REQUEST ──► [filter] ──►  rising edge: NewData(w)
//!                                             ack = request_crossed
//!   Send→Finish ◄── [filter] ◄── ACK ───────
//!   (request withdrawn)  ── ──► [filter] ──►  ack falls
//!   Finish→Idle: Sent ◄── [filter] ◄── ─────
//! ```
//!
//! Every wire is written by exactly one domain and read through a
//! [`StabilizingFilter`] owned by the other. Nothing else crosses.

mod control;
mod filter;
mod handshake;
mod split;

pub use control::ControlSynchronizer;
pub use filter::StabilizingFilter;
pub use handshake::{
    ChannelStats, ConsumerEvent, ConsumerSide, HandshakeChannel, ProducerEvent, ProducerSide,
    ProducerState,
};
pub use split::{split, Consumer, HaltHandle, Producer};

/// Minimum filter depth.
pub const MIN_STAGES: usize = 2;
