//! # Handshake Channel
//!
//! Four-phase request/acknowledge transfer of one word per round trip.
//!
//! ## Producer FSM
//!
//! ```text
//!             try_send (accepted)
//!   ┌──────┐ ─────────────────────► ┌──────┐
//!   │ Idle │                        │ Send │  request = 1
//!   └──────┘ ◄──────┐               └──┬───┘
//!       ▲           │ ack_crossed = 0  │ ack_crossed = 1
//!       │  Sent     │                  ▼
//!       └───────────┴─────────────  ┌────────┐
//!                                   │ Finish │  request = 0
//!                                   └────────┘
//! ```
//!
//! ## Consumer
//!
//! Latches the staged word on the rising edge of `request_crossed` and
//! mirrors `request_crossed` back as the acknowledge. Nothing else.
//!
//! ## Ownership
//!
//! [`ProducerSide`] and [`ConsumerSide`] are the two domains' private state.
//! Each owns the filter that samples its peer's output. [`HandshakeChannel`]
//! bundles both for cooperative stepping; [`crate::split`] hands them to two
//! threads.

use crate::config::ChannelConfig;
use crate::error::{ChannelBusy, ConfigResult};
use crate::sync::{ControlSynchronizer, StabilizingFilter};

/// Producer FSM state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProducerState {
    /// No transfer in flight. The only state that accepts a send.
    #[default]
    Idle,
    /// Request raised, waiting for the acknowledge to rise.
    Send,
    /// Request withdrawn, waiting for the acknowledge to fall.
    Finish,
}

impl ProducerState {
    /// Name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Send => "SEND",
            Self::Finish => "FINISH",
        }
    }
}

/// Outcome of one producer step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum ProducerEvent {
    /// Nothing in flight.
    Idle,
    /// Round trip in progress.
    InFlight,
    /// The round trip just completed. Emitted once per transfer.
    Sent,
}

/// Outcome of one consumer step.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum ConsumerEvent<T> {
    /// No new word this step.
    Idle,
    /// A new word arrived. Emitted once per transfer.
    NewData(T),
}

impl<T> ConsumerEvent<T> {
    /// Returns the delivered word, if any.
    #[inline]
    pub fn into_word(self) -> Option<T> {
        match self {
            Self::NewData(word) => Some(word),
            Self::Idle => None,
        }
    }

    /// Whether this step delivered a word.
    #[inline]
    #[must_use]
    pub const fn is_new_data(&self) -> bool {
        matches!(self, Self::NewData(_))
    }
}

/// Producer-side transfer counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Sends accepted by `try_send`.
    pub accepted: u64,
    /// Round trips completed (`Sent` events).
    pub completed: u64,
}

impl ChannelStats {
    /// Transfers currently in flight (0 or 1).
    #[inline]
    #[must_use]
    pub const fn in_flight(&self) -> u64 {
        self.accepted - self.completed
    }
}

// =============================================================================
// PRODUCER DOMAIN
// =============================================================================

/// State owned by the producing domain.
#[derive(Clone, Debug)]
pub struct ProducerSide<T> {
    state: ProducerState,
    /// Request wire (producer-written).
    request: bool,
    /// Data bus. Held stable for the whole round trip.
    pending_word: Option<T>,
    /// Samples the consumer's acknowledge.
    ack_sync: StabilizingFilter<bool>,
    /// Carries the halt control into this domain.
    halt_sync: ControlSynchronizer,
    /// Raw halt level, written by whoever controls the producer.
    halt_raw: bool,
    /// Synchronized halt level as of the last step.
    halted: bool,
    stats: ChannelStats,
}

impl<T> ProducerSide<T> {
    /// Creates an idle producer.
    ///
    /// # Errors
    ///
    /// `TooFewStages` if `stages < 2`.
    pub fn new(stages: usize) -> ConfigResult<Self> {
        Ok(Self {
            state: ProducerState::Idle,
            request: false,
            pending_word: None,
            ack_sync: StabilizingFilter::new(stages, false)?,
            halt_sync: ControlSynchronizer::new(stages)?,
            halt_raw: false,
            halted: false,
            stats: ChannelStats::default(),
        })
    }

    /// Stages `word` and raises the request.
    ///
    /// # Errors
    ///
    /// `ChannelBusy` unless the FSM is `Idle` and not halted. State is left
    /// untouched on rejection.
    pub fn try_send(&mut self, word: T) -> Result<(), ChannelBusy> {
        if self.state != ProducerState::Idle || self.halted {
            tracing::trace!("try_send rejected in {}", self.state.name());
            return Err(ChannelBusy);
        }

        self.pending_word = Some(word);
        self.request = true;
        self.state = ProducerState::Send;
        self.stats.accepted += 1;
        tracing::debug!("transfer #{} accepted", self.stats.accepted);
        Ok(())
    }

    /// Advances the FSM once, given the already-synchronized acknowledge.
    ///
    /// Every call is one producer-domain step: the halt control synchronizer
    /// advances here too, so callers supplying their own crossed acknowledge
    /// also clock the halt release.
    pub fn poll(&mut self, ack_crossed: bool) -> ProducerEvent {
        self.halted = self.halt_sync.step(self.halt_raw);

        match self.state {
            ProducerState::Idle => ProducerEvent::Idle,
            ProducerState::Send => {
                debug_assert!(self.request, "request dropped while in SEND");
                if ack_crossed {
                    self.request = false;
                    self.state = ProducerState::Finish;
                }
                ProducerEvent::InFlight
            }
            ProducerState::Finish => {
                debug_assert!(!self.request, "request raised while in FINISH");
                if ack_crossed {
                    return ProducerEvent::InFlight;
                }
                self.pending_word = None;
                self.state = ProducerState::Idle;
                self.stats.completed += 1;
                tracing::debug!("transfer #{} complete", self.stats.completed);
                ProducerEvent::Sent
            }
        }
    }

    /// One producer-domain step: cross the raw acknowledge, then poll.
    #[inline]
    pub fn step(&mut self, ack_raw: bool) -> ProducerEvent {
        let ack_crossed = self.ack_sync.step(ack_raw);
        self.poll(ack_crossed)
    }

    /// Raw halt control. Takes effect through the control synchronizer.
    ///
    /// While halted no new send is accepted; an in-flight transfer still
    /// completes.
    #[inline]
    pub fn set_halt(&mut self, halt: bool) {
        self.halt_raw = halt;
    }

    /// Request wire level.
    #[inline]
    #[must_use]
    pub const fn request(&self) -> bool {
        self.request
    }

    /// The staged word, held for the whole round trip.
    #[inline]
    #[must_use]
    pub const fn pending_word(&self) -> Option<&T> {
        self.pending_word.as_ref()
    }

    /// Current FSM state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ProducerState {
        self.state
    }

    /// Whether a send would be accepted by the FSM (ignores halt).
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == ProducerState::Idle
    }

    /// Whether a round trip is in progress.
    #[inline]
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.state != ProducerState::Idle
    }

    /// Synchronized halt level.
    #[inline]
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Halted with nothing left in flight.
    #[inline]
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.halted && self.is_idle()
    }

    /// Transfer counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> ChannelStats {
        self.stats
    }
}

// =============================================================================
// CONSUMER DOMAIN
// =============================================================================

/// State owned by the consuming domain.
#[derive(Clone, Debug)]
pub struct ConsumerSide<T> {
    /// `request_crossed` as of the previous step (edge detector history).
    last_request_seen: bool,
    /// Acknowledge wire (consumer-written).
    ack: bool,
    received_word: Option<T>,
    /// Samples the producer's request.
    req_sync: StabilizingFilter<bool>,
    received: u64,
}

impl<T: Clone> ConsumerSide<T> {
    /// Creates a consumer that has seen no request.
    ///
    /// # Errors
    ///
    /// `TooFewStages` if `stages < 2`.
    pub fn new(stages: usize) -> ConfigResult<Self> {
        Ok(Self {
            last_request_seen: false,
            ack: false,
            received_word: None,
            req_sync: StabilizingFilter::new(stages, false)?,
            received: 0,
        })
    }

    /// Advances once, given the already-synchronized request.
    ///
    /// `read_bus` is only called on the rising edge, when the producer is
    /// guaranteed to be holding the word stable. A rising edge over an empty
    /// bus is not acknowledged: `ack` and the edge history stay low so the
    /// edge is seen again on the next step.
    pub fn poll<F>(&mut self, request_crossed: bool, read_bus: F) -> ConsumerEvent<T>
    where
        F: FnOnce() -> Option<T>,
    {
        let rising = request_crossed && !self.last_request_seen;
        if !rising {
            self.last_request_seen = request_crossed;
            self.ack = request_crossed;
            return ConsumerEvent::Idle;
        }

        let Some(word) = read_bus() else {
            tracing::warn!("request rose with an empty data bus; not acknowledged");
            return ConsumerEvent::Idle;
        };

        self.last_request_seen = true;
        self.ack = true;
        self.received += 1;
        tracing::debug!("word #{} latched", self.received);
        self.received_word = Some(word.clone());
        ConsumerEvent::NewData(word)
    }

    /// One consumer-domain step: cross the raw request, then poll.
    #[inline]
    pub fn step<F>(&mut self, request_raw: bool, read_bus: F) -> ConsumerEvent<T>
    where
        F: FnOnce() -> Option<T>,
    {
        let request_crossed = self.req_sync.step(request_raw);
        self.poll(request_crossed, read_bus)
    }
}

impl<T> ConsumerSide<T> {
    /// Acknowledge wire level.
    #[inline]
    #[must_use]
    pub const fn ack(&self) -> bool {
        self.ack
    }

    /// Last word latched.
    #[inline]
    #[must_use]
    pub const fn received_word(&self) -> Option<&T> {
        self.received_word.as_ref()
    }

    /// Words latched so far.
    #[inline]
    #[must_use]
    pub const fn received_count(&self) -> u64 {
        self.received
    }
}

// =============================================================================
// COOPERATIVE CHANNEL
// =============================================================================

/// Both halves of a handshake, stepped cooperatively by one driver.
///
/// The driver decides the interleaving; the protocol is correct for all of
/// them.
///
/// ## Usage
///
/// ```rust
/// use handoff_core::{ConsumerEvent, HandshakeChannel, ProducerEvent};
///
/// let mut channel = HandshakeChannel::<u8>::new(2, 8).unwrap();
/// channel.try_send(0xAB).unwrap();
///
/// let mut got = None;
/// loop {
///     if let ConsumerEvent::NewData(word) = channel.step_consumer() {
///         got = Some(word);
///     }
///     if channel.step_producer() == ProducerEvent::Sent {
///         break;
///     }
/// }
/// assert_eq!(got, Some(0xAB));
/// ```
#[derive(Clone, Debug)]
pub struct HandshakeChannel<T> {
    producer: ProducerSide<T>,
    consumer: ConsumerSide<T>,
    word_width_bits: usize,
}

impl<T: Clone> HandshakeChannel<T> {
    /// Creates a channel with `stages`-deep filters on both paths.
    ///
    /// # Errors
    ///
    /// `TooFewStages`, `ZeroWidthWord` or `WordTooWide`.
    pub fn new(stages: usize, word_width_bits: usize) -> ConfigResult<Self> {
        Self::from_config(&ChannelConfig::new(stages, word_width_bits))
    }

    /// Creates a channel from a validated config.
    ///
    /// # Errors
    ///
    /// See [`ChannelConfig::validate`].
    pub fn from_config(config: &ChannelConfig) -> ConfigResult<Self> {
        config.validate::<T>()?;

        Ok(Self {
            producer: ProducerSide::new(config.stages)?,
            consumer: ConsumerSide::new(config.stages)?,
            word_width_bits: config.word_width_bits,
        })
    }

    /// Producer: stage a word. See [`ProducerSide::try_send`].
    ///
    /// # Errors
    ///
    /// `ChannelBusy` while a transfer is in flight or the producer is halted.
    #[inline]
    pub fn try_send(&mut self, word: T) -> Result<(), ChannelBusy> {
        self.producer.try_send(word)
    }

    /// Producer: advance the FSM with an externally crossed acknowledge.
    #[inline]
    pub fn poll_producer(&mut self, ack_crossed: bool) -> ProducerEvent {
        self.producer.poll(ack_crossed)
    }

    /// Consumer: advance with an externally crossed request.
    #[inline]
    pub fn poll_consumer(&mut self, request_crossed: bool) -> ConsumerEvent<T> {
        let producer = &self.producer;
        self.consumer
            .poll(request_crossed, || producer.pending_word().cloned())
    }

    /// One producer-domain step through the built-in acknowledge filter.
    #[inline]
    pub fn step_producer(&mut self) -> ProducerEvent {
        let ack = self.consumer.ack();
        self.producer.step(ack)
    }

    /// One consumer-domain step through the built-in request filter.
    #[inline]
    pub fn step_consumer(&mut self) -> ConsumerEvent<T> {
        let producer = &self.producer;
        self.consumer
            .step(producer.request(), || producer.pending_word().cloned())
    }
}

impl<T> HandshakeChannel<T> {
    /// Depth of both stabilizing filters.
    #[inline]
    #[must_use]
    pub fn stages(&self) -> usize {
        self.consumer.req_sync.stages()
    }

    /// Raw halt control for the producer domain.
    #[inline]
    pub fn set_halt(&mut self, halt: bool) {
        self.producer.set_halt(halt);
    }

    /// Whether a send would be accepted by the FSM.
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.producer.is_idle()
    }

    /// Whether a round trip is in progress.
    #[inline]
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.producer.is_sending()
    }

    /// Synchronized halt level in the producer domain.
    #[inline]
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.producer.is_halted()
    }

    /// Halted with nothing in flight.
    #[inline]
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.producer.is_drained()
    }

    /// Producer FSM state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ProducerState {
        self.producer.state()
    }

    /// Raw request wire.
    #[inline]
    #[must_use]
    pub const fn request(&self) -> bool {
        self.producer.request()
    }

    /// Raw acknowledge wire.
    #[inline]
    #[must_use]
    pub const fn ack(&self) -> bool {
        self.consumer.ack()
    }

    /// The word held on the data bus.
    #[inline]
    #[must_use]
    pub const fn pending_word(&self) -> Option<&T> {
        self.producer.pending_word()
    }

    /// Last word the consumer latched.
    #[inline]
    #[must_use]
    pub const fn received_word(&self) -> Option<&T> {
        self.consumer.received_word()
    }

    /// Transfer counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> ChannelStats {
        self.producer.stats()
    }

    /// Declared word width.
    #[inline]
    #[must_use]
    pub const fn word_width_bits(&self) -> usize {
        self.word_width_bits
    }

    /// Producer half (read-only).
    #[inline]
    #[must_use]
    pub const fn producer(&self) -> &ProducerSide<T> {
        &self.producer
    }

    /// Consumer half (read-only).
    #[inline]
    #[must_use]
    pub const fn consumer(&self) -> &ConsumerSide<T> {
        &self.consumer
    }
}
