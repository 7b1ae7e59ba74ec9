//! # Split Endpoints
//!
//! The handshake with each domain on its own thread.
//!
//! ## Wires
//!
//! ```text
//!   Producer thread                        Consumer thread
//!   ───────────────                        ───────────────
//!   writes: request, bus      ──────►      reads through req filter
//!   reads through ack filter  ◄──────      writes: ack
//! ```
//!
//! Each wire has exactly one writer. The data bus sits behind a
//! `parking_lot::Mutex` so the word is published before the request
//! (`Release`) and observed after it (`Acquire`); the consumer only touches
//! the bus on the request's rising edge, when the producer holds it stable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::ChannelConfig;
use crate::error::{ChannelBusy, ConfigResult, SendTimeout};
use crate::sync::handshake::{
    ChannelStats, ConsumerEvent, ConsumerSide, ProducerEvent, ProducerSide, ProducerState,
};

/// Registers shared between the two endpoints.
struct Wires<T> {
    request: AtomicBool,
    ack: AtomicBool,
    bus: Mutex<Option<T>>,
}

/// Builds a producer/consumer pair over fresh wires.
///
/// # Errors
///
/// See [`ChannelConfig::validate`].
///
/// ## Usage
///
/// ```rust
/// use handoff_core::{split, ChannelConfig, ConsumerEvent};
///
/// let (mut tx, mut rx) = split::<u32>(&ChannelConfig::new(2, 32)).unwrap();
/// tx.try_send(7).unwrap();
///
/// let mut got = None;
/// while tx.is_sending() {
///     if let ConsumerEvent::NewData(word) = rx.step() {
///         got = Some(word);
///     }
///     let _ = tx.step();
/// }
/// assert_eq!(got, Some(7));
/// ```
pub fn split<T: Clone>(config: &ChannelConfig) -> ConfigResult<(Producer<T>, Consumer<T>)> {
    config.validate::<T>()?;

    let wires = Arc::new(Wires {
        request: AtomicBool::new(false),
        ack: AtomicBool::new(false),
        bus: Mutex::new(None),
    });

    let producer = Producer {
        side: ProducerSide::new(config.stages)?,
        wires: Arc::clone(&wires),
        halt: HaltHandle::default(),
        detached: false,
    };
    let consumer = Consumer {
        side: ConsumerSide::new(config.stages)?,
        wires,
    };

    Ok((producer, consumer))
}

/// Raw halt control for a producer, settable from any thread.
#[derive(Clone, Debug, Default)]
pub struct HaltHandle {
    raw: Arc<AtomicBool>,
}

impl HaltHandle {
    /// Drives the raw halt level.
    #[inline]
    pub fn set(&self, halt: bool) {
        self.raw.store(halt, Ordering::Release);
    }

    /// Raw level (not yet synchronized into the producer domain).
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.raw.load(Ordering::Acquire)
    }
}

/// Producer endpoint. Move it to the producing thread.
pub struct Producer<T> {
    side: ProducerSide<T>,
    wires: Arc<Wires<T>>,
    halt: HaltHandle,
    /// A timed-out transfer is still in flight; swallow its `Sent`.
    detached: bool,
}

impl<T: Clone> Producer<T> {
    /// Stages a word and raises the request.
    ///
    /// # Errors
    ///
    /// `ChannelBusy` while a transfer is in flight or the producer is halted.
    pub fn try_send(&mut self, word: T) -> Result<(), ChannelBusy> {
        self.side.try_send(word)?;
        *self.wires.bus.lock() = self.side.pending_word().cloned();
        self.publish();
        Ok(())
    }

    /// One producer-domain step.
    pub fn step(&mut self) -> ProducerEvent {
        self.side.set_halt(self.halt.is_set());
        let ack = self.wires.ack.load(Ordering::Acquire);

        let event = self.side.step(ack);
        if event == ProducerEvent::Sent {
            *self.wires.bus.lock() = None;
        }
        self.publish();

        if event == ProducerEvent::Sent && self.detached {
            self.detached = false;
            tracing::debug!("detached transfer finished after timeout");
            return ProducerEvent::Idle;
        }
        event
    }

    /// Sends `word` and steps until its round trip completes.
    ///
    /// Steps the producer (yielding between steps) first until the channel
    /// is free, then until `Sent`.
    ///
    /// # Errors
    ///
    /// `SendTimeout::Busy` if the channel never freed up; the word was not
    /// sent. `SendTimeout::Incomplete` if the word was accepted but the
    /// round trip did not finish in time. The transfer is not aborted: it
    /// completes on later steps and its `Sent` is not reported.
    pub fn send_timeout(&mut self, word: T, timeout: Duration) -> Result<(), SendTimeout> {
        let deadline = Instant::now() + timeout;

        while !self.can_send() {
            if Instant::now() >= deadline {
                return Err(SendTimeout::Busy(timeout));
            }
            let _ = self.step();
            std::thread::yield_now();
        }

        self.try_send(word).map_err(|_| SendTimeout::Busy(timeout))?;

        loop {
            if self.step() == ProducerEvent::Sent {
                return Ok(());
            }
            if Instant::now() >= deadline {
                self.detached = true;
                tracing::warn!("send timed out after {:?}; transfer left to finish", timeout);
                return Err(SendTimeout::Incomplete(timeout));
            }
            std::thread::yield_now();
        }
    }
}

impl<T> Producer<T> {
    fn publish(&self) {
        self.wires
            .request
            .store(self.side.request(), Ordering::Release);
    }

    /// Whether `try_send` would be accepted right now.
    #[inline]
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.side.is_idle() && !self.side.is_halted()
    }

    /// Whether the FSM is idle.
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.side.is_idle()
    }

    /// Whether a round trip is in progress.
    #[inline]
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.side.is_sending()
    }

    /// Synchronized halt level.
    #[inline]
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.side.is_halted()
    }

    /// Halted with nothing in flight.
    #[inline]
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.side.is_drained()
    }

    /// Current FSM state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ProducerState {
        self.side.state()
    }

    /// Transfer counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> ChannelStats {
        self.side.stats()
    }

    /// Drives the raw halt level. Observed on the next [`step`](Self::step).
    #[inline]
    pub fn set_halt(&self, halt: bool) {
        self.halt.set(halt);
    }

    /// Handle for driving this producer's halt control from elsewhere.
    #[must_use]
    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }
}

/// Consumer endpoint. Move it to the consuming thread.
pub struct Consumer<T> {
    side: ConsumerSide<T>,
    wires: Arc<Wires<T>>,
}

impl<T: Clone> Consumer<T> {
    /// One consumer-domain step.
    pub fn step(&mut self) -> ConsumerEvent<T> {
        let request = self.wires.request.load(Ordering::Acquire);
        let wires = &self.wires;

        let event = self.side.step(request, || wires.bus.lock().clone());
        wires.ack.store(self.side.ack(), Ordering::Release);
        event
    }
}

impl<T> Consumer<T> {
    /// Last word latched.
    #[inline]
    #[must_use]
    pub fn received_word(&self) -> Option<&T> {
        self.side.received_word()
    }

    /// Words latched so far.
    #[inline]
    #[must_use]
    pub fn received_count(&self) -> u64 {
        self.side.received_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigurationError;

    fn pair(stages: usize) -> (Producer<u32>, Consumer<u32>) {
        split::<u32>(&ChannelConfig::new(stages, 32)).unwrap()
    }

    #[test]
    fn test_split_validates_config() {
        assert_eq!(
            split::<u32>(&ChannelConfig::new(1, 32)).err(),
            Some(ConfigurationError::TooFewStages { stages: 1, min: 2 })
        );
    }

    #[test]
    fn test_single_thread_round_trip() {
        let (mut tx, mut rx) = pair(2);
        tx.try_send(42).unwrap();
        assert_eq!(tx.try_send(43), Err(ChannelBusy));

        let mut delivered = Vec::new();
        let mut sent = 0;
        for _ in 0..50 {
            if let ConsumerEvent::NewData(word) = rx.step() {
                delivered.push(word);
            }
            if tx.step() == ProducerEvent::Sent {
                sent += 1;
            }
        }

        assert_eq!(delivered, vec![42]);
        assert_eq!(sent, 1);
        assert_eq!(rx.received_word(), Some(&42));
        assert!(tx.is_idle());
    }

    #[test]
    fn test_two_threads_deliver_in_order() {
        const WORDS: u32 = 500;
        let (mut tx, mut rx) = pair(3);
        let done = AtomicBool::new(false);

        let received = std::thread::scope(|scope| {
            let consumer = scope.spawn(|| {
                let mut received = Vec::with_capacity(WORDS as usize);
                while !done.load(Ordering::Acquire) {
                    if let ConsumerEvent::NewData(word) = rx.step() {
                        received.push(word);
                    }
                    std::thread::yield_now();
                }
                received
            });

            for word in 0..WORDS {
                while tx.try_send(word).is_err() {
                    let _ = tx.step();
                    std::thread::yield_now();
                }
            }
            while tx.is_sending() {
                let _ = tx.step();
                std::thread::yield_now();
            }
            done.store(true, Ordering::Release);

            consumer.join().unwrap()
        });

        assert_eq!(received, (0..WORDS).collect::<Vec<_>>());
        assert_eq!(tx.stats().completed, u64::from(WORDS));
    }

    #[test]
    fn test_send_timeout_completes() {
        let (mut tx, mut rx) = pair(2);
        let stop = AtomicBool::new(false);

        let received = std::thread::scope(|scope| {
            let consumer = scope.spawn(|| {
                let mut got = Vec::new();
                while !stop.load(Ordering::Acquire) {
                    if let ConsumerEvent::NewData(word) = rx.step() {
                        got.push(word);
                    }
                    std::thread::yield_now();
                }
                got
            });

            tx.send_timeout(11, Duration::from_secs(10)).unwrap();
            tx.send_timeout(12, Duration::from_secs(10)).unwrap();
            stop.store(true, Ordering::Release);
            consumer.join().unwrap()
        });

        assert_eq!(received, vec![11, 12]);
    }

    #[test]
    fn test_send_timeout_detaches_transfer() {
        let (mut tx, mut rx) = pair(2);

        // Consumer never steps: the request is never acknowledged
        assert_eq!(
            tx.send_timeout(5, Duration::from_millis(5)),
            Err(SendTimeout::Incomplete(Duration::from_millis(5)))
        );
        assert!(tx.is_sending());
        assert_eq!(
            tx.send_timeout(6, Duration::from_millis(1)),
            Err(SendTimeout::Busy(Duration::from_millis(1)))
        );

        // The abandoned transfer still lands exactly once; its Sent is swallowed
        let mut delivered = Vec::new();
        for _ in 0..50 {
            if let ConsumerEvent::NewData(word) = rx.step() {
                delivered.push(word);
            }
            assert_ne!(tx.step(), ProducerEvent::Sent);
        }
        assert_eq!(delivered, vec![5]);
        assert!(tx.is_idle());
        assert_eq!(tx.stats().completed, 1);
    }

    #[test]
    fn test_halt_handle_blocks_new_sends() {
        let (mut tx, _rx) = pair(2);
        let halt = tx.halt_handle();

        halt.set(true);
        assert!(halt.is_set());
        assert!(tx.can_send());
        let _ = tx.step();
        assert!(tx.is_drained());
        assert_eq!(tx.try_send(1), Err(ChannelBusy));

        halt.set(false);
        let _ = tx.step();
        let _ = tx.step();
        assert!(!tx.is_halted());
        assert!(tx.try_send(1).is_ok());
    }

    #[test]
    fn test_set_halt_drains_then_resumes() {
        let (mut tx, mut rx) = pair(2);
        tx.try_send(4).unwrap();
        tx.set_halt(true);
        assert!(tx.halt_handle().is_set());

        let mut got = None;
        while !tx.is_drained() {
            if let ConsumerEvent::NewData(word) = rx.step() {
                got = Some(word);
            }
            let _ = tx.step();
        }
        assert_eq!(got, Some(4));
        assert_eq!(tx.try_send(5), Err(ChannelBusy));

        tx.set_halt(false);
        let _ = tx.step();
        let _ = tx.step();
        assert!(tx.can_send());
    }
}
