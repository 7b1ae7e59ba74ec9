//! # Threaded Run
//!
//! Real OS threads, one per domain, talking only through the split
//! endpoints. The consumer forwards every delivered word to the checker
//! over a crossbeam channel:
//!
//! ```text
//!   [producer thread] ──req/bus──► [consumer thread] ──crossbeam──► [checker]
//!          ◄──────────── ack ──────────────┘
//! ```
//!
//! Both threads inject random busy-wait jitter between steps so the relative
//! rate of the two domains keeps changing. Once the producer has finished,
//! the consumer keeps stepping for `2 * stages` settle steps and the checker
//! rejects any word that arrives beyond the script.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError};
use handoff_core::{bits, split, ConsumerEvent, ProducerEvent};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::SimConfig;
use crate::error::{SimError, SimResult, Violation};

/// Result of a successful threaded run.
#[derive(Clone, Copy, Debug)]
pub struct ThreadedReport {
    /// Words the checker received in order.
    pub delivered: usize,
    /// `Sent` events seen by the producer thread.
    pub completed: usize,
    /// Consumer steps run after the producer finished.
    pub settle_steps: usize,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

/// Generates `count` seeded words masked to `width` bits.
#[must_use]
pub fn generate_words(seed: u64, count: usize, width: usize) -> Vec<u64> {
    let mask = bits::mask(u32::try_from(width).unwrap_or(u32::MAX));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen::<u64>() & mask).collect()
}

fn jitter(rng: &mut ChaCha8Rng, max_spin: u32) {
    if max_spin == 0 {
        return;
    }
    for _ in 0..rng.gen_range(0..=max_spin) {
        std::hint::spin_loop();
    }
    if rng.gen_ratio(1, 16) {
        thread::yield_now();
    }
}

/// Runs `config.words` seeded words through split endpoints on two threads.
///
/// # Errors
///
/// `Config` on a bad channel config, `Violation(WrongWord)` on an out of
/// order word, `Violation(DuplicateDelivery)` on a surplus word, `Timeout` past `config.timeout()`, `ThreadPanicked` if a
/// domain thread dies.
pub fn run_threaded(config: &SimConfig) -> SimResult<ThreadedReport> {
    let (mut producer, mut consumer) = split::<u64>(&config.channel)?;
    let words = generate_words(config.seed, config.words, config.channel.word_width_bits);
    let expected = words.clone();

    let timeout = config.timeout();
    let max_spin = config.max_spin;
    let seed = config.seed;
    let settle = 2 * config.channel.stages;
    let start = Instant::now();
    let deadline = start + timeout;

    let done = Arc::new(AtomicBool::new(false));
    let (tx, rx) = unbounded::<u64>();

    tracing::info!(
        "threaded run: {} words, {} stages, seed {:#x}",
        words.len(),
        config.channel.stages,
        seed
    );

    let producer_done = Arc::clone(&done);
    let producer_thread = thread::Builder::new()
        .name("handoff-producer".to_string())
        .spawn(move || {
            let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15);
            let mut completed = 0;
            let mut next = 0;

            while completed < words.len() {
                if producer_done.load(Ordering::Acquire) || Instant::now() >= deadline {
                    break;
                }
                if next < words.len() && producer.try_send(words[next]).is_ok() {
                    next += 1;
                }
                if producer.step() == ProducerEvent::Sent {
                    completed += 1;
                }
                jitter(&mut rng, max_spin);
            }
            completed
        })?;

    let consumer_done = Arc::clone(&done);
    let consumer_thread = thread::Builder::new()
        .name("handoff-consumer".to_string())
        .spawn(move || {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.rotate_left(17));
            while !consumer_done.load(Ordering::Acquire) {
                if let ConsumerEvent::NewData(word) = consumer.step() {
                    if tx.send(word).is_err() {
                        return 0;
                    }
                }
                jitter(&mut rng, max_spin);
            }

            let mut settled = 0;
            while settled < settle {
                if let ConsumerEvent::NewData(word) = consumer.step() {
                    if tx.send(word).is_err() {
                        break;
                    }
                }
                settled += 1;
            }
            settled
        })
        .map_err(|e| {
            done.store(true, Ordering::Release);
            e
        })?;

    let checked = check_order(&rx, &expected, deadline, timeout);
    if checked.is_err() {
        done.store(true, Ordering::Release);
    }

    let completed = producer_thread
        .join()
        .map_err(|_| SimError::ThreadPanicked("handoff-producer"))?;
    done.store(true, Ordering::Release);
    let settle_steps = consumer_thread
        .join()
        .map_err(|_| SimError::ThreadPanicked("handoff-consumer"))?;

    let delivered = checked?;
    if completed < delivered {
        return Err(SimError::Timeout(timeout));
    }
    check_drained(&rx, delivered, completed)?;
    let elapsed = start.elapsed();
    tracing::info!(
        "threaded run ok: {} delivered, {} completed in {:?}",
        delivered,
        completed,
        elapsed
    );

    Ok(ThreadedReport {
        delivered,
        completed,
        settle_steps,
        elapsed,
    })
}

fn check_drained(
    rx: &crossbeam_channel::Receiver<u64>,
    delivered: usize,
    accepted: usize,
) -> SimResult<()> {
    match rx.try_recv() {
        Ok(word) => {
            tracing::error!("surplus word {:#x} after {} deliveries", word, delivered);
            Err(Violation::DuplicateDelivery {
                index: delivered,
                accepted,
            }
            .into())
        }
        Err(_) => Ok(()),
    }
}

fn check_order(
    rx: &crossbeam_channel::Receiver<u64>,
    expected: &[u64],
    deadline: Instant,
    timeout: Duration,
) -> SimResult<usize> {
    for (index, want) in expected.iter().enumerate() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let got = match rx.recv_timeout(remaining) {
            Ok(word) => word,
            Err(RecvTimeoutError::Timeout) => return Err(SimError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(SimError::ThreadPanicked("handoff-consumer"))
            }
        };
        if got != *want {
            return Err(Violation::WrongWord {
                index,
                expected: format!("{want:#x}"),
                got: format!("{got:#x}"),
            }
            .into());
        }
    }
    Ok(expected.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::ChannelConfig;

    #[test]
    fn test_generate_words_masked_and_seeded() {
        let a = generate_words(9, 64, 12);
        let b = generate_words(9, 64, 12);
        assert_eq!(a, b);
        assert!(a.iter().all(|w| *w < (1 << 12)));
        assert_ne!(a, generate_words(10, 64, 12));
    }

    #[test]
    fn test_threaded_run_delivers_everything() {
        let config = SimConfig {
            channel: ChannelConfig::new(2, 64),
            words: 200,
            ..SimConfig::default()
        };
        let report = run_threaded(&config).unwrap();
        assert_eq!(report.delivered, 200);
        assert_eq!(report.completed, 200);
        assert_eq!(report.settle_steps, 4);
    }

    #[test]
    fn test_surplus_word_is_rejected() {
        let (tx, rx) = unbounded();
        for word in [1u64, 2, 2] {
            tx.send(word).unwrap();
        }
        let deadline = Instant::now() + Duration::from_secs(1);
        let delivered = check_order(&rx, &[1, 2], deadline, Duration::from_secs(1)).unwrap();
        assert_eq!(delivered, 2);

        let err = check_drained(&rx, delivered, 2).unwrap_err();
        assert!(matches!(
            err,
            SimError::Violation(Violation::DuplicateDelivery { index: 2, accepted: 2 })
        ));
        assert!(check_drained(&rx, delivered, 2).is_ok());
    }

    #[test]
    fn test_threaded_run_rejects_bad_config() {
        let config = SimConfig {
            channel: ChannelConfig::new(1, 8),
            ..SimConfig::default()
        };
        assert!(matches!(run_threaded(&config), Err(SimError::Config(_))));
    }
}
