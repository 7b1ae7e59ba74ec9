//! # Cooperative Harness
//!
//! Drives a [`HandshakeChannel`] through a word script, one domain step at
//! a time, in whatever order the [`Scheduler`] picks. Every step is checked:
//!
//! ```text
//!   producer step:  step FSM ──► Sent?      completion must follow delivery
//!                   offer next word         idle: must be accepted
//!                                           in flight: must be ChannelBusy,
//!                                                      state untouched
//!   consumer step:  step ──► NewData(w)?    w must be the next word sent
//! ```
//!
//! Once every word completed, both sides keep stepping in lockstep for
//! `2 * stages` settle rounds; any further delivery or completion there is a
//! violation. The run fails with the first [`Violation`].

use std::fmt::Debug;

use handoff_core::{
    ChannelBusy, ChannelStats, ConsumerEvent, HandshakeChannel, ProducerEvent, ProducerState,
};

use crate::config::SimConfig;
use crate::error::{SimResult, Violation};
use crate::schedule::{Scheduler, Side};

/// One observable protocol event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEvent<T> {
    /// Producer accepted a word.
    Accepted {
        /// Harness step.
        step: u64,
        /// The word.
        word: T,
    },
    /// Consumer latched a word.
    Delivered {
        /// Harness step.
        step: u64,
        /// The word.
        word: T,
    },
    /// Producer saw the round trip finish.
    Completed {
        /// Harness step.
        step: u64,
    },
}

/// Result of a successful run.
#[derive(Clone, Debug, Default)]
pub struct RunReport<T> {
    /// Words the consumer received, in order.
    pub delivered: Vec<T>,
    /// `Sent` events observed.
    pub completed: usize,
    /// Producer-domain steps executed.
    pub producer_steps: u64,
    /// Consumer-domain steps executed.
    pub consumer_steps: u64,
    /// `try_send` calls rejected as busy.
    pub busy_rejections: u64,
    /// Lockstep rounds run after the last completion (not counted in
    /// `producer_steps`/`consumer_steps`).
    pub settle_steps: u64,
    /// Ordered event log (empty unless tracing was enabled).
    pub trace: Vec<TraceEvent<T>>,
}

impl<T> RunReport<T> {
    /// Total steps across both domains.
    #[must_use]
    pub fn total_steps(&self) -> u64 {
        self.producer_steps + self.consumer_steps
    }

    /// Average producer steps per completed transfer.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn producer_steps_per_word(&self) -> f64 {
        if self.completed == 0 {
            0.0
        } else {
            self.producer_steps as f64 / self.completed as f64
        }
    }
}

/// Drives one channel under one schedule.
pub struct Harness<T> {
    channel: HandshakeChannel<T>,
    scheduler: Box<dyn Scheduler>,
    max_steps: u64,
    record_trace: bool,
}

impl<T: Clone + PartialEq + Debug> Harness<T> {
    /// Wraps a channel and a schedule.
    #[must_use]
    pub fn new(channel: HandshakeChannel<T>, scheduler: Box<dyn Scheduler>, max_steps: u64) -> Self {
        Self {
            channel,
            scheduler,
            max_steps,
            record_trace: false,
        }
    }

    /// Builds channel and schedule from a config.
    ///
    /// # Errors
    ///
    /// `Config` or `InvalidSchedule`.
    pub fn from_config(config: &SimConfig) -> SimResult<Self> {
        let channel = HandshakeChannel::from_config(&config.channel)?;
        let scheduler = config.schedule.build(config.seed)?;
        Ok(Self::new(channel, scheduler, config.max_steps))
    }

    /// Records every accept/deliver/complete event in the report.
    #[must_use]
    pub fn with_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    /// The channel under test.
    #[must_use]
    pub fn channel(&self) -> &HandshakeChannel<T> {
        &self.channel
    }

    /// Pushes `words` through the channel.
    ///
    /// # Errors
    ///
    /// `Violation` on the first broken invariant, including `Stalled` when
    /// the step budget runs out.
    pub fn run(&mut self, words: &[T]) -> SimResult<RunReport<T>> {
        let mut report = RunReport {
            delivered: Vec::with_capacity(words.len()),
            completed: 0,
            producer_steps: 0,
            consumer_steps: 0,
            busy_rejections: 0,
            settle_steps: 0,
            trace: Vec::new(),
        };
        let mut accepted = 0;

        tracing::debug!(
            "harness run: {} words, schedule {}",
            words.len(),
            self.scheduler.name()
        );

        for step in 0..self.max_steps {
            if report.completed == words.len() {
                break;
            }

            match self.scheduler.next() {
                Side::Producer => {
                    report.producer_steps += 1;
                    self.producer_step(step, words, &mut accepted, &mut report)?;
                }
                Side::Consumer => {
                    report.consumer_steps += 1;
                    self.consumer_step(step, words, accepted, &mut report)?;
                }
            }
        }

        if report.completed < words.len() {
            tracing::warn!(
                "harness stalled: {}/{} completed after {} steps",
                report.completed,
                words.len(),
                self.max_steps
            );
            return Err(Violation::Stalled {
                steps: self.max_steps,
                completed: report.completed,
                total: words.len(),
            }
            .into());
        }

        self.settle(accepted, &mut report)?;
        Ok(report)
    }

    /// Keeps both sides running after the last completion. Nothing may be
    /// delivered or completed any more.
    fn settle(&mut self, accepted: usize, report: &mut RunReport<T>) -> SimResult<()> {
        for _ in 0..2 * self.channel.stages() {
            report.settle_steps += 1;

            if self.channel.step_producer() == ProducerEvent::Sent {
                return Err(Violation::CompletionWithoutDelivery {
                    completed: report.completed + 1,
                    delivered: report.delivered.len(),
                }
                .into());
            }
            if self.channel.step_consumer().is_new_data() {
                return Err(Violation::DuplicateDelivery {
                    index: report.delivered.len(),
                    accepted,
                }
                .into());
            }
        }
        Ok(())
    }

    fn producer_step(
        &mut self,
        step: u64,
        words: &[T],
        accepted: &mut usize,
        report: &mut RunReport<T>,
    ) -> SimResult<()> {
        if self.channel.step_producer() == ProducerEvent::Sent {
            report.completed += 1;
            if self.record_trace {
                report.trace.push(TraceEvent::Completed { step });
            }
            if report.delivered.len() < report.completed {
                return Err(Violation::CompletionWithoutDelivery {
                    completed: report.completed,
                    delivered: report.delivered.len(),
                }
                .into());
            }
        }

        let Some(word) = words.get(*accepted) else {
            return Ok(());
        };

        if self.channel.is_sending() {
            let before = self.snapshot();
            match self.channel.try_send(word.clone()) {
                Err(ChannelBusy) => {
                    report.busy_rejections += 1;
                    if self.snapshot() != before {
                        return Err(Violation::BusyProbeMutated { step }.into());
                    }
                }
                Ok(()) => return Err(Violation::AcceptedInFlight { step }.into()),
            }
            return Ok(());
        }

        match self.channel.try_send(word.clone()) {
            Ok(()) => {
                *accepted += 1;
                if self.record_trace {
                    report.trace.push(TraceEvent::Accepted {
                        step,
                        word: word.clone(),
                    });
                }
            }
            // Halted: backpressure, retry next step
            Err(ChannelBusy) => report.busy_rejections += 1,
        }
        Ok(())
    }

    fn consumer_step(
        &mut self,
        step: u64,
        words: &[T],
        accepted: usize,
        report: &mut RunReport<T>,
    ) -> SimResult<()> {
        let ConsumerEvent::NewData(word) = self.channel.step_consumer() else {
            return Ok(());
        };

        let index = report.delivered.len();
        if index >= accepted {
            return Err(Violation::DuplicateDelivery { index, accepted }.into());
        }
        if word != words[index] {
            return Err(Violation::WrongWord {
                index,
                expected: format!("{:?}", words[index]),
                got: format!("{word:?}"),
            }
            .into());
        }

        if self.record_trace {
            report.trace.push(TraceEvent::Delivered {
                step,
                word: word.clone(),
            });
        }
        report.delivered.push(word);
        Ok(())
    }

    fn snapshot(&self) -> (ProducerState, bool, Option<T>, ChannelStats) {
        (
            self.channel.state(),
            self.channel.request(),
            self.channel.pending_word().cloned(),
            self.channel.stats(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Lockstep, Ratio, ScheduleConfig};
    use handoff_core::ChannelConfig;

    fn harness(stages: usize, scheduler: Box<dyn Scheduler>) -> Harness<u8> {
        Harness::new(HandshakeChannel::new(stages, 8).unwrap(), scheduler, 100_000)
    }

    #[test]
    fn test_lockstep_run() {
        let mut h = harness(2, Box::new(Lockstep::new())).with_trace(true);
        let report = h.run(&[0xAB]).unwrap();

        assert_eq!(report.delivered, vec![0xAB]);
        assert_eq!(report.completed, 1);
        assert!(report.busy_rejections == 0);
        assert_eq!(report.producer_steps, 7);
        assert_eq!(report.settle_steps, 4);

        let kinds: Vec<&str> = report
            .trace
            .iter()
            .map(|e| match e {
                TraceEvent::Accepted { .. } => "accepted",
                TraceEvent::Delivered { .. } => "delivered",
                TraceEvent::Completed { .. } => "completed",
            })
            .collect();
        assert_eq!(kinds, vec!["accepted", "delivered", "completed"]);
    }

    #[test]
    fn test_busy_probes_counted() {
        let mut h = harness(3, Box::new(Ratio::new(5, 1).unwrap()));
        let words: Vec<u8> = (0..16).collect();
        let report = h.run(&words).unwrap();

        assert_eq!(report.delivered, words);
        assert!(report.busy_rejections >= 15);
        assert!(report.producer_steps_per_word() >= 6.0);
    }

    #[test]
    fn test_empty_script() {
        let mut h = harness(2, Box::new(Lockstep::new()));
        let report = h.run(&[]).unwrap();
        assert_eq!(report.total_steps(), 0);
    }

    #[test]
    fn test_stall_is_reported() {
        let channel = HandshakeChannel::new(2, 8).unwrap();
        let mut h = Harness::new(channel, Box::new(Lockstep::new()), 5);
        let err = h.run(&[1u8, 2]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::SimError::Violation(Violation::Stalled { steps: 5, completed: 0, total: 2 })
        ));
    }

    #[test]
    fn test_from_config() {
        let config = SimConfig {
            channel: ChannelConfig::new(4, 8),
            schedule: ScheduleConfig::Starvation { max_burst: 20 },
            seed: 3,
            ..SimConfig::default()
        };
        let mut h = Harness::<u8>::from_config(&config).unwrap();
        let words: Vec<u8> = (0..=255).collect();
        let report = h.run(&words).unwrap();
        assert_eq!(report.delivered, words);
        assert_eq!(h.channel().stats().completed, 256);
    }

    #[test]
    fn test_surplus_delivery_after_completion_is_reported() {
        // A word already in flight that the script never accounted for
        let mut channel = HandshakeChannel::new(2, 8).unwrap();
        channel.try_send(0xEEu8).unwrap();

        let mut h = Harness::new(channel, Box::new(Lockstep::new()), 1_000);
        let err = h.run(&[]).unwrap_err();
        assert!(matches!(
            err,
            crate::error::SimError::Violation(Violation::DuplicateDelivery { index: 0, accepted: 0 })
        ));
    }
}
