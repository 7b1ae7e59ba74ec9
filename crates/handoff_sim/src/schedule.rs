//! # Domain Schedules
//!
//! A scheduler decides which domain takes the next step. The protocol must
//! hold for every schedule that steps both sides infinitely often, so the
//! schedules here are deliberately unfair:
//!
//! - **Lockstep**: P C P C ...
//! - **Ratio**: fixed rate mismatch, e.g. 1 producer step per 7 consumer steps
//! - **Jitter**: independent coin flip per step with a biased coin
//! - **Starvation**: random-length bursts where one side is frozen
//!
//! All randomness is seeded (`ChaCha8Rng`), so every failing run replays.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Which domain steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// The producing domain.
    Producer,
    /// The consuming domain.
    Consumer,
}

impl Side {
    /// The other domain.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Producer => Self::Consumer,
            Self::Consumer => Self::Producer,
        }
    }
}

/// Picks the next domain to step.
pub trait Scheduler: Send {
    /// Domain for the next step.
    fn next(&mut self) -> Side;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Strict alternation, producer first.
#[derive(Clone, Debug)]
pub struct Lockstep {
    turn: Side,
}

impl Lockstep {
    /// Creates a lockstep schedule.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            turn: Side::Producer,
        }
    }
}

impl Default for Lockstep {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for Lockstep {
    fn next(&mut self) -> Side {
        let side = self.turn;
        self.turn = side.other();
        side
    }

    fn name(&self) -> &'static str {
        "lockstep"
    }
}

/// `producer` producer steps, then `consumer` consumer steps, repeating.
#[derive(Clone, Debug)]
pub struct Ratio {
    producer: u32,
    consumer: u32,
    position: u32,
}

impl Ratio {
    /// Creates a ratio schedule.
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` if either side gets zero steps per period.
    pub fn new(producer: u32, consumer: u32) -> SimResult<Self> {
        if producer == 0 || consumer == 0 {
            return Err(SimError::InvalidSchedule(format!(
                "ratio {producer}:{consumer} starves a domain forever"
            )));
        }
        Ok(Self {
            producer,
            consumer,
            position: 0,
        })
    }
}

impl Scheduler for Ratio {
    fn next(&mut self) -> Side {
        let side = if self.position < self.producer {
            Side::Producer
        } else {
            Side::Consumer
        };
        self.position = (self.position + 1) % (self.producer + self.consumer);
        side
    }

    fn name(&self) -> &'static str {
        "ratio"
    }
}

/// Independent biased coin per step.
#[derive(Clone, Debug)]
pub struct Jitter {
    producer_bias: f64,
    rng: ChaCha8Rng,
}

impl Jitter {
    /// Creates a jitter schedule stepping the producer with probability
    /// `producer_bias`.
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` unless `0 < producer_bias < 1`.
    pub fn new(producer_bias: f64, seed: u64) -> SimResult<Self> {
        if !(producer_bias > 0.0 && producer_bias < 1.0) {
            return Err(SimError::InvalidSchedule(format!(
                "producer bias {producer_bias} must be strictly between 0 and 1"
            )));
        }
        Ok(Self {
            producer_bias,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
}

impl Scheduler for Jitter {
    fn next(&mut self) -> Side {
        if self.rng.gen_bool(self.producer_bias) {
            Side::Producer
        } else {
            Side::Consumer
        }
    }

    fn name(&self) -> &'static str {
        "jitter"
    }
}

/// Random bursts of up to `max_burst` steps on one side while the other
/// side is frozen.
#[derive(Clone, Debug)]
pub struct Starvation {
    max_burst: u32,
    rng: ChaCha8Rng,
    side: Side,
    remaining: u32,
}

impl Starvation {
    /// Creates a starvation schedule.
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` if `max_burst` is 0.
    pub fn new(max_burst: u32, seed: u64) -> SimResult<Self> {
        if max_burst == 0 {
            return Err(SimError::InvalidSchedule(
                "starvation burst must be at least 1 step".to_string(),
            ));
        }
        Ok(Self {
            max_burst,
            rng: ChaCha8Rng::seed_from_u64(seed),
            side: Side::Producer,
            remaining: 0,
        })
    }
}

impl Scheduler for Starvation {
    fn next(&mut self) -> Side {
        if self.remaining == 0 {
            self.side = if self.rng.gen_bool(0.5) {
                Side::Producer
            } else {
                Side::Consumer
            };
            self.remaining = self.rng.gen_range(1..=self.max_burst);
        }
        self.remaining -= 1;
        self.side
    }

    fn name(&self) -> &'static str {
        "starvation"
    }
}

/// Schedule selection as it appears in config files.
///
/// ```toml
/// [schedule]
/// kind = "jitter"
/// producer_bias = 0.2
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleConfig {
    /// See [`Lockstep`].
    #[default]
    Lockstep,
    /// See [`Ratio`].
    Ratio {
        /// Producer steps per period.
        producer: u32,
        /// Consumer steps per period.
        consumer: u32,
    },
    /// See [`Jitter`].
    Jitter {
        /// Probability that a step goes to the producer.
        producer_bias: f64,
    },
    /// See [`Starvation`].
    Starvation {
        /// Longest burst on one side.
        max_burst: u32,
    },
}

impl ScheduleConfig {
    /// Builds the scheduler. `seed` is ignored by deterministic kinds.
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` if the parameters starve a domain.
    pub fn build(&self, seed: u64) -> SimResult<Box<dyn Scheduler>> {
        Ok(match *self {
            Self::Lockstep => Box::new(Lockstep::new()),
            Self::Ratio { producer, consumer } => Box::new(Ratio::new(producer, consumer)?),
            Self::Jitter { producer_bias } => Box::new(Jitter::new(producer_bias, seed)?),
            Self::Starvation { max_burst } => Box::new(Starvation::new(max_burst, seed)?),
        })
    }

    /// One representative config per kind, used by the stress sweep.
    #[must_use]
    pub fn sweep() -> Vec<Self> {
        vec![
            Self::Lockstep,
            Self::Ratio {
                producer: 1,
                consumer: 7,
            },
            Self::Ratio {
                producer: 13,
                consumer: 1,
            },
            Self::Jitter { producer_bias: 0.5 },
            Self::Jitter {
                producer_bias: 0.05,
            },
            Self::Jitter {
                producer_bias: 0.95,
            },
            Self::Starvation { max_burst: 64 },
        ]
    }
}
