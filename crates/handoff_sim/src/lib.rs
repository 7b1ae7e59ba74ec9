//! # Handoff Sim
//!
//! Stress harness for `handoff_core` channels.
//!
//! Two ways to drive a channel:
//!
//! - [`Harness`]: both domains in one thread, interleaved by a seeded
//!   [`Scheduler`]. Every step is checked against the protocol invariants
//!   and the first broken one is returned as a [`Violation`].
//! - [`run_threaded`]: split endpoints on two OS threads with random jitter,
//!   ordering checked on arrival.
//!
//! ```rust
//! use handoff_sim::{Harness, SimConfig};
//!
//! let config = SimConfig::from_toml_str("[schedule]\nkind = \"starvation\"\nmax_burst = 8\n")?;
//! let mut harness = Harness::<u32>::from_config(&config)?;
//! let report = harness.run(&[1, 2, 3])?;
//! assert_eq!(report.delivered, vec![1, 2, 3]);
//! # Ok::<(), handoff_sim::SimError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod harness;
pub mod schedule;
pub mod threaded;

pub use config::SimConfig;
pub use error::{SimError, SimResult, Violation};
pub use harness::{Harness, RunReport, TraceEvent};
pub use schedule::{Jitter, Lockstep, Ratio, ScheduleConfig, Scheduler, Side, Starvation};
pub use threaded::{generate_words, run_threaded, ThreadedReport};
