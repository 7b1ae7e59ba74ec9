//! # Handoff Stress
//!
//! Sweeps seeds across every schedule kind and several filter depths, then
//! runs the threaded check once per depth.
//!
//! ```text
//! handoff_stress [config.toml] [seeds]
//! RUST_LOG=debug handoff_stress
//! ```
//!
//! Exits 1 on the first violation.

use handoff_sim::{generate_words, run_threaded, Harness, ScheduleConfig, SimConfig, SimResult};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEPTHS: [usize; 3] = [2, 3, 5];
const DEFAULT_SEEDS: u64 = 16;

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_names(true)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
    }

    let mut args = std::env::args().skip(1);
    let base = match args.next() {
        Some(path) => match SimConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("cannot load {}: {}", path, e);
                std::process::exit(2);
            }
        },
        None => SimConfig::default(),
    };
    let seeds = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SEEDS);

    match stress(&base, seeds) {
        Ok(runs) => tracing::info!("all {} runs passed", runs),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn stress(base: &SimConfig, seeds: u64) -> SimResult<usize> {
    let mut runs = 0;

    for stages in DEPTHS {
        for schedule in ScheduleConfig::sweep() {
            for offset in 0..seeds {
                let config = SimConfig {
                    channel: handoff_core::ChannelConfig {
                        stages,
                        ..base.channel
                    },
                    schedule: schedule.clone(),
                    seed: base.seed.wrapping_add(offset),
                    ..base.clone()
                };
                let words =
                    generate_words(config.seed, config.words, config.channel.word_width_bits);

                let report = Harness::<u64>::from_config(&config)?.run(&words)?;
                tracing::debug!(
                    "stages {} {:?} seed {:#x}: {} words, {} steps, {} busy",
                    stages,
                    schedule,
                    config.seed,
                    report.completed,
                    report.total_steps(),
                    report.busy_rejections
                );
                runs += 1;
            }
        }

        let config = SimConfig {
            channel: handoff_core::ChannelConfig {
                stages,
                ..base.channel
            },
            ..base.clone()
        };
        let report = run_threaded(&config)?;
        tracing::info!(
            "stages {}: threaded {} words in {:?}",
            stages,
            report.delivered,
            report.elapsed
        );
        runs += 1;
    }

    Ok(runs)
}
