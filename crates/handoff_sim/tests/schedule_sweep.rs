//! Harness runs across every schedule kind, depth and a spread of seeds.

use handoff_core::{ChannelConfig, HandshakeChannel};
use handoff_sim::{
    generate_words, run_threaded, Harness, Jitter, Ratio, ScheduleConfig, SimConfig, SimError,
    Starvation, Violation,
};
use proptest::prelude::*;

fn config(stages: usize, schedule: ScheduleConfig, seed: u64, words: usize) -> SimConfig {
    SimConfig {
        channel: ChannelConfig::new(stages, 24),
        schedule,
        seed,
        words,
        ..SimConfig::default()
    }
}

#[test]
fn test_sweep_delivers_in_order() {
    for stages in [2, 3, 6] {
        for schedule in ScheduleConfig::sweep() {
            for seed in 0..4 {
                let config = config(stages, schedule.clone(), seed, 64);
                let words = generate_words(seed, config.words, 24);

                let report = Harness::<u64>::from_config(&config)
                    .unwrap()
                    .run(&words)
                    .unwrap_or_else(|e| panic!("{stages} {schedule:?} {seed}: {e}"));

                assert_eq!(report.delivered, words);
                assert_eq!(report.completed, words.len());
                assert_eq!(report.settle_steps, 2 * stages as u64);
            }
        }
    }
}

#[test]
fn test_round_trip_lower_bound_holds() {
    // Each transfer crosses both filters twice
    for stages in [2usize, 4, 7] {
        let channel = HandshakeChannel::<u8>::new(stages, 8).unwrap();
        let scheduler = Box::new(Ratio::new(1, 1).unwrap());
        let report = Harness::new(channel, scheduler, 1_000_000)
            .run(&[1, 2, 3, 4])
            .unwrap();
        assert!(report.producer_steps >= 4 * 2 * stages as u64);
    }
}

#[test]
fn test_extreme_starvation_still_completes() {
    let channel = HandshakeChannel::<u16>::new(3, 16).unwrap();
    let scheduler = Box::new(Starvation::new(5_000, 11).unwrap());
    let words: Vec<u16> = (0..32).map(|i| i * 997).collect();

    let report = Harness::new(channel, scheduler, 10_000_000).run(&words).unwrap();
    assert_eq!(report.delivered, words);
}

#[test]
fn test_invalid_schedule_from_config() {
    let config = config(2, ScheduleConfig::Ratio { producer: 0, consumer: 3 }, 0, 1);
    assert!(matches!(
        Harness::<u64>::from_config(&config),
        Err(SimError::InvalidSchedule(_))
    ));
}

#[test]
fn test_width_checked_from_config() {
    let config = config(2, ScheduleConfig::Lockstep, 0, 1);
    let config = SimConfig {
        channel: ChannelConfig::new(2, 64),
        ..config
    };
    assert!(matches!(
        Harness::<u8>::from_config(&config),
        Err(SimError::Config(_))
    ));
}

#[test]
fn test_tiny_budget_stalls() {
    let channel = HandshakeChannel::<u8>::new(4, 8).unwrap();
    let scheduler = Box::new(Jitter::new(0.5, 1).unwrap());
    let err = Harness::new(channel, scheduler, 10).run(&[7]).unwrap_err();
    assert!(matches!(
        err,
        SimError::Violation(Violation::Stalled { completed: 0, total: 1, .. })
    ));
}

#[test]
fn test_threaded_from_toml() {
    let config = SimConfig::from_toml_str(
        r#"
        seed = 99
        words = 300
        max_spin = 16

        [channel]
        stages = 3
        word_width_bits = 20
        "#,
    )
    .unwrap();

    let report = run_threaded(&config).unwrap();
    assert_eq!(report.delivered, 300);
    assert_eq!(report.completed, 300);
    assert_eq!(report.settle_steps, 6);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn jitter_any_seed_any_bias(seed in any::<u64>(), bias in 0.02f64..0.98, stages in 2usize..6) {
        let words = generate_words(seed, 24, 32);
        let channel = HandshakeChannel::<u64>::new(stages, 32).unwrap();
        let scheduler = Box::new(Jitter::new(bias, seed).unwrap());

        let report = Harness::new(channel, scheduler, 5_000_000).run(&words).unwrap();
        prop_assert_eq!(report.delivered, words);
    }

    #[test]
    fn starvation_any_seed(seed in any::<u64>(), burst in 1u32..400) {
        let words = generate_words(seed, 16, 32);
        let channel = HandshakeChannel::<u64>::new(2, 32).unwrap();
        let scheduler = Box::new(Starvation::new(burst, seed).unwrap());

        let report = Harness::new(channel, scheduler, 5_000_000).run(&words).unwrap();
        prop_assert_eq!(report.completed, 16);
        prop_assert_eq!(report.delivered, words);
    }
}
