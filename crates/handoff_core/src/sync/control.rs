//! # Control Synchronizer
//!
//! Carries a control-plane boolean (halt, drain, reset) into a domain.
//!
//! Assertion takes effect on the very step it is observed, so a domain can
//! be halted without waiting for the crossing to settle. Deassertion is
//! filtered through every stage, so release is glitch-free.

use crate::error::ConfigResult;
use crate::sync::StabilizingFilter;

/// Asymmetric boolean synchronizer: fast assert, filtered deassert.
#[derive(Clone, Debug)]
pub struct ControlSynchronizer {
    filter: StabilizingFilter<bool>,
}

impl ControlSynchronizer {
    /// Creates a synchronizer whose output starts inactive.
    ///
    /// # Errors
    ///
    /// `TooFewStages` if `stages < 2`.
    pub fn new(stages: usize) -> ConfigResult<Self> {
        Ok(Self {
            filter: StabilizingFilter::new(stages, false)?,
        })
    }

    /// Samples the raw control and returns the synchronized level.
    #[inline]
    pub fn step(&mut self, raw_control: bool) -> bool {
        if raw_control {
            self.filter.force(true);
            true
        } else {
            self.filter.step(false)
        }
    }

    /// Current synchronized level, without stepping.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.filter.output()
    }

    /// Steps needed for a deassertion to become visible.
    #[inline]
    #[must_use]
    pub fn release_latency(&self) -> usize {
        self.filter.stages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_is_immediate() {
        let mut sync = ControlSynchronizer::new(3).unwrap();
        assert!(!sync.is_active());
        assert!(sync.step(true));
        assert!(sync.is_active());
    }

    #[test]
    fn test_deassert_is_filtered() {
        let mut sync = ControlSynchronizer::new(3).unwrap();
        sync.step(true);

        assert!(sync.step(false));
        assert!(sync.step(false));
        assert!(!sync.step(false));
        assert_eq!(sync.release_latency(), 3);
    }

    #[test]
    fn test_reassert_during_release() {
        let mut sync = ControlSynchronizer::new(4).unwrap();
        sync.step(true);
        sync.step(false);
        sync.step(false);

        // A glitch back to active restarts the release from scratch
        assert!(sync.step(true));
        for _ in 0..3 {
            assert!(sync.step(false));
        }
        assert!(!sync.step(false));
    }

    #[test]
    fn test_rejects_shallow_depth() {
        assert!(ControlSynchronizer::new(1).is_err());
    }
}
