//! # Stabilizing Filter
//!
//! A fixed-depth register chain. A value crossing into a domain becomes
//! visible only after it has propagated through every stage.
//!
//! ```text
//!   input ──► [slot 0] ──► [slot 1] ──► ... ──► [slot k-1] ──► output
//! ```
//!
//! The chain is a ring: each step overwrites the oldest slot with the new
//! input and advances the cursor, so no element is ever moved.

use crate::error::{ConfigResult, ConfigurationError};
use crate::sync::MIN_STAGES;

/// Fixed-depth crossing filter.
///
/// Owned and stepped exclusively by the receiving domain.
///
/// ## Usage
///
/// ```rust
/// use handoff_core::StabilizingFilter;
///
/// let mut filter = StabilizingFilter::new(2, false).unwrap();
/// assert!(!filter.step(true)); // still in flight
/// assert!(filter.step(true));  // settled after 2 steps
/// ```
#[derive(Clone, Debug)]
pub struct StabilizingFilter<T: Copy> {
    /// Ring of stages. `slots[oldest]` is the output.
    slots: Box<[T]>,
    /// Index of the oldest slot.
    oldest: usize,
    /// Value loaded into every slot on reset.
    reset_value: T,
    /// Reset requested, applied on the next step.
    reset_pending: bool,
}

impl<T: Copy> StabilizingFilter<T> {
    /// Creates a filter with every slot holding `reset_value`.
    ///
    /// # Errors
    ///
    /// `TooFewStages` if `stages < 2`.
    pub fn new(stages: usize, reset_value: T) -> ConfigResult<Self> {
        if stages < MIN_STAGES {
            return Err(ConfigurationError::TooFewStages {
                stages,
                min: MIN_STAGES,
            });
        }

        Ok(Self {
            slots: vec![reset_value; stages].into_boxed_slice(),
            oldest: 0,
            reset_value,
            reset_pending: false,
        })
    }

    /// Samples `input` and returns the settled output.
    ///
    /// An input held constant is returned on exactly the `stages()`-th call.
    #[inline]
    pub fn step(&mut self, input: T) -> T {
        if self.reset_pending {
            self.slots.fill(self.reset_value);
            self.reset_pending = false;
        }

        // The oldest slot is recycled as the newest.
        self.slots[self.oldest] = input;
        self.oldest = (self.oldest + 1) % self.slots.len();
        self.slots[self.oldest]
    }

    /// Current output, without stepping.
    #[inline]
    #[must_use]
    pub fn output(&self) -> T {
        self.slots[self.oldest]
    }

    /// Requests a synchronous reset.
    ///
    /// Every slot is loaded with the reset value at the start of the next
    /// `step`, before that step's input is shifted in. `output()` is
    /// unaffected until then.
    #[inline]
    pub fn reset(&mut self) {
        self.reset_pending = true;
    }

    /// Loads `value` into every slot immediately.
    ///
    /// Cancels any pending reset.
    #[inline]
    pub fn force(&mut self, value: T) {
        self.slots.fill(value);
        self.reset_pending = false;
    }

    /// Filter depth.
    #[inline]
    #[must_use]
    pub fn stages(&self) -> usize {
        self.slots.len()
    }

    /// Value loaded on reset.
    #[inline]
    #[must_use]
    pub fn reset_value(&self) -> T {
        self.reset_value
    }

    /// Whether a reset is waiting for the next step.
    #[inline]
    #[must_use]
    pub fn is_reset_pending(&self) -> bool {
        self.reset_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_single_stage() {
        assert_eq!(
            StabilizingFilter::new(1, 0u8).unwrap_err(),
            ConfigurationError::TooFewStages { stages: 1, min: 2 }
        );
        assert!(StabilizingFilter::new(0, false).is_err());
    }

    #[test]
    fn test_settles_after_exactly_k_steps() {
        for k in 2..=6 {
            let mut filter = StabilizingFilter::new(k, 0u32).unwrap();
            for step in 1..k {
                assert_eq!(filter.step(7), 0, "k={k} settled early at step {step}");
            }
            assert_eq!(filter.step(7), 7, "k={k} did not settle");
            assert_eq!(filter.step(7), 7);
        }
    }

    #[test]
    fn test_preserves_order() {
        let mut filter = StabilizingFilter::new(3, 0u32).unwrap();
        let out: Vec<u32> = (1..=6).map(|v| filter.step(v)).collect();
        assert_eq!(out, vec![0, 0, 1, 2, 3, 4]);
        assert_eq!(filter.output(), 4);
    }

    #[test]
    fn test_reset_is_synchronous() {
        let mut filter = StabilizingFilter::new(2, 0u8).unwrap();
        filter.step(9);
        filter.step(9);
        assert_eq!(filter.output(), 9);

        filter.reset();
        assert!(filter.is_reset_pending());
        // Not visible until the next step
        assert_eq!(filter.output(), 9);

        assert_eq!(filter.step(5), 0);
        assert!(!filter.is_reset_pending());
        assert_eq!(filter.step(5), 5);
    }

    #[test]
    fn test_reset_then_settle() {
        let mut filter = StabilizingFilter::new(4, 0u8).unwrap();
        for v in [3, 1, 4, 1, 5] {
            filter.step(v);
        }
        filter.reset();
        let mut out = 0;
        for _ in 0..4 {
            out = filter.step(42);
        }
        assert_eq!(out, 42);
    }

    #[test]
    fn test_force_is_immediate() {
        let mut filter = StabilizingFilter::new(3, false).unwrap();
        filter.reset();
        filter.force(true);
        assert!(filter.output());
        assert!(!filter.is_reset_pending());
        assert!(filter.step(false));
        assert!(filter.step(false));
        assert!(!filter.step(false));
    }
}
