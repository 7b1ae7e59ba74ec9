//! # Bit-Width Helpers
//!
//! Integer width arithmetic used to validate declared word widths.

use crate::error::{ConfigResult, ConfigurationError};

/// Number of bits a value of type `T` occupies.
#[inline]
#[must_use]
pub const fn word_bits<T>() -> usize {
    std::mem::size_of::<T>() * 8
}

/// Minimum number of bits needed to represent `value` (0 needs 0 bits).
#[inline]
#[must_use]
pub const fn bit_width(value: u64) -> u32 {
    u64::BITS - value.leading_zeros()
}

/// Ceiling log2. `clog2(1) == 0`, `clog2(5) == 3`.
///
/// `clog2(0)` is defined as 0.
#[inline]
#[must_use]
pub const fn clog2(value: u64) -> u32 {
    if value <= 1 {
        0
    } else {
        bit_width(value - 1)
    }
}

/// Low-`width` bit mask, saturating at 64 bits.
#[inline]
#[must_use]
pub const fn mask(width: u32) -> u64 {
    if width >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Validates a declared word width against the word type `T`.
///
/// # Errors
///
/// `ZeroWidthWord` if `T` is zero-sized or `width` is 0,
/// `WordTooWide` if `width` exceeds the bits of `T`.
pub fn check_word_width<T>(width: usize) -> ConfigResult<()> {
    let capacity = word_bits::<T>();
    if capacity == 0 || width == 0 {
        return Err(ConfigurationError::ZeroWidthWord);
    }
    if width > capacity {
        return Err(ConfigurationError::WordTooWide { width, capacity });
    }
    Ok(())
}
