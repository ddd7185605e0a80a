//! Loop length planning.
//!
//! A loop is played back block by block, so its length has to be a whole
//! number of natural periods *and* a whole number of blocks. The smallest
//! such length is `lcm(period_len, block_len)`.

use crate::error::{GeneratorError, Result};

/// Upper bound on rendered samples per loop (128 MiB of `f32`). Longer
/// cycles, or blocks that large, are rejected before anything is allocated.
pub const MAX_LOOP_SAMPLES: usize = 1 << 25;

/// Greatest common divisor (Euclid).
#[inline]
pub fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Lowest common multiple. Returns 0 if either argument is 0.
#[inline]
pub fn lcm(a: usize, b: usize) -> usize {
    checked_lcm(a, b).unwrap_or(usize::MAX)
}

/// Lowest common multiple, `None` on overflow.
#[inline]
pub fn checked_lcm(a: usize, b: usize) -> Option<usize> {
    if a == 0 || b == 0 {
        return Some(0);
    }
    (a / gcd(a, b)).checked_mul(b)
}

/// Samples per natural cycle of a tone, truncated to an integer.
///
/// The truncation is the accepted pitch approximation of the looped tone:
/// 1000 Hz at 44.1 kHz plays back as 44100 / 44 ≈ 1002.27 Hz.
#[inline]
pub fn period_len(sample_rate: u32, frequency: f64) -> usize {
    (sample_rate as f64 / frequency) as usize
}

/// Layout of one super-buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPlan {
    period_len: usize,
    block_len: usize,
    ntimes: usize,
    len: usize,
}

impl BufferPlan {
    /// Plan a loop for a signal repeating every `period_len` samples, read in
    /// blocks of `block_len` samples.
    pub fn new(period_len: usize, block_len: usize) -> Result<Self> {
        if period_len == 0 {
            return Err(GeneratorError::invalid(
                "period_len",
                "natural period must be at least one sample",
            ));
        }
        if block_len == 0 {
            return Err(GeneratorError::invalid("block_len", "must be greater than zero"));
        }

        let len = checked_lcm(period_len, block_len).ok_or_else(|| {
            GeneratorError::invalid(
                "block_len",
                format!("lcm({period_len}, {block_len}) overflows the index range"),
            )
        })?;

        let ntimes = block_len.div_ceil(period_len);
        match ntimes.checked_mul(period_len) {
            Some(stored) if stored <= MAX_LOOP_SAMPLES => {}
            _ => {
                return Err(GeneratorError::invalid(
                    "period_len",
                    format!(
                        "{ntimes} x {period_len} samples exceeds the loop limit of {MAX_LOOP_SAMPLES}"
                    ),
                ));
            }
        }

        Ok(Self {
            period_len,
            block_len,
            ntimes,
            len,
        })
    }

    /// Natural period (or sweep cycle) in samples.
    pub fn period_len(&self) -> usize {
        self.period_len
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Natural periods to synthesize so that at least one block fits.
    pub fn ntimes(&self) -> usize {
        self.ntimes
    }

    /// Logical loop length `N`.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Blocks per loop, `N / block_len`. Always exact.
    pub fn nblocks(&self) -> usize {
        self.len / self.block_len
    }

    /// Samples actually rendered: `ntimes` natural periods.
    ///
    /// `N` is a multiple of `period_len` and so is this, so logical index
    /// `k` maps to stored index `k % stored_len` without changing the signal.
    pub fn stored_len(&self) -> usize {
        self.ntimes * self.period_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd_lcm_known_values() {
        assert_eq!(gcd(48, 18), 6);
        assert_eq!(lcm(48, 18), 144);
        assert_eq!(gcd(44100, 1000), 100);
        assert_eq!(lcm(44100, 1000), 441_000);
        assert_eq!(gcd(7, 0), 7);
        assert_eq!(lcm(0, 5), 0);
    }

    #[test]
    fn test_lcm_overflow_detected() {
        assert_eq!(checked_lcm(usize::MAX, usize::MAX - 1), None);
        assert!(BufferPlan::new(usize::MAX, usize::MAX - 1).is_err());
    }

    #[test]
    fn test_plan_is_multiple_of_both() {
        for &(fs, f0, block) in &[
            (44100u32, 1000.0, 512usize),
            (48000, 440.0, 256),
            (44100, 63.0, 1024),
            (96000, 12345.6, 64),
            (8000, 3999.0, 1),
        ] {
            let p = period_len(fs, f0);
            let plan = BufferPlan::new(p, block).unwrap();
            assert_eq!(plan.len() % p, 0, "fs={fs} f0={f0}");
            assert_eq!(plan.len() % block, 0, "fs={fs} f0={f0}");
            assert_eq!(plan.nblocks() * block, plan.len());
            assert_eq!(plan.stored_len() % p, 0);
            assert!(plan.stored_len() >= block);
        }
    }

    #[test]
    fn test_thousand_hertz_scenario() {
        let p = period_len(44100, 1000.0);
        assert_eq!(p, 44);
        let plan = BufferPlan::new(p, 512).unwrap();
        assert_eq!(plan.len(), 5632);
        assert_eq!(plan.nblocks(), 11);
        assert_eq!(plan.ntimes(), 12);
        assert_eq!(plan.stored_len(), 528);
    }

    #[test]
    fn test_oversized_loop_rejected() {
        assert!(BufferPlan::new(MAX_LOOP_SAMPLES, 1024).is_ok());
        let err = BufferPlan::new(MAX_LOOP_SAMPLES + 1, 1024).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidParameter { name: "period_len", .. }));
        // Huge periods are rejected even when the lcm itself fits.
        assert!(BufferPlan::new(period_len(44100, 1e-9), 1).is_err());
    }

    #[test]
    fn test_zero_lengths_rejected() {
        assert!(BufferPlan::new(0, 512).is_err());
        assert!(BufferPlan::new(44, 0).is_err());
    }
}
