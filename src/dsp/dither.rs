//! Dither / noise-floor service.
//!
//! A single process-wide table of triangular-PDF variates at 24-bit LSB scale,
//! built once from a fixed seed. Channels walk it with their own cursor, so the
//! render path only ever does a table read.
//!
//! The same variates serve two purposes:
//! - quantisation dither added to every output sample
//! - a perturbation on one-pole smoother targets that keeps long decays out
//!   of the denormal range (see [`crate::dsp::utils::safe_relax`])

use once_cell::sync::Lazy;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Table length. Power of two so the cursor wraps with a mask.
pub const DITHER_TABLE_LEN: usize = 128 * 1024;

/// One LSB of a 24-bit converter.
pub const DITHER_SCALE: f64 = 1.0 / 16_777_216.0;

const DITHER_SEED: u64 = 0x0D17_4E5E;

static DITHER_TABLE: Lazy<Box<[f32]>> = Lazy::new(|| {
    let mut rng = ChaCha8Rng::seed_from_u64(DITHER_SEED);
    (0..DITHER_TABLE_LEN)
        .map(|_| {
            let u1: f64 = rng.random();
            let u2: f64 = rng.random();
            ((u1 - u2) * DITHER_SCALE) as f32
        })
        .collect()
});

/// Build the shared table. Call from a non-real-time context before the
/// first render so the audio thread never pays for it.
pub fn warm_up() {
    Lazy::force(&DITHER_TABLE);
}

/// Per-channel read cursor into the shared table.
#[derive(Debug, Clone, Copy)]
pub struct Dither {
    pos: usize,
}

impl Dither {
    pub fn new(offset: usize) -> Self {
        Self {
            pos: offset & (DITHER_TABLE_LEN - 1),
        }
    }

    #[inline]
    pub fn next(&mut self) -> f64 {
        let v = DITHER_TABLE[self.pos];
        self.pos = (self.pos + 1) & (DITHER_TABLE_LEN - 1);
        v as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dither_bounds_and_mean() {
        let mut d = Dither::new(0);
        let mut sum = 0.0;
        let n = 10_000;
        for _ in 0..n {
            let v = d.next();
            assert!(v.abs() <= DITHER_SCALE);
            sum += v;
        }
        assert!((sum / n as f64).abs() < DITHER_SCALE * 0.05);
    }

    #[test]
    fn test_dither_is_deterministic_and_wraps() {
        let mut a = Dither::new(5);
        let mut b = Dither::new(5 + DITHER_TABLE_LEN);
        for _ in 0..100 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn test_dither_is_triangular() {
        // TPDF: the central half of the range holds 75% of the mass
        let mut d = Dither::new(1234);
        let n = 40_000;
        let inner = (0..n)
            .filter(|_| d.next().abs() < 0.5 * DITHER_SCALE)
            .count();
        let frac = inner as f64 / n as f64;
        assert!((frac - 0.75).abs() < 0.02);
    }
}
