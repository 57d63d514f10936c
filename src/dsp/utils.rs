//! Shared numeric helpers for the correction path.
//!
//! Everything here is allocation-free except the window builders, which are
//! only called when the sample rate (and therefore the block size) changes.

use std::f64::consts::PI;

/// Floor reported by [`db10`] for non-positive powers.
pub const DB_FLOOR: f64 = -140.0;

/// Filter state magnitudes below this are flushed to zero.
pub const DENORMAL_FLUSH: f64 = 1e-20;

/// Power ratio to dB. Non-positive powers read as [`DB_FLOOR`].
#[inline]
pub fn db10(x: f64) -> f64 {
    if x > 0.0 {
        10.0 * x.log10()
    } else {
        DB_FLOOR
    }
}

/// dB to amplitude ratio.
#[inline]
pub fn ampl20(db: f64) -> f64 {
    10.0_f64.powf(0.05 * db)
}

/// dB to power ratio.
#[inline]
pub fn ampl10(db: f64) -> f64 {
    10.0_f64.powf(0.1 * db)
}

/// Inverted dB to power ratio, used to turn a threshold curve into a weighting.
#[inline]
pub fn inv_ampl10(db: f64) -> f64 {
    ampl10(-db)
}

#[inline]
pub fn identity(v: f64) -> f64 {
    v
}

/// One-pole coefficient for an e-folding time `tc` (seconds) at update rate `fs`.
///
/// A non-positive time constant means "jump immediately" and yields 1.
#[inline]
pub fn e_folding(tc: f64, fs: f64) -> f64 {
    if tc <= 0.0 {
        1.0
    } else {
        1.0 - (-1.0 / (tc * fs)).exp()
    }
}

/// One-pole update with a dither perturbation riding on the target.
///
/// The dither keeps long decays out of the denormal range.
#[inline]
pub fn safe_relax(acc: &mut f64, target: f64, coeff: f64, dither: f64) {
    *acc += coeff * (target + dither - *acc);
}

#[inline]
pub fn flush_denormal(x: f64) -> f64 {
    if x.abs() < DENORMAL_FLUSH {
        0.0
    } else {
        x
    }
}

/// Full-block Hann analysis window, `sin²(π·i/n)`.
pub fn make_hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let s = (PI * i as f64 / n as f64).sin();
            s * s
        })
        .collect()
}

/// Half-block kernel gate, `sin²(2π·i/n)` over `n/2` points.
///
/// Peaks at index `n/4`; the first quarter is the rising half, the second the
/// falling half.
pub fn make_half_hann_gate(n: usize) -> Vec<f64> {
    (0..n / 2)
        .map(|i| {
            let s = (2.0 * PI * i as f64 / n as f64).sin();
            s * s
        })
        .collect()
}

/// Linear interpolation between `t[ix]` and `t[ix + 1]`.
#[inline]
pub fn interp(t: &[f64], ix: usize, frac: f64) -> f64 {
    if frac == 0.0 {
        t[ix]
    } else {
        (1.0 - frac) * t[ix] + frac * t[ix + 1]
    }
}
