//! Biquad Filter and Crest-Factor Detector
//!
//! Second-order recursive sections in transposed direct form II, and the
//! fourth-order high-pass used to measure per-block crest factor for the gain
//! controller's transient detection.
//!
//! # Design Notes
//! - f64 throughout; the correction path runs in double precision
//! - No allocations; safe for the audio thread
//! - State is flushed to zero below 1e-20 once per block instead of carrying
//!   an anti-denormal offset, so a silent input settles to exact zeros

use crate::dsp::utils::{db10, flush_denormal};
use std::f64::consts::PI;

/// Crest detector corner frequency (Hz).
const CREST_HPF_HZ: f64 = 500.0;
/// Butterworth section Qs for a fourth-order response.
const CREST_HPF_Q: [f64; 2] = [1.306_562_964_876_376_6, 0.541_196_100_146_197];

/// Biquad filter implementation (IIR 2nd order)
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    a0: f64,
    a1: f64,
    a2: f64,
    b1: f64,
    b2: f64,
    z1: f64,
    z2: f64,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl Biquad {
    pub fn new() -> Self {
        Self {
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
            b1: 0.0,
            b2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Process a single sample
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let out = input * self.a0 + self.z1;
        self.z1 = input * self.a1 + self.z2 - self.b1 * out;
        self.z2 = input * self.a2 - self.b2 * out;
        out
    }

    #[inline]
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Zero any state that has decayed into the denormal neighbourhood.
    #[inline]
    pub fn flush_denormals(&mut self) {
        self.z1 = flush_denormal(self.z1);
        self.z2 = flush_denormal(self.z2);
    }

    // ---------------------------------------------------------------------
    // Filter design helpers (RBJ-style)
    // ---------------------------------------------------------------------

    pub fn update_hpf(&mut self, cutoff: f64, q: f64, sr: f64) {
        let w0 = 2.0 * PI * cutoff / sr;
        let alpha = w0.sin() / (2.0 * q.max(1e-6));
        let cw0 = w0.cos();

        let a0 = 1.0 + alpha;
        let inv_a0 = 1.0 / a0;

        self.a0 = ((1.0 + cw0) * 0.5) * inv_a0;
        self.a1 = -(1.0 + cw0) * inv_a0;
        self.a2 = ((1.0 + cw0) * 0.5) * inv_a0;
        self.b1 = (-2.0 * cw0) * inv_a0;
        self.b2 = (1.0 - alpha) * inv_a0;
    }
}

/// Peak-to-RMS meter over a high-passed block.
///
/// The high-pass keeps low-frequency energy, which carries little transient
/// information, from dominating the ratio.
#[derive(Debug, Clone)]
pub struct CrestDetector {
    sections: [Biquad; 2],
}

impl CrestDetector {
    pub fn new(sample_rate: f64) -> Self {
        let mut sections = [Biquad::new(); 2];
        for (s, &q) in sections.iter_mut().zip(CREST_HPF_Q.iter()) {
            s.update_hpf(CREST_HPF_HZ, q, sample_rate);
        }
        Self { sections }
    }

    pub fn reset(&mut self) {
        for s in &mut self.sections {
            s.reset();
        }
    }

    /// Crest factor (dB) of `block` after high-passing.
    ///
    /// Filter state carries over between calls.
    pub fn measure(&mut self, block: &[f64]) -> f64 {
        let mut peak = 0.0_f64;
        let mut sum_sq = 0.0;
        let [first, second] = &mut self.sections;
        for &x in block {
            let y = second.process(first.process(x));
            peak = peak.max(y.abs());
            sum_sq += y * y;
        }
        for s in &mut self.sections {
            s.flush_denormals();
        }
        if block.is_empty() {
            return 0.0;
        }
        db10(peak * peak) - db10(sum_sq / block.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hpf_matches_reference_sections() {
        // reference sections for 500 Hz at 48 kHz
        let mut hi_q = Biquad::new();
        hi_q.update_hpf(500.0, CREST_HPF_Q[0], 48_000.0);
        assert!((hi_q.a0 - 0.974538047066236).abs() < 1e-9);
        assert!((hi_q.b1 + 1.9469872972295479).abs() < 1e-9);
        assert!((hi_q.b2 - 0.9511648910353966).abs() < 1e-9);

        let mut lo_q = Biquad::new();
        lo_q.update_hpf(500.0, CREST_HPF_Q[1], 48_000.0);
        assert!((lo_q.a0 - 0.9420089366880302).abs() < 1e-9);
        assert!((lo_q.b2 - 0.8860369483166486).abs() < 1e-9);
    }

    #[test]
    fn test_sine_crest_is_3db() {
        let sr = 48_000.0;
        let mut det = CrestDetector::new(sr);
        let block: Vec<f64> = (0..128)
            .map(|i| (2.0 * PI * 3000.0 * i as f64 / sr).sin())
            .collect();
        let mut crest = 0.0;
        for _ in 0..50 {
            crest = det.measure(&block);
        }
        assert!((crest - 3.0).abs() < 0.5);
    }

    #[test]
    fn test_impulse_has_high_crest() {
        let mut det = CrestDetector::new(48_000.0);
        let mut block = vec![0.0; 128];
        block[10] = 1.0;
        assert!(det.measure(&block) > 12.0);
    }

    #[test]
    fn test_silence_settles_to_zero_state() {
        let mut det = CrestDetector::new(48_000.0);
        let mut block = vec![0.0; 128];
        block[0] = 1.0;
        det.measure(&block);
        block[0] = 0.0;
        for _ in 0..200 {
            det.measure(&block);
        }
        for s in &det.sections {
            assert_eq!(s.z1, 0.0);
            assert_eq!(s.z2, 0.0);
        }
    }
}
