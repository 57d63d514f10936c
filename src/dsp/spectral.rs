//! Spectral Transform Service
//!
//! Real forward/inverse transform over a fixed power-of-two block, plus the
//! cell accessors and spectral multiply the correction path needs.
//!
//! # Scaling
//! - Forward output is divided by the block size, so a full-scale cosine at
//!   cell `k` reads 0.5 in that cell.
//! - Inverse is unscaled, so `inverse(forward(x)) == x`.
//!
//! Spectra are half spectra: cells `0..=size/2`, DC and Nyquist real.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

pub type Cell = Complex<f64>;

/// Forward/inverse real transform backend.
///
/// Implementations own whatever scratch they need; both directions must be
/// allocation-free once planned.
pub trait SpectralTransform {
    /// Plan a transform for `size` real samples. Allocates.
    fn plan(size: usize) -> Self
    where
        Self: Sized;

    fn size(&self) -> usize;

    /// `time` (len `size`) to `spectrum` (len `size/2 + 1`), scaled by `1/size`.
    fn forward(&mut self, time: &[f64], spectrum: &mut [Cell]);

    /// `spectrum` (len `size/2 + 1`) to `time` (len `size`), unscaled.
    fn inverse(&mut self, spectrum: &[Cell], time: &mut [f64]);

    #[inline]
    fn spectrum_len(&self) -> usize {
        self.size() / 2 + 1
    }

    #[inline]
    fn dc(&self, spectrum: &[Cell]) -> f64 {
        spectrum[0].re
    }

    #[inline]
    fn nyquist(&self, spectrum: &[Cell]) -> f64 {
        spectrum[self.size() / 2].re
    }

    #[inline]
    fn set_dc(&self, spectrum: &mut [Cell], v: f64) {
        spectrum[0] = Complex::new(v, 0.0);
    }

    #[inline]
    fn set_nyquist(&self, spectrum: &mut [Cell], v: f64) {
        spectrum[self.size() / 2] = Complex::new(v, 0.0);
    }

    #[inline]
    fn cell(&self, spectrum: &[Cell], k: usize) -> Cell {
        spectrum[k]
    }

    #[inline]
    fn set_cell(&self, spectrum: &mut [Cell], k: usize, v: Cell) {
        spectrum[k] = v;
    }

    /// `data *= filter`, cell by cell.
    fn multiply(&self, filter: &[Cell], data: &mut [Cell]) {
        for (d, f) in data.iter_mut().zip(filter.iter()) {
            *d *= *f;
        }
    }
}

/// rustfft-backed transform. Runs a complex transform of the full block and
/// keeps the non-negative half.
pub struct RustFftTransform {
    size: usize,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
    buf: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl SpectralTransform for RustFftTransform {
    fn plan(size: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(size);
        let ifft = planner.plan_fft_inverse(size);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());

        Self {
            size,
            fft,
            ifft,
            buf: vec![Complex::default(); size],
            scratch: vec![Complex::default(); scratch_len],
        }
    }

    #[inline]
    fn size(&self) -> usize {
        self.size
    }

    fn forward(&mut self, time: &[f64], spectrum: &mut [Cell]) {
        let n = self.size;
        for (b, &x) in self.buf.iter_mut().zip(time.iter()) {
            *b = Complex::new(x, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);

        let scale = 1.0 / n as f64;
        for (s, b) in spectrum.iter_mut().zip(self.buf.iter()).take(n / 2 + 1) {
            *s = *b * scale;
        }
        spectrum[0].im = 0.0;
        spectrum[n / 2].im = 0.0;
    }

    fn inverse(&mut self, spectrum: &[Cell], time: &mut [f64]) {
        let n = self.size;
        let half = n / 2;

        self.buf[0] = Complex::new(spectrum[0].re, 0.0);
        self.buf[half] = Complex::new(spectrum[half].re, 0.0);
        for k in 1..half {
            self.buf[k] = spectrum[k];
            self.buf[n - k] = spectrum[k].conj();
        }
        self.ifft.process_with_scratch(&mut self.buf, &mut self.scratch);

        for (t, b) in time.iter_mut().zip(self.buf.iter()) {
            *t = b.re;
        }
    }
}
