//! Filter Synthesis
//!
//! Turns a band gain curve into the spectral filter applied to one block.
//!
//! # Steps
//! 1. Spread band gains (dB) onto transform cells, add the unified EQ offset,
//!    convert to amplitude. Cells past the audible range and Nyquist are zero.
//! 2. Inverse transform: a zero-phase kernel wrapped around sample 0.
//! 3. Gate with a half-block Hann split across both ends of the block so the
//!    kernel spans at most half a block and the middle is silent.
//! 4. Forward transform: the filter multiplied into the data spectrum.

use crate::dsp::bark::{BarkMap, AUDIBLE_CELLS, CELL_TABLE_LEN, GAIN_BANDS};
use crate::dsp::spectral::{Cell, SpectralTransform};
use crate::dsp::utils::{ampl20, make_half_hann_gate};

pub struct FilterSynth {
    gate: Vec<f64>,
    gain_spectrum: Vec<Cell>,
    kernel: Vec<f64>,
    gated: Vec<f64>,
    filter: Vec<Cell>,
}

impl FilterSynth {
    /// Allocate for `block_size`-point transforms.
    pub fn new(block_size: usize) -> Self {
        let bins = block_size / 2 + 1;
        Self {
            gate: make_half_hann_gate(block_size),
            gain_spectrum: vec![Cell::default(); bins],
            kernel: vec![0.0; block_size],
            gated: vec![0.0; block_size],
            filter: vec![Cell::default(); bins],
        }
    }

    /// Build this block's filter from `gains_db` (per band) and `eq_db`
    /// (per cell).
    pub fn synthesize<T: SpectralTransform>(
        &mut self,
        transform: &mut T,
        map: &BarkMap,
        gains_db: &[f64; GAIN_BANDS],
        eq_db: &[f64; CELL_TABLE_LEN],
    ) -> &[Cell] {
        let n = transform.size();
        let q = n / 4;

        transform.set_dc(&mut self.gain_spectrum, ampl20(gains_db[0] + eq_db[0]));
        for k in 1..AUDIBLE_CELLS.min(n / 2) {
            let g = ampl20(map.bands_at_cell(gains_db, k) + eq_db[k]);
            transform.set_cell(&mut self.gain_spectrum, k, Cell::new(g, 0.0));
        }
        for k in AUDIBLE_CELLS..n / 2 {
            transform.set_cell(&mut self.gain_spectrum, k, Cell::default());
        }
        transform.set_nyquist(&mut self.gain_spectrum, 0.0);

        transform.inverse(&self.gain_spectrum, &mut self.kernel);

        self.gated.fill(0.0);
        for i in 0..q {
            self.gated[i] = self.kernel[i] * self.gate[q + i];
            self.gated[3 * q + i] = self.kernel[3 * q + i] * self.gate[i];
        }

        transform.forward(&self.gated, &mut self.filter);
        &self.filter
    }
}
