//! Bark Mapping Tables
//!
//! Sample-rate dependent interpolation tables between transform cells and
//! quarter-Bark bands, in both directions.
//!
//! # Layout
//! - 25 Bark units, 4 sub-bands each: 100 analysed bands.
//! - Band edges: 103 entries (100 bands plus guard edges) giving the
//!   fractional cell position of each quarter-Bark boundary. Used to sample a
//!   cumulative cell-power table at band edges.
//! - Cell bands: 129 entries giving the fractional band position of each of
//!   the audible transform cells. Used to spread band gains back onto cells.
//!
//! # Edge Policy
//! Positions are clamped into the valid range instead of extrapolated:
//! edges below DC sit on cell 0, edges above the audible range on the last
//! audible cell, and cells past the top band read the top band.

use crate::dsp::spectral::Cell;

/// Quarter-Bark sub-bands per Bark unit.
pub const SUBBANDS: usize = 4;
/// Bark units covered.
pub const BARK_UNITS: usize = 25;
/// Analysed quarter-Bark bands.
pub const NUM_BANDS: usize = SUBBANDS * BARK_UNITS;
/// Band gain entries (one past the last analysed band).
pub const GAIN_BANDS: usize = NUM_BANDS + 1;
/// Band-edge table length.
pub const BAND_EDGES: usize = NUM_BANDS + 3;
/// Transform cells that carry audible energy, independent of block size.
pub const AUDIBLE_CELLS: usize = 128;
/// Cell table length (audible cells plus the closing entry).
pub const CELL_TABLE_LEN: usize = AUDIBLE_CELLS + 1;

/// Highest fractional cell position a band edge may take.
const MAX_EDGE_CELL: f64 = AUDIBLE_CELLS as f64 - 0.01;

/// Critical band rate (Bark) of a frequency in kHz.
#[inline]
pub fn cbr(f_khz: f64) -> f64 {
    if f_khz <= 0.0 {
        return 0.0;
    }
    (26.81 / (1.0 + 1.960 / f_khz) - 0.53).max(0.0)
}

/// Frequency in kHz at critical band rate `z` (Bark).
#[inline]
pub fn inv_cbr(z: f64) -> f64 {
    1.960 / (26.81 / (z + 0.53) - 1.0)
}

/// Fractional quarter-Bark band position of a frequency in Hz.
#[inline]
pub fn band_position(hz: f64) -> f64 {
    SUBBANDS as f64 * cbr(hz * 1e-3)
}

#[derive(Debug, Clone)]
pub struct BarkMap {
    edge_ix: [usize; BAND_EDGES],
    edge_frac: [f64; BAND_EDGES],
    cell_ix: [usize; CELL_TABLE_LEN],
    cell_frac: [f64; CELL_TABLE_LEN],
}

impl BarkMap {
    pub fn new(sample_rate: f64, block_size: usize) -> Self {
        let mut map = Self {
            edge_ix: [0; BAND_EDGES],
            edge_frac: [0.0; BAND_EDGES],
            cell_ix: [0; CELL_TABLE_LEN],
            cell_frac: [0.0; CELL_TABLE_LEN],
        };
        let cells_per_khz = 1000.0 * block_size as f64 / sample_rate;

        for edge in 0..BAND_EDGES {
            let z = edge as f64 / SUBBANDS as f64;
            // cumulative tables are indexed by cell, so a boundary sits half a cell early
            let cell = (inv_cbr(z) * cells_per_khz - 0.5).clamp(0.0, MAX_EDGE_CELL);
            map.edge_ix[edge] = cell.floor() as usize;
            map.edge_frac[edge] = cell - cell.floor();
        }

        for cell in 0..CELL_TABLE_LEN {
            let band = SUBBANDS as f64 * cbr(cell as f64 / cells_per_khz);
            map.cell_ix[cell] = band.floor() as usize;
            map.cell_frac[cell] = band - band.floor();
        }

        map
    }

    /// Sample a per-cell table (len [`CELL_TABLE_LEN`]) at band edge `edge`.
    #[inline]
    pub fn cells_at_edge(&self, cells: &[f64], edge: usize) -> f64 {
        let ix = self.edge_ix[edge];
        let fx = self.edge_frac[edge];
        (1.0 - fx) * cells[ix] + fx * cells[ix + 1]
    }

    /// Sample a per-band table (len [`GAIN_BANDS`]) at transform cell `cell`.
    #[inline]
    pub fn bands_at_cell(&self, bands: &[f64], cell: usize) -> f64 {
        let ix = self.cell_ix[cell];
        if ix >= GAIN_BANDS - 1 {
            return bands[GAIN_BANDS - 1];
        }
        let fx = self.cell_frac[cell];
        (1.0 - fx) * bands[ix] + fx * bands[ix + 1]
    }

    /// Fold a half spectrum into quarter-Bark band powers.
    ///
    /// Cell powers are weighted by `eq_ampl` and accumulated into `cumulative`;
    /// band `b` is the accumulated power between edges `b - 1` and `b + 1`, so
    /// neighbouring bands overlap by half. Returns the total weighted power of
    /// the audible cells.
    pub fn band_powers(
        &self,
        spectrum: &[Cell],
        eq_ampl: &[f64],
        cumulative: &mut [f64; CELL_TABLE_LEN],
        bands: &mut [f64; NUM_BANDS],
    ) -> f64 {
        // DC is real and only counted once in a half spectrum
        let mut sum = 0.5 * spectrum[0].re * spectrum[0].re * eq_ampl[0];
        cumulative[0] = sum;
        for k in 1..AUDIBLE_CELLS {
            sum += spectrum[k].norm_sqr() * eq_ampl[k];
            cumulative[k] = sum;
        }
        cumulative[AUDIBLE_CELLS] = sum;

        let mut below = 0.0;
        let mut at = 0.0;
        for (b, band) in bands.iter_mut().enumerate() {
            let above = self.cells_at_edge(cumulative, b + 1);
            *band = above - below;
            below = at;
            at = above;
        }
        sum
    }

    /// Fractional cell position of a band edge.
    #[inline]
    pub fn edge_cell(&self, edge: usize) -> f64 {
        self.edge_ix[edge] as f64 + self.edge_frac[edge]
    }

    /// Fractional band position of a cell.
    #[inline]
    pub fn cell_band(&self, cell: usize) -> f64 {
        self.cell_ix[cell] as f64 + self.cell_frac[cell]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cbr_inverse() {
        for &f in &[0.1, 0.25, 1.0, 4.0, 10.0, 15.0] {
            assert!((inv_cbr(cbr(f)) - f).abs() < 1e-9);
        }
        assert_eq!(cbr(0.0), 0.0);
        assert!((band_position(1000.0) - 4.0 * cbr(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_edges_clamped_and_monotonic() {
        for &(sr, blk) in &[(44_100.0, 256), (48_000.0, 256), (96_000.0, 512)] {
            let map = BarkMap::new(sr, blk);
            let mut prev = 0.0;
            for e in 0..BAND_EDGES {
                let c = map.edge_cell(e);
                assert!(c >= 0.0 && c < AUDIBLE_CELLS as f64);
                assert!(c >= prev);
                prev = c;
            }
        }
    }

    #[test]
    fn test_band_round_trip() {
        // band edge -> cell -> band, away from the DC clamp
        for &(sr, blk) in &[(32_000.0, 256), (44_100.0, 256), (48_000.0, 256), (96_000.0, 512)] {
            let map = BarkMap::new(sr, blk);
            let mut checked = 0;
            for b in 10..GAIN_BANDS {
                let pos = map.edge_cell(b) + 0.5;
                let ix = pos.floor() as usize;
                if map.edge_cell(b) >= MAX_EDGE_CELL - 1e-9 || ix >= AUDIBLE_CELLS {
                    continue;
                }
                let fx = pos - ix as f64;
                let back = (1.0 - fx) * map.cell_band(ix) + fx * map.cell_band(ix + 1);
                assert!(
                    (back - b as f64).abs() < 0.5,
                    "sr {sr}: band {b} came back as {back}"
                );
                checked += 1;
            }
            assert!(checked > 50);
        }
    }

    #[test]
    fn test_bands_at_cell_clamps_top() {
        let map = BarkMap::new(192_000.0, 512);
        let mut bands = [0.0; GAIN_BANDS];
        bands[GAIN_BANDS - 1] = 7.0;
        // top audible cell is ~47.6 kHz, past the last band
        assert_eq!(map.bands_at_cell(&bands, AUDIBLE_CELLS - 1), 7.0);
    }

    #[test]
    fn test_band_powers_localise_a_single_cell() {
        let map = BarkMap::new(48_000.0, 256);
        let mut spectrum = vec![Cell::new(0.0, 0.0); 129];
        spectrum[40] = Cell::new(0.0, 2.0);
        let eq = [0.5; CELL_TABLE_LEN];
        let mut cumulative = [0.0; CELL_TABLE_LEN];
        let mut bands = [0.0; NUM_BANDS];

        let total = map.band_powers(&spectrum, &eq, &mut cumulative, &mut bands);
        assert!((total - 2.0).abs() < 1e-12);

        // cell 40 is 7.5 kHz; the band centred there sees all of it
        let centre = band_position(7_500.0).round() as usize;
        assert!((bands[centre] - 2.0).abs() < 0.5);
        assert!(bands[10] < 1e-12);
        assert!(bands.iter().all(|&p| p >= -1e-12));
    }

    #[test]
    fn test_cells_at_edge_interpolates() {
        let map = BarkMap::new(48_000.0, 256);
        let ramp: Vec<f64> = (0..CELL_TABLE_LEN).map(|k| k as f64).collect();
        for e in 0..BAND_EDGES {
            assert!((map.cells_at_edge(&ramp, e) - map.edge_cell(e)).abs() < 1e-9);
        }
    }
}
