//! Calibration & Unified EQ
//!
//! Resamples the static response curves onto the running transform grid and
//! folds them into the two tables the correction path reads:
//!
//! - **Amplitude table** (power-estimation path): inverse absolute threshold
//!   of hearing x pre-emphasis x headphone response. Weights cell powers before
//!   they are folded into Bark bands, so inaudible energy never drives a gain
//!   decision.
//! - **dB table** (filter-synthesis path): pre-emphasis minus post-EQ, added to
//!   every cell gain so the correction pre-compensates the monitoring chain.
//!
//! # Lifecycle
//! - Every constituent change marks the tables dirty.
//! - [`UnifiedEq::ensure`] rebuilds both tables completely and clears the flag.
//!   The engine calls it before each render, so readers never see a
//!   half-rebuilt table.
//!
//! Self-calibration lives here too: it measures the power a full-scale sine
//! reads through the analysis path, which becomes the 0 dBFS reference.

use crate::dsp::bark::{BarkMap, CELL_TABLE_LEN, NUM_BANDS};
use crate::dsp::spectral::{Cell, SpectralTransform};
use crate::dsp::tables::{
    ATH_DB, HYPERCORRECTION_DB, TABLE_FFT_SIZE, TABLE_LEN, TABLE_SAMPLE_RATE,
};
use crate::dsp::utils::{ampl10, db10, identity, interp, inv_ampl10};
use crate::presets::EqPreset;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::f64::consts::PI;

/// Normalisation frequency for curves that should read 0 dB at 1 kHz.
const NORMALIZE_HZ: f64 = 1000.0;

/// Cycles per block of the self-calibration sine.
const SELF_CAL_CYCLES: f64 = 32.0;

static FLAT_DB: [f64; TABLE_LEN] = [0.0; TABLE_LEN];

// =============================================================================
// EQ curve tables
// =============================================================================

/// A magnitude response sampled at `k * sample_rate / fft_size` Hz, from DC to
/// Nyquist (`fft_size / 2 + 1` entries, dB).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqTable {
    pub sample_rate: f64,
    pub fft_size: usize,
    pub db: Cow<'static, [f64]>,
}

impl EqTable {
    /// Wrap one of the built-in 48 kHz / 256-point curves. Never allocates.
    pub const fn builtin(db: &'static [f64; TABLE_LEN]) -> Self {
        Self {
            sample_rate: TABLE_SAMPLE_RATE,
            fft_size: TABLE_FFT_SIZE,
            db: Cow::Borrowed(db),
        }
    }

    pub const fn flat() -> Self {
        Self::builtin(&FLAT_DB)
    }

    /// Load and validate a custom curve from JSON.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let table: EqTable = serde_json::from_str(json).context("parsing EQ table")?;
        table.validate()?;
        Ok(table)
    }

    /// Reject tables the resampler cannot use.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.sample_rate.is_finite() && self.sample_rate > 0.0,
            "EQ table sample rate must be positive, got {}",
            self.sample_rate
        );
        ensure!(
            self.fft_size >= 2 && self.fft_size.is_power_of_two(),
            "EQ table FFT size must be a power of two, got {}",
            self.fft_size
        );
        ensure!(
            self.db.len() == self.fft_size / 2 + 1,
            "EQ table for a {}-point transform needs {} entries, got {}",
            self.fft_size,
            self.fft_size / 2 + 1,
            self.db.len()
        );
        ensure!(
            self.db.iter().all(|v| v.is_finite()),
            "EQ table contains non-finite values"
        );
        Ok(())
    }

    /// Linearly interpolated response at `hz`, holding the end values outside
    /// the sampled range.
    pub fn db_at(&self, hz: f64) -> f64 {
        let last = self.db.len() - 1;
        let pos = hz * self.fft_size as f64 / self.sample_rate;
        if pos <= 0.0 {
            return self.db[0];
        }
        let ix = pos.floor() as usize;
        if ix >= last {
            return self.db[last];
        }
        interp(&self.db, ix, pos - ix as f64)
    }

    /// Resample onto the cell centres of a `block_size` transform at
    /// `sample_rate`, mapping each dB value through `map`.
    ///
    /// With `normalize`, the curve is shifted to read 0 dB at 1 kHz first.
    pub fn resample_into(
        &self,
        sample_rate: f64,
        block_size: usize,
        map: fn(f64) -> f64,
        normalize: bool,
        out: &mut [f64; CELL_TABLE_LEN],
    ) {
        let offset = if normalize {
            self.db_at(NORMALIZE_HZ)
        } else {
            0.0
        };
        let cell_hz = sample_rate / block_size as f64;
        for (k, o) in out.iter_mut().enumerate() {
            *o = map(self.db_at(k as f64 * cell_hz) - offset);
        }
    }
}

// =============================================================================
// Unified EQ
// =============================================================================

/// Which curve a slot uses: a built-in preset or its caller-supplied table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Preset(EqPreset),
    Custom,
}

/// A post-EQ or headphone slot. The custom table is kept while a preset is
/// selected, so switching presets from the audio thread never frees memory.
#[derive(Debug, Clone)]
struct CurveSlot {
    selection: Selection,
    custom: Option<EqTable>,
}

impl CurveSlot {
    fn new() -> Self {
        Self {
            selection: Selection::Preset(EqPreset::Flat),
            custom: None,
        }
    }

    /// Returns true if the selection changed.
    fn select_preset(&mut self, preset: EqPreset) -> bool {
        if self.selection == Selection::Preset(preset) {
            return false;
        }
        self.selection = Selection::Preset(preset);
        true
    }

    /// Returns true if the installed curve changed (or `force` is set).
    fn install(&mut self, table: EqTable, force: bool) -> bool {
        if !force && self.selection == Selection::Custom && self.custom.as_ref() == Some(&table) {
            return false;
        }
        self.custom = Some(table);
        self.selection = Selection::Custom;
        true
    }

    fn resample_into(
        &self,
        sample_rate: f64,
        block_size: usize,
        map: fn(f64) -> f64,
        out: &mut [f64; CELL_TABLE_LEN],
    ) {
        match (self.selection, &self.custom) {
            (Selection::Custom, Some(table)) => {
                table.resample_into(sample_rate, block_size, map, true, out)
            }
            (Selection::Preset(preset), _) => {
                preset
                    .table()
                    .resample_into(sample_rate, block_size, map, true, out)
            }
            (Selection::Custom, None) => {
                EqTable::flat().resample_into(sample_rate, block_size, map, true, out)
            }
        }
    }
}

pub struct UnifiedEq {
    sample_rate: f64,
    block_size: usize,

    pre: EqTable,
    post: CurveSlot,
    headphone: CurveSlot,

    inv_ath: [f64; CELL_TABLE_LEN],
    pre_db: [f64; CELL_TABLE_LEN],
    pre_ampl: [f64; CELL_TABLE_LEN],
    post_db: [f64; CELL_TABLE_LEN],
    headphone_ampl: [f64; CELL_TABLE_LEN],

    ampl: [f64; CELL_TABLE_LEN],
    db: [f64; CELL_TABLE_LEN],
    dirty: bool,
}

impl UnifiedEq {
    pub fn new(sample_rate: f64, block_size: usize, hypercorrection: bool) -> Self {
        let pre = if hypercorrection {
            EqTable::builtin(&HYPERCORRECTION_DB)
        } else {
            EqTable::flat()
        };
        let mut eq = Self {
            sample_rate,
            block_size,
            pre,
            post: CurveSlot::new(),
            headphone: CurveSlot::new(),
            inv_ath: [1.0; CELL_TABLE_LEN],
            pre_db: [0.0; CELL_TABLE_LEN],
            pre_ampl: [1.0; CELL_TABLE_LEN],
            post_db: [0.0; CELL_TABLE_LEN],
            headphone_ampl: [1.0; CELL_TABLE_LEN],
            ampl: [1.0; CELL_TABLE_LEN],
            db: [0.0; CELL_TABLE_LEN],
            dirty: true,
        };
        eq.resample_all();
        eq.ensure();
        eq
    }

    /// Re-derive every constituent for a new transform grid.
    pub fn set_sample_rate(&mut self, sample_rate: f64, block_size: usize) {
        self.sample_rate = sample_rate;
        self.block_size = block_size;
        self.resample_all();
    }

    /// Select a built-in post-EQ. No-op if already selected.
    pub fn set_post_eq_preset(&mut self, preset: EqPreset) {
        if self.post.select_preset(preset) {
            self.resample_post();
        }
    }

    /// Install a custom post-EQ. Skipped when the same table is already
    /// installed, unless `force` is set.
    pub fn set_post_eq(&mut self, table: EqTable, force: bool) {
        if self.post.install(table, force) {
            self.resample_post();
        }
    }

    /// Select a built-in headphone curve. No-op if already selected.
    pub fn set_headphone_preset(&mut self, preset: EqPreset) {
        if self.headphone.select_preset(preset) {
            self.resample_headphone();
        }
    }

    /// Install a custom headphone curve. Skipped when the same table is
    /// already installed, unless `force` is set.
    pub fn set_headphone(&mut self, table: EqTable, force: bool) {
        if self.headphone.install(table, force) {
            self.resample_headphone();
        }
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the unified tables if any constituent changed.
    ///
    /// Returns true when a rebuild happened.
    pub fn ensure(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        for k in 0..CELL_TABLE_LEN {
            self.ampl[k] = self.inv_ath[k] * self.pre_ampl[k] * self.headphone_ampl[k];
            self.db[k] = self.pre_db[k] - self.post_db[k];
        }
        self.dirty = false;
        true
    }

    /// Per-cell power weighting.
    #[inline]
    pub fn ampl(&self) -> &[f64; CELL_TABLE_LEN] {
        debug_assert!(!self.dirty, "unified EQ read while stale");
        &self.ampl
    }

    /// Per-cell gain offset (dB).
    #[inline]
    pub fn db(&self) -> &[f64; CELL_TABLE_LEN] {
        debug_assert!(!self.dirty, "unified EQ read while stale");
        &self.db
    }

    fn resample_all(&mut self) {
        EqTable::builtin(&ATH_DB).resample_into(
            self.sample_rate,
            self.block_size,
            inv_ampl10,
            true,
            &mut self.inv_ath,
        );
        self.resample_pre();
        self.resample_post();
        self.resample_headphone();
    }

    fn resample_pre(&mut self) {
        let (sr, blk) = (self.sample_rate, self.block_size);
        self.pre
            .resample_into(sr, blk, identity, false, &mut self.pre_db);
        self.pre
            .resample_into(sr, blk, ampl10, false, &mut self.pre_ampl);
        self.dirty = true;
    }

    fn resample_post(&mut self) {
        self.post
            .resample_into(self.sample_rate, self.block_size, identity, &mut self.post_db);
        self.dirty = true;
    }

    fn resample_headphone(&mut self) {
        self.headphone.resample_into(
            self.sample_rate,
            self.block_size,
            ampl10,
            &mut self.headphone_ampl,
        );
        self.dirty = true;
    }
}

// =============================================================================
// Self-calibration
// =============================================================================

/// dB offset that maps measured powers onto a 0 dBFS reference.
///
/// Runs a full-scale sine at an exact subharmonic of the block through the
/// same window, transform and band folding as live audio, with unity EQ.
/// A full-scale sine then reads -3 dB (its mean power) after subtracting the
/// offset.
pub fn self_calibrate<T: SpectralTransform>(
    transform: &mut T,
    window: &[f64],
    map: &BarkMap,
) -> f64 {
    let n = transform.size();
    let probe: Vec<f64> = (0..n)
        .map(|i| (2.0 * PI * SELF_CAL_CYCLES * i as f64 / n as f64).sin() * window[i])
        .collect();
    let mut spectrum = vec![Cell::default(); transform.spectrum_len()];
    transform.forward(&probe, &mut spectrum);

    let unity = [1.0; CELL_TABLE_LEN];
    let mut cumulative = [0.0; CELL_TABLE_LEN];
    let mut bands = [0.0; NUM_BANDS];
    let total = map.band_powers(&spectrum, &unity, &mut cumulative, &mut bands);

    db10(2.0 * total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::bark::AUDIBLE_CELLS;
    use crate::dsp::spectral::RustFftTransform;
    use crate::dsp::tables::{ALLEN_HEATH_DB, BEHRINGER_DB};
    use crate::dsp::utils::make_hann_window;

    #[test]
    fn test_builtin_tables_validate() {
        for preset in EqPreset::ALL {
            preset.table().validate().unwrap();
        }
        EqTable::builtin(&ATH_DB).validate().unwrap();
        EqTable::builtin(&HYPERCORRECTION_DB).validate().unwrap();
    }

    #[test]
    fn test_wrong_length_rejected() {
        let t = EqTable {
            sample_rate: 48_000.0,
            fft_size: 256,
            db: Cow::Owned(vec![0.0; 128]),
        };
        assert!(t.validate().is_err());

        let json = r#"{"sample_rate": 48000.0, "fft_size": 8, "db": [0, 1, 2, 3, 4]}"#;
        let t = EqTable::from_json(json).unwrap();
        assert_eq!(t.db.len(), 5);
        assert!(EqTable::from_json(r#"{"sample_rate": 48000.0, "fft_size": 8, "db": [0]}"#).is_err());
        assert!(EqTable::from_json("not json").is_err());
    }

    #[test]
    fn test_resample_on_native_grid_is_exact() {
        let t = EqTable::builtin(&BEHRINGER_DB);
        let mut out = [0.0; CELL_TABLE_LEN];
        t.resample_into(48_000.0, 256, identity, false, &mut out);
        for k in 0..CELL_TABLE_LEN {
            assert!((out[k] - BEHRINGER_DB[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_normalized_curve_reads_zero_at_1k() {
        let t = EqTable::builtin(&ALLEN_HEATH_DB);
        assert!(t.db_at(NORMALIZE_HZ).abs() > 0.5);
        // 125 Hz cells at 32 kHz / 256 put cell 8 on 1 kHz
        let mut out = [0.0; CELL_TABLE_LEN];
        t.resample_into(32_000.0, 256, identity, true, &mut out);
        assert!(out[8].abs() < 1e-12);
    }

    #[test]
    fn test_db_at_holds_ends() {
        let t = EqTable::builtin(&BEHRINGER_DB);
        assert_eq!(t.db_at(-10.0), BEHRINGER_DB[0]);
        assert_eq!(t.db_at(96_000.0), BEHRINGER_DB[TABLE_LEN - 1]);
    }

    #[test]
    fn test_dirty_flag_lifecycle() {
        let mut eq = UnifiedEq::new(48_000.0, 256, false);
        assert!(!eq.is_dirty());

        eq.set_post_eq_preset(EqPreset::Flat);
        assert!(!eq.is_dirty());

        eq.set_post_eq_preset(EqPreset::Behringer);
        assert!(eq.is_dirty());
        assert!(eq.ensure());
        assert!(!eq.ensure());

        // same custom table twice: only the first (or a forced) install counts
        let custom = EqTable::builtin(&ALLEN_HEATH_DB);
        eq.set_headphone(custom.clone(), false);
        assert!(eq.ensure());
        eq.set_headphone(custom.clone(), false);
        assert!(!eq.ensure());
        eq.set_headphone(custom, true);
        assert!(eq.ensure());
    }

    #[test]
    fn test_unified_tables() {
        let mut eq = UnifiedEq::new(48_000.0, 256, false);
        // flat pre/post: dB path is neutral
        assert!(eq.db().iter().all(|v| v.abs() < 1e-12));
        // DC is weighted out, the 3.3 kHz ear resonance is weighted up
        assert!(eq.ampl()[0] < 1e-6);
        assert!(eq.ampl()[18] > 5.0);

        eq.set_post_eq_preset(EqPreset::Massenburg);
        eq.ensure();
        let mut post = [0.0; CELL_TABLE_LEN];
        EqPreset::Massenburg
            .table()
            .resample_into(48_000.0, 256, identity, true, &mut post);
        for k in 0..AUDIBLE_CELLS {
            assert!((eq.db()[k] + post[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_hypercorrection_pre_emphasis() {
        let flat = UnifiedEq::new(48_000.0, 256, false);
        let hyper = UnifiedEq::new(48_000.0, 256, true);
        // native grid, no normalisation: the dB path is the curve itself
        for k in 0..AUDIBLE_CELLS {
            assert!((hyper.db()[k] - HYPERCORRECTION_DB[k]).abs() < 1e-12);
            let expected = flat.ampl()[k] * ampl10(HYPERCORRECTION_DB[k]);
            assert!((hyper.ampl()[k] - expected).abs() <= 1e-9 * expected.abs());
        }
        assert!((hyper.db()[8] + 1.955).abs() < 1e-12);
        assert!((hyper.db()[43] - 2.703).abs() < 1e-12);
        assert!(hyper.ampl()[8] < flat.ampl()[8]);
    }

    #[test]
    fn test_self_calibration_reference() {
        let n = 256;
        let mut t = RustFftTransform::plan(n);
        let w = make_hann_window(n);
        let map = BarkMap::new(48_000.0, n);

        let a = self_calibrate(&mut t, &w, &map);
        let b = self_calibrate(&mut t, &w, &map);
        assert!((a - b).abs() < 1e-9);
        // Hann-windowed full-scale sine: 0.25² + 2·0.125² = 0.09375
        assert!((a - db10(0.1875)).abs() < 1e-9);
    }
}
