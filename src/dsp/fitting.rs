//! Rational Fit Family & Tuning Profile
//!
//! Correction gain as a function of band level is a family of rational (2,2)
//! curves, one per 5 dB step of threshold elevation. A band's tuning value
//! picks two neighbouring curves and a blend fraction.
//!
//! # Design Notes
//! - The fit table is immutable and shared; bands hold indices, not pointers.
//! - Every curve is evaluated on a range-reduced axis: level relative to
//!   100 dB, clamped to the curve's floor, mapped onto [-1, 1].

use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};

use crate::dsp::bark::GAIN_BANDS;

/// Threshold-elevation spacing between neighbouring fits (dB).
pub const FIT_STEP_DB: f64 = 5.0;
/// Tuning range covered by the fit family (dB).
pub const MAX_TUNING_DB: f64 = 80.0;
/// Minimum fits needed to cover the tuning range plus the blend neighbour.
pub const MIN_FITS: usize = (MAX_TUNING_DB / FIT_STEP_DB) as usize + 2;

/// Level the fit domain is anchored to (dB).
const FIT_REFERENCE_DB: f64 = 100.0;

/// Tuning slope per quarter-Bark band (dB).
const TUNING_SLOPE: f64 = 3.575 / 4.0;
/// Bands below this are flat.
const TUNING_START_BAND: usize = 10;
/// Bands above this are flat.
const TUNING_STOP_BAND: usize = 80;
/// Band the single tuning value is anchored to (~4 kHz).
const TUNING_ANCHOR_BAND: f64 = 70.0;

/// `g(x) = (p0 + p1·x + p2·x²) / (1 + q1·x + q2·x²)` over a reduced level axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RationalFit {
    /// Lowest level (relative to 100 dB) the fit is defined for. Negative.
    pub floor_db: f64,
    pub p0: f64,
    pub p1: f64,
    pub p2: f64,
    pub q1: f64,
    pub q2: f64,
}

impl RationalFit {
    const fn new(floor_db: f64, p: [f64; 3], q: [f64; 2]) -> Self {
        Self {
            floor_db,
            p0: p[0],
            p1: p[1],
            p2: p[2],
            q1: q[0],
            q2: q[1],
        }
    }

    /// Gain (dB) at band level `db`.
    #[inline]
    pub fn eval(&self, db: f64) -> f64 {
        let rel = (db - FIT_REFERENCE_DB).max(self.floor_db).min(0.0);
        let x = 1.0 - 2.0 * rel / self.floor_db;
        ((self.p2 * x + self.p1) * x + self.p0) / ((self.q2 * x + self.q1) * x + 1.0)
    }

    fn is_valid(&self) -> bool {
        self.floor_db < 0.0
            && [self.p0, self.p1, self.p2, self.q1, self.q2]
                .iter()
                .all(|v| v.is_finite())
    }
}

const BUILTIN_FITS: [RationalFit; 20] = [
    RationalFit::new(-80.0, [0.0, 0.0, 0.0], [0.0, 0.0]),
    RationalFit::new(
        -80.0,
        [0.012153932845, -0.027972072658, 0.020234172436],
        [1.106218356485, 0.395151170592],
    ),
    RationalFit::new(
        -80.0,
        [0.050195789141, -0.111617678367, 0.078211292363],
        [1.136573472741, 0.420641059795],
    ),
    RationalFit::new(
        -80.0,
        [0.161335644299, -0.333041916426, 0.218357161984],
        [1.181995855308, 0.460606334581],
    ),
    RationalFit::new(
        -80.0,
        [0.395090449522, -0.767315342693, 0.470643549457],
        [1.189576745240, 0.476954296066],
    ),
    RationalFit::new(
        -80.0,
        [0.729531631616, -1.393947278250, 0.833516862035],
        [1.146557413417, 0.461619378482],
    ),
    RationalFit::new(
        -80.0,
        [1.168306433997, -2.234778748792, 1.326413323836],
        [1.078196616528, 0.434322803072],
    ),
    RationalFit::new(
        -80.0,
        [1.756814693160, -3.373932478990, 1.993065280096],
        [0.992069976176, 0.402011673342],
    ),
    RationalFit::new(
        -80.0,
        [2.555796160098, -4.919994039434, 2.886270086186],
        [0.887762017845, 0.365618234421],
    ),
    RationalFit::new(
        -80.0,
        [3.634032175130, -6.987899941065, 4.054920582166],
        [0.764540813057, 0.325257725544],
    ),
    RationalFit::new(
        -80.0,
        [5.061765619606, -9.677313941142, 5.527783196897],
        [0.624093143413, 0.281860954703],
    ),
    RationalFit::new(
        -80.0,
        [6.900453426629, -13.051866897679, 7.304307850380],
        [0.470569813788, 0.237132455000],
    ),
    RationalFit::new(
        -80.0,
        [9.192293573511, -17.102019260069, 9.326713532491],
        [0.311587671121, 0.193715803621],
    ),
    RationalFit::new(
        -80.0,
        [11.949868915007, -21.770617692341, 11.525134322195],
        [0.153794964781, 0.153476845029],
    ),
    RationalFit::new(
        -80.0,
        [15.155610254241, -26.928113554838, 13.789208033938],
        [0.004699965880, 0.118201401328],
    ),
    RationalFit::new(
        -80.0,
        [18.765714945524, -32.411640615103, 16.007719527784],
        [-0.130068664218, 0.088779516867],
    ),
    RationalFit::new(
        -80.0,
        [22.719979993526, -38.048453196509, 18.081404185623],
        [-0.246995723140, 0.065333859211],
    ),
    RationalFit::new(
        -80.0,
        [26.952568848659, -43.680698577395, 19.935687509170],
        [-0.344735165018, 0.047387263449],
    ),
    RationalFit::new(
        -80.0,
        [31.400741776793, -49.181772902765, 21.526279829902],
        [-0.423735506702, 0.034112523180],
    ),
    RationalFit::new(-80.0, [0.0, 0.0, 0.0], [0.0, 0.0]),
];

/// The fit family, ordered by threshold elevation in [`FIT_STEP_DB`] steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FitTable {
    fits: Vec<RationalFit>,
}

impl Default for FitTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FitTable {
    pub fn builtin() -> Self {
        Self {
            fits: BUILTIN_FITS.to_vec(),
        }
    }

    /// Validate and wrap a custom fit family.
    pub fn new(fits: Vec<RationalFit>) -> anyhow::Result<Self> {
        let table = Self { fits };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.fits.len() >= MIN_FITS,
            "fit table needs at least {} entries to cover 0-{} dB tuning, got {}",
            MIN_FITS,
            MAX_TUNING_DB,
            self.fits.len()
        );
        if let Some(i) = self.fits.iter().position(|f| !f.is_valid()) {
            bail!("fit {i} has a non-negative floor or non-finite coefficients");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    /// Blended gain at `db` for a band tuned to `tuning`.
    #[inline]
    pub fn gain(&self, db: f64, tuning: &BandTuning) -> f64 {
        let a = self.fits[tuning.index].eval(db);
        if tuning.fraction == 0.0 {
            return a;
        }
        let b = self.fits[tuning.index + 1].eval(db);
        (1.0 - tuning.fraction) * a + tuning.fraction * b
    }
}

/// A band's position in the fit family.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandTuning {
    pub elevation_db: f64,
    pub index: usize,
    pub fraction: f64,
}

impl BandTuning {
    fn from_elevation(elevation_db: f64) -> Self {
        let steps = elevation_db / FIT_STEP_DB;
        let index = steps.floor() as usize;
        Self {
            elevation_db,
            index,
            fraction: steps - index as f64,
        }
    }
}

/// Per-band tuning derived from a single threshold elevation at 4 kHz.
#[derive(Debug, Clone)]
pub struct TuningProfile {
    vtuning_db: f64,
    bands: [BandTuning; GAIN_BANDS],
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl TuningProfile {
    pub fn new(vtuning_db: f64) -> Self {
        let mut profile = Self {
            vtuning_db: f64::NAN,
            bands: [BandTuning::default(); GAIN_BANDS],
        };
        profile.set_vtuning(vtuning_db);
        profile
    }

    /// Bands below ~250 Hz and above ~6 kHz take the value of the nearest
    /// sloped band; everything is clamped into the fit family's range.
    ///
    /// Returns false when the value was already set.
    pub fn set_vtuning(&mut self, vtuning_db: f64) -> bool {
        if vtuning_db == self.vtuning_db {
            return false;
        }
        self.vtuning_db = vtuning_db;
        for (b, tuning) in self.bands.iter_mut().enumerate() {
            let band = b.clamp(TUNING_START_BAND, TUNING_STOP_BAND) as f64;
            let v = (vtuning_db + TUNING_SLOPE * (band - TUNING_ANCHOR_BAND))
                .clamp(0.0, MAX_TUNING_DB);
            *tuning = BandTuning::from_elevation(if v.is_nan() { 0.0 } else { v });
        }
        true
    }

    #[inline]
    pub fn vtuning_db(&self) -> f64 {
        self.vtuning_db
    }

    #[inline]
    pub fn band(&self, band: usize) -> &BandTuning {
        &self.bands[band]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_is_valid() {
        let t = FitTable::builtin();
        t.validate().unwrap();
        assert_eq!(t.len(), 20);
        assert!(MIN_FITS <= t.len());
    }

    #[test]
    fn test_short_or_bad_tables_rejected() {
        assert!(FitTable::new(BUILTIN_FITS[..10].to_vec()).is_err());

        let mut fits = BUILTIN_FITS.to_vec();
        fits[3].floor_db = 10.0;
        assert!(FitTable::new(fits).is_err());

        let mut fits = BUILTIN_FITS.to_vec();
        fits[5].p1 = f64::NAN;
        assert!(FitTable::new(fits).is_err());
    }

    #[test]
    fn test_zero_elevation_gives_no_gain() {
        let t = FitTable::builtin();
        let tuning = BandTuning::from_elevation(0.0);
        for db in [30.0, 60.0, 100.0, 140.0] {
            assert_eq!(t.gain(db, &tuning), 0.0);
        }
    }

    #[test]
    fn test_domain_is_clamped() {
        let fit = BUILTIN_FITS[8];
        assert_eq!(fit.eval(0.0), fit.eval(20.0));
        assert_eq!(fit.eval(100.0), fit.eval(130.0));
    }

    /// Largest rise above the running minimum of `gains`.
    fn max_rise(gains: impl Iterator<Item = f64>) -> f64 {
        let mut min = f64::INFINITY;
        let mut rise = 0.0_f64;
        for g in gains {
            rise = rise.max(g - min);
            min = min.min(g);
        }
        rise
    }

    #[test]
    fn test_gain_never_rises_with_level() {
        let t = FitTable::builtin();
        for step in 0..=160 {
            let v = step as f64 * 0.5;
            let tuning = BandTuning::from_elevation(v);
            let rise = max_rise((0..=240).map(|k| t.gain(20.0 + k as f64 * 0.5, &tuning)));
            // the fits at 50-65 dB tuning lift by under 0.02 dB just below 100 dB
            assert!(rise <= 0.02, "v {v}: gain rose by {rise} dB");
        }
    }

    #[test]
    fn test_quiet_bands_get_more_gain_with_more_loss() {
        let t = FitTable::builtin();
        let g20 = t.gain(40.0, &BandTuning::from_elevation(20.0));
        let g40 = t.gain(40.0, &BandTuning::from_elevation(40.0));
        assert!(g20 > 1.0);
        assert!(g40 > g20);
    }

    #[test]
    fn test_tuning_profile_shape() {
        let mut p = TuningProfile::new(20.0);
        // anchored at band 70, flat outside 10..=80
        assert!((p.band(70).elevation_db - 20.0).abs() < 1e-12);
        assert_eq!(p.band(0), p.band(10));
        assert_eq!(p.band(100), p.band(80));
        assert!(p.band(80).elevation_db > p.band(70).elevation_db);
        assert_eq!(p.band(10).elevation_db, 0.0);

        let b = p.band(72);
        assert!(((b.index as f64 + b.fraction) * FIT_STEP_DB - b.elevation_db).abs() < 1e-9);

        assert!(!p.set_vtuning(20.0));
        assert!(p.set_vtuning(200.0));
        assert_eq!(p.band(40).elevation_db, MAX_TUNING_DB);
        assert_eq!(p.band(40).index, 16);
        assert_eq!(p.band(40).fraction, 0.0);
    }
}
