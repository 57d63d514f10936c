use anyhow::{ensure, Context};
use nih_plug::prelude::Enum;
use serde::{Deserialize, Serialize};

use crate::dsp::calibration::EqTable;
use crate::dsp::fitting::FitTable;
use crate::dsp::tables::{ALLEN_HEATH_DB, BEHRINGER_DB, MASSENBURG_DB};

// =============================================================================
// EQ CURVES
// =============================================================================

/// Built-in monitor / headphone response curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum, Default)]
#[repr(usize)]
pub enum EqPreset {
    #[default]
    #[serde(rename = "Flat")]
    #[name = "Flat"]
    Flat,
    #[serde(rename = "Behringer UB802")]
    #[name = "Behringer UB802"]
    Behringer,
    #[serde(rename = "Allen & Heath")]
    #[name = "Allen & Heath"]
    AllenHeath,
    #[serde(rename = "Massenburg")]
    #[name = "Massenburg"]
    Massenburg,
}

impl EqPreset {
    pub const ALL: [EqPreset; 4] = [
        EqPreset::Flat,
        EqPreset::Behringer,
        EqPreset::AllenHeath,
        EqPreset::Massenburg,
    ];

    /// Integer selector. Out-of-range values select the last curve.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn table(self) -> EqTable {
        match self {
            EqPreset::Flat => EqTable::flat(),
            EqPreset::Behringer => EqTable::builtin(&BEHRINGER_DB),
            EqPreset::AllenHeath => EqTable::builtin(&ALLEN_HEATH_DB),
            EqPreset::Massenburg => EqTable::builtin(&MASSENBURG_DB),
        }
    }
}

// =============================================================================
// ENGINE CONFIGURATION
// =============================================================================

/// Fixed tuning of the correction dynamics. Set once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hearing level below which the foldback curve applies (dB).
    pub foldback_db: f64,
    /// Correction ceiling (dB).
    pub max_gain_db: f64,
    /// Hearing level at or below which a band is left uncorrected (dB).
    pub audible_floor_db: f64,
    /// Crest-compensated rise that counts as a transient (dB).
    pub attack_threshold_db: f64,
    /// Gain drop beyond which the gain snaps down instead of gliding (dB).
    pub gain_snap_db: f64,
    /// Distance from the mean at which release turns slow (dB).
    pub release_mean_margin_db: f64,
    pub hold_ms: f64,
    pub release_slow_ms: f64,
    pub release_fast_ms: f64,
    pub level_ms: f64,
    pub gain_release_ms: f64,
    /// Use the hyper-correction pre-emphasis curve instead of a flat one.
    pub hypercorrection: bool,
    /// Custom fit family. `None` uses the built-in one.
    pub fits: Option<FitTable>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            foldback_db: 20.0,
            max_gain_db: 50.0,
            audible_floor_db: 30.0,
            attack_threshold_db: 6.0,
            gain_snap_db: 6.0,
            release_mean_margin_db: 3.0,
            hold_ms: 10.0,
            release_slow_ms: 200.0,
            release_fast_ms: 50.0,
            level_ms: 300.0,
            gain_release_ms: 10.0,
            hypercorrection: false,
            fits: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).context("parsing engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, ms) in [
            ("hold_ms", self.hold_ms),
            ("release_slow_ms", self.release_slow_ms),
            ("release_fast_ms", self.release_fast_ms),
            ("level_ms", self.level_ms),
            ("gain_release_ms", self.gain_release_ms),
        ] {
            ensure!(ms.is_finite() && ms > 0.0, "{name} must be positive, got {ms}");
        }
        ensure!(
            self.max_gain_db.is_finite() && self.max_gain_db > 0.0,
            "max_gain_db must be positive, got {}",
            self.max_gain_db
        );
        ensure!(
            self.foldback_db.is_finite() && self.foldback_db > 0.0,
            "foldback_db must be positive, got {}",
            self.foldback_db
        );
        for (name, db) in [
            ("audible_floor_db", self.audible_floor_db),
            ("attack_threshold_db", self.attack_threshold_db),
            ("gain_snap_db", self.gain_snap_db),
            ("release_mean_margin_db", self.release_mean_margin_db),
        ] {
            ensure!(db.is_finite(), "{name} must be finite");
        }
        if let Some(fits) = &self.fits {
            fits.validate().context("custom fit table")?;
        }
        Ok(())
    }

    pub fn fit_table(&self) -> FitTable {
        self.fits.clone().unwrap_or_default()
    }
}

// =============================================================================
// RENDER PARAMETERS
// =============================================================================

/// Per-render parameter block. Passing one to a render applies it before
/// any audio is processed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    /// Digital level of the calibration tone (dBFS).
    pub cal_dbfs: f64,
    /// Acoustic level the calibration tone plays at (dB SPL).
    pub cal_dbspl: f64,
    /// Threshold elevation at 4 kHz (dB).
    pub vtuning_db: f64,
    pub processing: bool,
    pub volume_db: f64,
    pub attenuation_db: f64,
    /// Post-EQ selector. Out-of-range values select the last curve.
    pub post_eq: usize,
    /// Headphone selector. Out-of-range values select the last curve.
    pub headphone: usize,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            cal_dbfs: -17.0,
            cal_dbspl: 77.0,
            vtuning_db: 20.0,
            processing: true,
            volume_db: 0.0,
            attenuation_db: 0.0,
            post_eq: 0,
            headphone: 0,
        }
    }
}

// =============================================================================
// LISTENER PROFILES
// =============================================================================

/// Starting points for common degrees of high-frequency hearing loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum, Default)]
#[repr(usize)]
pub enum ListenerProfile {
    #[default]
    #[serde(rename = "Manual")]
    #[name = "Manual"]
    Manual,
    #[serde(rename = "Mild")]
    #[name = "Mild"]
    Mild,
    #[serde(rename = "Moderate")]
    #[name = "Moderate"]
    Moderate,
    #[serde(rename = "Severe")]
    #[name = "Severe"]
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileValues {
    pub vtuning_db: f64,
    pub attenuation_db: f64,
}

impl ListenerProfile {
    pub fn description(&self) -> &'static str {
        match self {
            ListenerProfile::Manual => "Custom settings - no profile applied",
            ListenerProfile::Mild => "Around 20 dB threshold elevation at 4 kHz",
            ListenerProfile::Moderate => "Around 40 dB threshold elevation at 4 kHz",
            ListenerProfile::Severe => "Around 60 dB threshold elevation at 4 kHz",
        }
    }

    /// Tuning and headroom for the profile. `None` for manual control.
    pub fn get_values(&self) -> Option<ProfileValues> {
        match self {
            ListenerProfile::Manual => None,
            ListenerProfile::Mild => Some(ProfileValues {
                vtuning_db: 20.0,
                attenuation_db: 0.0,
            }),
            ListenerProfile::Moderate => Some(ProfileValues {
                vtuning_db: 40.0,
                attenuation_db: -6.0,
            }),
            // more correction, more headroom
            ListenerProfile::Severe => Some(ProfileValues {
                vtuning_db: 60.0,
                attenuation_db: -12.0,
            }),
        }
    }

    /// Apply the profile on top of `params`.
    pub fn apply(&self, params: &mut RenderParams) {
        if let Some(v) = self.get_values() {
            params.vtuning_db = v.vtuning_db;
            params.attenuation_db = v.attenuation_db;
        }
    }
}
