//! Stereo Orchestrator
//!
//! Owns the two channel states and everything they share: Bark tables,
//! unified EQ, fit family, tuning profile, dynamics and the transform
//! workspace. Parameter changes land here; each render hands the channels a
//! read-only [`BlockContext`] built from this state.
//!
//! # Real-time contract
//! - [`HearingEngine::set_sample_rate`] and the custom-table setters allocate
//!   and must not overlap a render.
//! - [`HearingEngine::render`] never allocates, never fails, and skips any
//!   channel whose buffers are absent.

use crate::dsp::bark::{BarkMap, GAIN_BANDS, NUM_BANDS};
use crate::dsp::calibration::{self_calibrate, EqTable, UnifiedEq};
use crate::dsp::channel::{BlockContext, ChannelIo, ChannelState, TransferMode, Workspace};
use crate::dsp::dither::{self, DITHER_TABLE_LEN};
use crate::dsp::fitting::{FitTable, TuningProfile};
use crate::dsp::gain::{Dynamics, GainContext};
use crate::dsp::spectral::{RustFftTransform, SpectralTransform};
use crate::dsp::utils::make_hann_window;
use crate::presets::{EngineConfig, EqPreset, RenderParams};

/// Above this rate the block doubles to keep the frequency resolution.
const HIGH_RATE_THRESHOLD: f64 = 50_000.0;
const BLOCK_SIZE: usize = 256;
const HIGH_RATE_BLOCK_SIZE: usize = 512;

/// Block size for `sample_rate`.
pub fn block_size_for(sample_rate: f64) -> usize {
    if sample_rate > HIGH_RATE_THRESHOLD {
        HIGH_RATE_BLOCK_SIZE
    } else {
        BLOCK_SIZE
    }
}

pub struct HearingEngine<T: SpectralTransform = RustFftTransform> {
    config: EngineConfig,
    sample_rate: f64,
    block_size: usize,

    map: BarkMap,
    window: Vec<f64>,
    eq: UnifiedEq,
    dynamics: Dynamics,
    fits: FitTable,
    tuning: TuningProfile,
    self_cal_db: f64,
    params: RenderParams,

    workspace: Workspace<T>,
    channels: [ChannelState; 2],
}

impl HearingEngine<RustFftTransform> {
    /// Engine with the default configuration.
    pub fn new(sample_rate: f64) -> Self {
        Self::build(EngineConfig::default(), sample_rate)
    }
}

impl<T: SpectralTransform> HearingEngine<T> {
    /// Engine with a custom configuration, validated up front.
    pub fn with_config(config: EngineConfig, sample_rate: f64) -> anyhow::Result<Self> {
        config.validate()?;
        anyhow::ensure!(
            sample_rate.is_finite() && sample_rate > 0.0,
            "sample rate must be positive, got {sample_rate}"
        );
        Ok(Self::build(config, sample_rate))
    }

    fn build(config: EngineConfig, sample_rate: f64) -> Self {
        dither::warm_up();
        let block_size = block_size_for(sample_rate);
        let params = RenderParams::default();
        let mut engine = Self {
            fits: config.fit_table(),
            tuning: TuningProfile::new(params.vtuning_db),
            eq: UnifiedEq::new(sample_rate, block_size, config.hypercorrection),
            dynamics: Dynamics::new(&config, sample_rate, block_size / 2),
            map: BarkMap::new(sample_rate, block_size),
            window: make_hann_window(block_size),
            self_cal_db: 0.0,
            params,
            workspace: Workspace::new(block_size),
            channels: Self::make_channels(sample_rate, block_size),
            config,
            sample_rate,
            block_size,
        };
        engine.calibrate();
        engine
    }

    fn make_channels(sample_rate: f64, block_size: usize) -> [ChannelState; 2] {
        [
            ChannelState::new(sample_rate, block_size, 0),
            ChannelState::new(sample_rate, block_size, DITHER_TABLE_LEN / 2),
        ]
    }

    fn calibrate(&mut self) {
        self.self_cal_db = self_calibrate(&mut self.workspace.transform, &self.window, &self.map);
        log::debug!("self-calibration offset {:.3} dB", self.self_cal_db);
    }

    /// Rebuild every rate-dependent table and buffer. No-op if unchanged.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            log::warn!("ignoring invalid sample rate {sample_rate}");
            return;
        }
        if sample_rate == self.sample_rate {
            return;
        }
        let block_size = block_size_for(sample_rate);
        self.sample_rate = sample_rate;
        self.dynamics = Dynamics::new(&self.config, sample_rate, block_size / 2);
        self.map = BarkMap::new(sample_rate, block_size);
        self.eq.set_sample_rate(sample_rate, block_size);
        if block_size != self.block_size {
            self.block_size = block_size;
            self.window = make_hann_window(block_size);
            self.workspace = Workspace::new(block_size);
        }
        self.channels = Self::make_channels(sample_rate, block_size);
        self.calibrate();
        log::info!(
            "sample rate {} Hz: block {}, latency {} samples",
            sample_rate,
            block_size,
            self.latency_samples()
        );
    }

    /// Clear all streaming state, keeping configuration.
    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.reset();
        }
    }

    // -------------------------------------------------------------------------
    // Parameters
    // -------------------------------------------------------------------------

    /// Apply a full parameter block. Allocation-free.
    pub fn set_params(&mut self, params: &RenderParams) {
        self.set_calibration(params.cal_dbfs, params.cal_dbspl);
        self.set_vtuning(params.vtuning_db);
        self.set_processing(params.processing);
        self.set_volume_db(params.volume_db);
        self.set_attenuation_db(params.attenuation_db);
        self.set_post_eq_index(params.post_eq);
        self.set_headphone_index(params.headphone);
    }

    #[inline]
    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    /// Digital level and acoustic level of the calibration tone.
    pub fn set_calibration(&mut self, cal_dbfs: f64, cal_dbspl: f64) {
        self.params.cal_dbfs = cal_dbfs;
        self.params.cal_dbspl = cal_dbspl;
    }

    pub fn set_vtuning(&mut self, vtuning_db: f64) {
        self.params.vtuning_db = vtuning_db;
        self.tuning.set_vtuning(vtuning_db);
    }

    pub fn set_processing(&mut self, processing: bool) {
        self.params.processing = processing;
    }

    pub fn set_volume_db(&mut self, volume_db: f64) {
        self.params.volume_db = volume_db;
    }

    pub fn set_attenuation_db(&mut self, attenuation_db: f64) {
        self.params.attenuation_db = attenuation_db;
    }

    pub fn set_post_eq_index(&mut self, index: usize) {
        let preset = EqPreset::from_index(index);
        self.params.post_eq = preset.index();
        self.eq.set_post_eq_preset(preset);
    }

    pub fn set_headphone_index(&mut self, index: usize) {
        let preset = EqPreset::from_index(index);
        self.params.headphone = preset.index();
        self.eq.set_headphone_preset(preset);
    }

    /// Install a custom post-EQ curve. Rejected tables leave the current
    /// curve in place.
    pub fn set_post_eq(&mut self, table: EqTable, force: bool) -> anyhow::Result<()> {
        if let Err(e) = table.validate() {
            log::warn!("rejected post-EQ table: {e:#}");
            return Err(e);
        }
        self.eq.set_post_eq(table, force);
        log::debug!("custom post-EQ installed");
        Ok(())
    }

    /// Install a custom headphone curve. Rejected tables leave the current
    /// curve in place.
    pub fn set_headphone(&mut self, table: EqTable, force: bool) -> anyhow::Result<()> {
        if let Err(e) = table.validate() {
            log::warn!("rejected headphone table: {e:#}");
            return Err(e);
        }
        self.eq.set_headphone(table, force);
        log::debug!("custom headphone curve installed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Process separate input and output buffers. A channel runs only when
    /// both its input and output are present.
    pub fn render(
        &mut self,
        inputs: [Option<&[f32]>; 2],
        outputs: [Option<&mut [f32]>; 2],
        mode: TransferMode,
        params: Option<&RenderParams>,
    ) {
        let [in_l, in_r] = inputs;
        let [out_l, out_r] = outputs;
        self.render_io([split_io(in_l, out_l), split_io(in_r, out_r)], mode, params);
    }

    /// Process buffers in place. Absent channels are skipped.
    pub fn render_in_place(
        &mut self,
        buffers: [Option<&mut [f32]>; 2],
        mode: TransferMode,
        params: Option<&RenderParams>,
    ) {
        let [l, r] = buffers;
        self.render_io([l.map(ChannelIo::InPlace), r.map(ChannelIo::InPlace)], mode, params);
    }

    fn render_io(
        &mut self,
        ios: [Option<ChannelIo>; 2],
        mode: TransferMode,
        params: Option<&RenderParams>,
    ) {
        if let Some(p) = params {
            self.set_params(p);
        }
        if ios.iter().all(|io| io.as_ref().map_or(true, |io| io.is_empty())) {
            return;
        }
        self.eq.ensure();

        let Self {
            map,
            window,
            eq,
            dynamics,
            fits,
            tuning,
            self_cal_db,
            params,
            workspace,
            channels,
            ..
        } = self;

        let ctx = BlockContext {
            map,
            window: window.as_slice(),
            eq_ampl: eq.ampl(),
            eq_db: eq.db(),
            gain: GainContext {
                dynamics,
                fits,
                tuning,
                self_cal_db: *self_cal_db,
                cal_dbfs: params.cal_dbfs,
                cal_dbspl: params.cal_dbspl,
                processing: params.processing,
                volume_db: params.volume_db,
                attenuation_db: params.attenuation_db,
            },
        };

        for (ch, io) in channels.iter_mut().zip(ios) {
            if let Some(io) = io {
                ch.render(io, mode, &ctx, workspace);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[inline]
    pub fn latency_samples(&self) -> usize {
        5 * (self.block_size / 4)
    }

    #[inline]
    pub fn latency_seconds(&self) -> f64 {
        self.latency_samples() as f64 / self.sample_rate
    }

    /// Smoothed loudness per channel (dB re full scale).
    pub fn levels(&self) -> [f64; 2] {
        [self.channels[0].level_db(), self.channels[1].level_db()]
    }

    /// Left-channel loudness (dB re full scale).
    pub fn power(&self) -> f64 {
        self.channels[0].level_db()
    }

    /// Latest per-band gain (dB) of `channel`.
    pub fn band_gains(&self, channel: usize) -> &[f64; GAIN_BANDS] {
        self.channels[channel.min(1)].band_gains_db()
    }

    /// Latest per-band level (dB re full scale) of `channel`.
    pub fn band_powers(&self, channel: usize) -> &[f64; NUM_BANDS] {
        self.channels[channel.min(1)].band_levels_db()
    }

    #[inline]
    pub fn self_calibration_db(&self) -> f64 {
        self.self_cal_db
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn split_io<'a>(input: Option<&'a [f32]>, output: Option<&'a mut [f32]>) -> Option<ChannelIo<'a>> {
    match (input, output) {
        (Some(input), Some(output)) => Some(ChannelIo::Split { input, output }),
        _ => None,
    }
}
