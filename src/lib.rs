//! Real-time psychoacoustic hearing correction.
//!
//! Measures short-term loudness per quarter-Bark band, derives a compressive
//! per-band gain that compensates an elevated hearing threshold, and applies
//! it as a time-varying filter with a fixed latency of five quarter-blocks.
//!
//! - [`dsp`]: the signal-processing core (Bark tables, EQ, gain control,
//!   filter synthesis, channel streaming).
//! - [`engine::HearingEngine`]: the stereo orchestrator and render entrypoint.
//! - [`presets`]: configuration, render parameters, built-in curves.
//!
//! The plugin shell at the bottom of this file only marshals host
//! parameters into a [`presets::RenderParams`] and hands buffers to the
//! engine.

mod debug;
pub mod dsp;
pub mod engine;
pub mod meters;
pub mod presets;

pub use crate::dsp::channel::TransferMode;
pub use crate::engine::HearingEngine;
pub use crate::presets::{EngineConfig, EqPreset, ListenerProfile, RenderParams};

use crate::meters::Meters;
use nih_plug::prelude::*;
use std::sync::Arc;

const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

fn format_db(v: f32) -> String {
    format!("{:.1} dB", v)
}

fn format_spl(v: f32) -> String {
    format!("{:.1} dB SPL", v)
}

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------

#[derive(Params)]
pub struct HearingParams {
    #[id = "processing"]
    pub processing: BoolParam,

    /// Threshold elevation at 4 kHz.
    #[id = "vtuning"]
    pub vtuning: FloatParam,

    #[id = "profile"]
    pub profile: EnumParam<ListenerProfile>,

    #[id = "volume"]
    pub volume: FloatParam,

    #[id = "attenuation"]
    pub attenuation: FloatParam,

    // -------------------------------------------------------------------------
    // CALIBRATION
    // -------------------------------------------------------------------------
    #[id = "cal_dbfs"]
    pub cal_dbfs: FloatParam,

    #[id = "cal_dbspl"]
    pub cal_dbspl: FloatParam,

    // -------------------------------------------------------------------------
    // MONITORING CHAIN
    // -------------------------------------------------------------------------
    #[id = "post_eq"]
    pub post_eq: EnumParam<EqPreset>,

    #[id = "headphone"]
    pub headphone: EnumParam<EqPreset>,
}

impl Default for HearingParams {
    fn default() -> Self {
        let d = RenderParams::default();
        Self {
            processing: BoolParam::new("Processing", d.processing),

            vtuning: FloatParam::new(
                "Hearing Loss @ 4 kHz",
                d.vtuning_db as f32,
                FloatRange::Linear { min: 0.0, max: 80.0 },
            )
            .with_value_to_string(Arc::new(format_db)),

            profile: EnumParam::new("Profile", ListenerProfile::Manual),

            volume: FloatParam::new(
                "Volume",
                d.volume_db as f32,
                FloatRange::Linear {
                    min: -20.0,
                    max: 20.0,
                },
            )
            .with_value_to_string(Arc::new(format_db)),

            attenuation: FloatParam::new(
                "Headroom",
                d.attenuation_db as f32,
                FloatRange::Linear {
                    min: -30.0,
                    max: 0.0,
                },
            )
            .with_value_to_string(Arc::new(format_db)),

            cal_dbfs: FloatParam::new(
                "Cal Level",
                d.cal_dbfs as f32,
                FloatRange::Linear {
                    min: -40.0,
                    max: 0.0,
                },
            )
            .with_value_to_string(Arc::new(format_db)),

            cal_dbspl: FloatParam::new(
                "Cal SPL",
                d.cal_dbspl as f32,
                FloatRange::Linear {
                    min: 40.0,
                    max: 110.0,
                },
            )
            .with_value_to_string(Arc::new(format_spl)),

            post_eq: EnumParam::new("Post EQ", EqPreset::Flat),
            headphone: EnumParam::new("Headphone", EqPreset::Flat),
        }
    }
}

impl HearingParams {
    /// Snapshot for one host buffer. A listener profile overrides the manual
    /// tuning and headroom.
    fn render_params(&self) -> RenderParams {
        let mut p = RenderParams {
            cal_dbfs: self.cal_dbfs.value() as f64,
            cal_dbspl: self.cal_dbspl.value() as f64,
            vtuning_db: self.vtuning.value() as f64,
            processing: self.processing.value(),
            volume_db: self.volume.value() as f64,
            attenuation_db: self.attenuation.value() as f64,
            post_eq: self.post_eq.value().index(),
            headphone: self.headphone.value().index(),
        };
        self.profile.value().apply(&mut p);
        p
    }
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------

struct HearingPlugin {
    params: Arc<HearingParams>,
    engine: HearingEngine,
    meters: Arc<Meters>,
}

impl Default for HearingPlugin {
    fn default() -> Self {
        Self {
            params: Arc::new(HearingParams::default()),
            engine: HearingEngine::new(DEFAULT_SAMPLE_RATE),
            meters: Arc::new(Meters::new()),
        }
    }
}

impl Plugin for HearingPlugin {
    const NAME: &'static str = "VxHearing";
    const VENDOR: &'static str = "Andrzej Marczewski";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(2),
        main_output_channels: NonZeroU32::new(2),
        ..AudioIOLayout::const_default()
    }];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        context: &mut impl InitContext<Self>,
    ) -> bool {
        #[cfg(feature = "debug")]
        crate::debug::logger::init_logger();

        let ok = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.engine.set_sample_rate(buffer_config.sample_rate as f64);
            self.engine.reset();

            let latency = self.engine.latency_samples() as u32;
            context.set_latency_samples(latency);
            self.meters.set_latency_samples(latency);
            true
        }))
        .unwrap_or(false);

        #[cfg(feature = "debug")]
        crate::debug::logger::drain_to_file();

        ok
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.process_internal(buffer)))
            .unwrap_or(ProcessStatus::Normal)
    }

    fn reset(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.engine.reset();
        }))
        .unwrap_or(());
    }
}

impl HearingPlugin {
    fn process_internal(&mut self, buffer: &mut Buffer) -> ProcessStatus {
        let params = self.params.render_params();

        let channels = buffer.as_slice();
        let Some((left, rest)) = channels.split_first_mut() else {
            return ProcessStatus::Normal;
        };
        let right = rest.first_mut().map(|r| &mut **r);
        self.engine.render_in_place(
            [Some(&mut **left), right],
            TransferMode::Replace,
            Some(&params),
        );

        self.meters.set_levels(self.engine.levels());
        let peak = |ch| {
            self.engine
                .band_gains(ch)
                .iter()
                .cloned()
                .fold(f64::MIN, f64::max)
        };
        self.meters.set_peak_gains([peak(0), peak(1)]);

        ProcessStatus::Normal
    }
}

impl ClapPlugin for HearingPlugin {
    const CLAP_ID: &'static str = "com.andrzej.vxhearing";
    const CLAP_DESCRIPTION: Option<&'static str> = Some("Psychoacoustic hearing correction");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Equalizer,
        ClapFeature::Stereo,
    ];
}

impl Vst3Plugin for HearingPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"VxHearingCorrect";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Eq];
}

nih_export_clap!(HearingPlugin);
nih_export_vst3!(HearingPlugin);
