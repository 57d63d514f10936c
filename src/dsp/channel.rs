//! Channel Streaming State & Overlap-Save
//!
//! One channel's rolling input, output ring and per-band dynamics.
//!
//! # Buffering
//! - Input: three half-block segments. `phase` names the segment being
//!   filled; `scrap` counts how far. A block runs each time a segment fills.
//! - Analysis reads the two freshest segments (windowed). Filtering reads the
//!   pair one segment older (unwindowed), so the filter always lags the
//!   analysis by half a block.
//! - Output: a ring of two half-blocks primed with one half-block of silence.
//!   Each block pushes the valid half of the circular convolution; the host
//!   drains it sample by sample, so any host buffer size works.
//!
//! Latency is five quarter-blocks.

use ringbuf::{Consumer, Producer, RingBuffer};

use crate::dsp::bark::{BarkMap, CELL_TABLE_LEN, GAIN_BANDS, NUM_BANDS};
use crate::dsp::biquad::CrestDetector;
use crate::dsp::dither::Dither;
use crate::dsp::filter::FilterSynth;
use crate::dsp::gain::{GainContext, GainController};
use crate::dsp::spectral::{Cell, SpectralTransform};
use crate::dsp::utils::{db10, safe_relax, DB_FLOOR};
use crate::hc_log;

/// How rendered samples land in the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    Replace,
    Add,
}

/// A channel's host buffers: separate input and output, or one buffer
/// processed in place.
pub enum ChannelIo<'a> {
    Split {
        input: &'a [f32],
        output: &'a mut [f32],
    },
    InPlace(&'a mut [f32]),
}

impl ChannelIo<'_> {
    /// Samples to process. Mismatched split buffers process the shorter.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            ChannelIo::Split { input, output } => input.len().min(output.len()),
            ChannelIo::InPlace(buf) => buf.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn read(&self, i: usize) -> f64 {
        match self {
            ChannelIo::Split { input, .. } => input[i] as f64,
            ChannelIo::InPlace(buf) => buf[i] as f64,
        }
    }

    #[inline]
    fn write(&mut self, i: usize, v: f64, mode: TransferMode) {
        let slot = match self {
            ChannelIo::Split { output, .. } => &mut output[i],
            ChannelIo::InPlace(buf) => &mut buf[i],
        };
        match mode {
            TransferMode::Replace => *slot = v as f32,
            TransferMode::Add => *slot += v as f32,
        }
    }
}

/// Shared read-only state one block needs.
pub struct BlockContext<'a> {
    pub map: &'a BarkMap,
    pub window: &'a [f64],
    pub eq_ampl: &'a [f64; CELL_TABLE_LEN],
    pub eq_db: &'a [f64; CELL_TABLE_LEN],
    pub gain: GainContext<'a>,
}

/// Transform and scratch buffers shared by both channels.
pub struct Workspace<T: SpectralTransform> {
    pub transform: T,
    synth: FilterSynth,
    frame: Vec<f64>,
    spectrum: Vec<Cell>,
    data: Vec<Cell>,
    cumulative: [f64; CELL_TABLE_LEN],
    powers: [f64; NUM_BANDS],
}

impl<T: SpectralTransform> Workspace<T> {
    pub fn new(block_size: usize) -> Self {
        let transform = T::plan(block_size);
        let bins = transform.spectrum_len();
        Self {
            transform,
            synth: FilterSynth::new(block_size),
            frame: vec![0.0; block_size],
            spectrum: vec![Cell::default(); bins],
            data: vec![Cell::default(); bins],
            cumulative: [0.0; CELL_TABLE_LEN],
            powers: [0.0; NUM_BANDS],
        }
    }
}

pub struct ChannelState {
    half: usize,
    input: Vec<f64>,
    phase: usize,
    scrap: usize,
    out_producer: Producer<f64>,
    out_consumer: Consumer<f64>,
    crest: CrestDetector,
    gains: GainController,
    level_db: f64,
    dither: Dither,
}

impl ChannelState {
    /// `dither_offset` staggers this channel's position in the shared
    /// noise table.
    pub fn new(sample_rate: f64, block_size: usize, dither_offset: usize) -> Self {
        let half = block_size / 2;
        let (out_producer, out_consumer) = Self::primed_ring(half);
        Self {
            half,
            input: vec![0.0; 3 * half],
            phase: 0,
            scrap: 0,
            out_producer,
            out_consumer,
            crest: CrestDetector::new(sample_rate),
            gains: GainController::new(),
            level_db: DB_FLOOR,
            dither: Dither::new(dither_offset),
        }
    }

    fn primed_ring(half: usize) -> (Producer<f64>, Consumer<f64>) {
        let (mut producer, consumer) = RingBuffer::<f64>::new(2 * half).split();
        for _ in 0..half {
            let _ = producer.push(0.0);
        }
        (producer, consumer)
    }

    pub fn reset(&mut self) {
        self.input.fill(0.0);
        self.phase = 0;
        self.scrap = 0;
        while self.out_consumer.pop().is_some() {}
        for _ in 0..self.half {
            let _ = self.out_producer.push(0.0);
        }
        self.crest.reset();
        self.gains.reset();
        self.level_db = DB_FLOOR;
    }

    /// Stream `io` through the channel.
    pub fn render<T: SpectralTransform>(
        &mut self,
        mut io: ChannelIo,
        mode: TransferMode,
        ctx: &BlockContext,
        ws: &mut Workspace<T>,
    ) {
        let len = io.len();
        let mut pos = 0;
        while pos < len {
            let n = (len - pos).min(self.half - self.scrap);

            let base = self.phase * self.half + self.scrap;
            for i in 0..n {
                self.input[base + i] = io.read(pos + i);
            }
            for i in 0..n {
                let y = self.out_consumer.pop().unwrap_or(0.0);
                io.write(pos + i, y + self.dither.next(), mode);
            }

            self.scrap += n;
            pos += n;
            if self.scrap == self.half {
                self.process_block(ctx, ws);
                self.scrap = 0;
                self.phase = (self.phase + 1) % 3;
            }
        }
    }

    /// Copy segments `a` then `b` into `frame`.
    fn gather(&self, a: usize, b: usize, frame: &mut [f64]) {
        let h = self.half;
        frame[..h].copy_from_slice(&self.input[a * h..(a + 1) * h]);
        frame[h..].copy_from_slice(&self.input[b * h..(b + 1) * h]);
    }

    fn process_block<T: SpectralTransform>(&mut self, ctx: &BlockContext, ws: &mut Workspace<T>) {
        let h = self.half;
        let q = h / 2;

        // analysis: the freshest full block, windowed
        self.gather((self.phase + 2) % 3, self.phase, &mut ws.frame);
        let crest_db = self.crest.measure(&ws.frame[h..]);
        for (x, w) in ws.frame.iter_mut().zip(ctx.window.iter()) {
            *x *= w;
        }
        ws.transform.forward(&ws.frame, &mut ws.spectrum);
        let total = ctx
            .map
            .band_powers(&ws.spectrum, ctx.eq_ampl, &mut ws.cumulative, &mut ws.powers);
        safe_relax(
            &mut self.level_db,
            db10(total) - ctx.gain.self_cal_db,
            ctx.gain.dynamics.level,
            self.dither.next(),
        );

        let gains = self
            .gains
            .update(&ws.powers, crest_db, &ctx.gain, &mut self.dither);
        let filter = ws
            .synth
            .synthesize(&mut ws.transform, ctx.map, gains, ctx.eq_db);

        // filtering: the block one half older, unwindowed
        self.gather((self.phase + 1) % 3, (self.phase + 2) % 3, &mut ws.frame);
        ws.transform.forward(&ws.frame, &mut ws.data);
        ws.transform.multiply(filter, &mut ws.data);
        ws.transform.inverse(&ws.data, &mut ws.frame);

        let pushed = self.out_producer.push_slice(&ws.frame[q..q + h]);
        if pushed != h {
            hc_log!("output ring overrun: {} of {} samples", pushed, h);
        }
    }

    #[inline]
    pub fn level_db(&self) -> f64 {
        self.level_db
    }

    #[inline]
    pub fn band_gains_db(&self) -> &[f64; GAIN_BANDS] {
        self.gains.gains_db()
    }

    #[inline]
    pub fn band_levels_db(&self) -> &[f64; NUM_BANDS] {
        self.gains.levels_db()
    }
}
