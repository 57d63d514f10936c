//! Lock-free meters shared between the audio thread and observers.
//!
//! Floats are stored as their bit patterns in `AtomicU32`, relaxed ordering:
//! each value is independent and a reader only ever wants the latest one.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
pub struct Meters {
    level_l: AtomicU32,
    level_r: AtomicU32,
    peak_gain_l: AtomicU32,
    peak_gain_r: AtomicU32,
    latency_samples: AtomicU32,
}

impl Meters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smoothed loudness per channel (dB re full scale).
    pub fn set_levels(&self, levels: [f64; 2]) {
        store(&self.level_l, levels[0] as f32);
        store(&self.level_r, levels[1] as f32);
    }

    /// Largest band gain per channel (dB).
    pub fn set_peak_gains(&self, gains: [f64; 2]) {
        store(&self.peak_gain_l, gains[0] as f32);
        store(&self.peak_gain_r, gains[1] as f32);
    }

    pub fn set_latency_samples(&self, samples: u32) {
        self.latency_samples.store(samples, Ordering::Relaxed);
    }

    pub fn get_levels(&self) -> [f32; 2] {
        [load(&self.level_l), load(&self.level_r)]
    }

    pub fn get_peak_gains(&self) -> [f32; 2] {
        [load(&self.peak_gain_l), load(&self.peak_gain_r)]
    }

    pub fn get_latency_samples(&self) -> u32 {
        self.latency_samples.load(Ordering::Relaxed)
    }
}

#[inline]
fn store(slot: &AtomicU32, v: f32) {
    slot.store(v.to_bits(), Ordering::Relaxed);
}

#[inline]
fn load(slot: &AtomicU32) -> f32 {
    f32::from_bits(slot.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_round_trip() {
        let m = Meters::new();
        assert_eq!(m.get_levels(), [0.0, 0.0]);
        m.set_levels([-12.5, -140.0]);
        m.set_peak_gains([6.25, 0.0]);
        m.set_latency_samples(320);
        assert_eq!(m.get_levels(), [-12.5, -140.0]);
        assert_eq!(m.get_peak_gains(), [6.25, 0.0]);
        assert_eq!(m.get_latency_samples(), 320);
    }
}
