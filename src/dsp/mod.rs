pub mod bark;
pub mod biquad;
pub mod calibration;
pub mod channel;
pub mod dither;
pub mod filter;
pub mod fitting;
pub mod gain;
pub mod spectral;
pub mod tables;
pub mod utils;

pub use bark::BarkMap;
pub use biquad::{Biquad, CrestDetector};
pub use calibration::{self_calibrate, EqTable, UnifiedEq};
pub use channel::{BlockContext, ChannelIo, ChannelState, TransferMode, Workspace};
pub use dither::Dither;
pub use filter::FilterSynth;
pub use fitting::{FitTable, RationalFit, TuningProfile};
pub use gain::{Dynamics, GainContext, GainController};
pub use spectral::{RustFftTransform, SpectralTransform};
