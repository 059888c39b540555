//! Procedural synthesis: square-wave tones with a shared vibrato LFO, a
//! cross-coupled delay reverb and a spectral level meter.

pub mod control;
pub mod delay;
pub mod engine;
pub mod events;
pub mod lfo;
pub mod meter;
pub mod reverb;
pub mod util;
pub mod voice;

pub use engine::{SynthConfig, SynthEngine};
pub use events::{CancelEpoch, SynthCommand, ToneEvent};
pub use meter::SharedLevel;
pub use reverb::{ReverbNetwork, ReverbParams};

/// Errors returned by synth primitives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SynthError {
    /// Sample rate is non-finite or not positive.
    InvalidSampleRate(f32),
    /// Delay capacity is non-finite or not positive.
    InvalidDelay(f32),
}

impl std::fmt::Display for SynthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthError::InvalidSampleRate(fs) => write!(f, "invalid sample rate {fs}"),
            SynthError::InvalidDelay(sec) => write!(f, "invalid delay capacity {sec}s"),
        }
    }
}

impl std::error::Error for SynthError {}

pub(crate) fn check_sample_rate(fs: f32) -> Result<f32, SynthError> {
    if fs.is_finite() && fs > 0.0 {
        Ok(fs)
    } else {
        Err(SynthError::InvalidSampleRate(fs))
    }
}
