//! Platform side of the synth: command link, render worker, device output,
//! output guard and WAV capture. Every piece here is optional at run time.

pub mod link;
pub mod output;
pub mod output_guard;
pub mod worker;
pub mod writer;

pub use link::SynthLink;
pub use output::AudioOutput;
pub use output_guard::{OutputGuard, OutputGuardMode};
pub use worker::AudioWorker;
pub use writer::WavOutput;

/// Interleaved channel count of everything the synth renders.
pub const CHANNELS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The host has no default output device.
    NoDevice,
    /// The device refused to report or accept a stream configuration.
    Config(String),
    /// Building or starting the output stream failed.
    Stream(String),
    /// Creating or writing the WAV file failed.
    Wav(String),
    /// The render thread could not be spawned.
    Thread(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoDevice => write!(f, "no output device"),
            AudioError::Config(msg) => write!(f, "output config: {msg}"),
            AudioError::Stream(msg) => write!(f, "output stream: {msg}"),
            AudioError::Wav(msg) => write!(f, "wav: {msg}"),
            AudioError::Thread(msg) => write!(f, "audio thread: {msg}"),
        }
    }
}

impl std::error::Error for AudioError {}
