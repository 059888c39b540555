use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use super::{AudioError, CHANNELS};

/// Writes interleaved stereo blocks to a 16-bit WAV file on its own thread.
pub struct WavOutput;

impl WavOutput {
    /// Runs until every sender of `rx` is dropped, then finalizes the file.
    pub fn run(
        rx: Receiver<Arc<[f32]>>,
        path: String,
        sample_rate: u32,
    ) -> Result<JoinHandle<Result<u64, AudioError>>, AudioError> {
        let spec = WavSpec {
            channels: CHANNELS as u16,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer =
            WavWriter::create(&path, spec).map_err(|e| AudioError::Wav(e.to_string()))?;
        std::thread::Builder::new()
            .name("wav-writer".into())
            .spawn(move || {
                let mut frames = 0u64;
                while let Ok(samples) = rx.recv() {
                    for &s in samples.iter() {
                        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        writer
                            .write_sample(v)
                            .map_err(|e| AudioError::Wav(e.to_string()))?;
                    }
                    frames += (samples.len() / CHANNELS) as u64;
                }
                writer
                    .finalize()
                    .map_err(|e| AudioError::Wav(e.to_string()))?;
                info!("wrote {frames} frames to {path}");
                Ok(frames)
            })
            .map_err(|e| AudioError::Thread(e.to_string()))
    }
}
