use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::*;
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{info, warn};

use super::{AudioError, CHANNELS};

/// Default output device fed from a stereo ring buffer.
pub struct AudioOutput {
    stream: Option<cpal::Stream>,
    pub config: cpal::StreamConfig,
}

impl AudioOutput {
    /// Open the default device and return the producer the render worker fills
    /// with interleaved stereo frames.
    pub fn new(latency_ms: f32) -> Result<(Self, HeapProd<f32>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;
        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels() as usize;

        let config = cpal::StreamConfig {
            channels: supported_config.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let frames = ((sample_rate as f32 * latency_ms.max(1.0) / 1000.0) as usize).max(64);
        let rb = HeapRb::<f32>::new(frames * CHANNELS * 4);
        let (prod, mut cons): (HeapProd<f32>, HeapCons<f32>) = rb.split();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    write_frames(&mut cons, data, channels);
                },
                |err| warn!("output stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        info!(
            "audio output: {} Hz, {} channels, {:.0} ms ring",
            sample_rate, channels, latency_ms
        );
        Ok((
            Self {
                stream: Some(stream),
                config,
            },
            prod,
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn stop(&mut self) {
        self.stream.take();
    }

    /// Push all of `samples`, waiting for room while the device drains the ring.
    /// Gives up early once `stop` is set.
    pub fn push_samples(prod: &mut HeapProd<f32>, samples: &[f32], stop: &AtomicBool) {
        let mut offset = 0;
        while offset < samples.len() {
            offset += prod.push_slice(&samples[offset..]);
            if offset < samples.len() {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                std::thread::sleep(std::time::Duration::from_micros(200));
            }
        }
    }
}

/// Map stereo frames from the ring onto the device layout. Underruns play silence.
fn write_frames(cons: &mut HeapCons<f32>, data: &mut [f32], channels: usize) {
    let channels = channels.max(1);
    for frame in data.chunks_mut(channels) {
        let l = cons.try_pop().unwrap_or(0.0);
        let r = cons.try_pop().unwrap_or(0.0);
        if channels == 1 {
            frame[0] = 0.5 * (l + r);
            continue;
        }
        for (ch, s) in frame.iter_mut().enumerate() {
            *s = match ch {
                0 => l,
                1 => r,
                _ => 0.0,
            };
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        if self.stream.is_some() {
            info!("stopping audio output");
        }
        self.stream.take();
    }
}
