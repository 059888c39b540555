use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::db::amp_to_db;
use crate::core::fft::MagnitudeSpectrum;

pub const ANALYSIS_LEN: usize = 64;
/// Weight of the previous magnitude when smoothing between analyses.
pub const SMOOTHING: f32 = 0.8;
pub const MIN_DB: f32 = -100.0;
pub const MAX_DB: f32 = -30.0;

/// Output level shared between the audio thread (writer) and any reader.
///
/// Stored as f32 bits so reads never block and never tear.
#[derive(Debug, Default)]
pub struct SharedLevel {
    bits: AtomicU32,
}

impl SharedLevel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn store(&self, level: f32) {
        self.bits.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Latest level in [0, 1].
    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Spectral level meter: average of the smoothed, dB-scaled magnitude bins of
/// the most recent 64 output samples, mapped from [-100, -30] dB to [0, 1].
pub struct LevelMeter {
    spectrum: MagnitudeSpectrum,
    window: Vec<f32>,
    frame: Vec<f32>,
    write: usize,
    mags: Vec<f32>,
    smoothed: Vec<f32>,
    level: f32,
    shared: Option<Arc<SharedLevel>>,
}

impl LevelMeter {
    pub fn new() -> Self {
        let spectrum = MagnitudeSpectrum::new(ANALYSIS_LEN);
        let bins = spectrum.bins();
        Self {
            spectrum,
            window: vec![0.0; ANALYSIS_LEN],
            frame: vec![0.0; ANALYSIS_LEN],
            write: 0,
            mags: vec![0.0; bins],
            smoothed: vec![0.0; bins],
            level: 0.0,
            shared: None,
        }
    }

    pub fn with_shared(mut self, shared: Arc<SharedLevel>) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Feed interleaved stereo frames (down-mixed), then analyse once.
    pub fn process_interleaved(&mut self, frames: &[f32]) {
        for frame in frames.chunks_exact(2) {
            self.window[self.write] = 0.5 * (frame[0] + frame[1]);
            self.write = (self.write + 1) % ANALYSIS_LEN;
        }
        self.analyse();
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    fn analyse(&mut self) {
        let (head, tail) = self.window.split_at(self.write);
        self.frame[..tail.len()].copy_from_slice(tail);
        self.frame[tail.len()..].copy_from_slice(head);
        self.spectrum.process(&self.frame, &mut self.mags);

        let range = MAX_DB - MIN_DB;
        let mut sum = 0.0;
        for (s, &m) in self.smoothed.iter_mut().zip(&self.mags) {
            *s = SMOOTHING * *s + (1.0 - SMOOTHING) * m;
            let db = amp_to_db(*s);
            sum += ((db - MIN_DB) / range).clamp(0.0, 1.0);
        }
        self.level = sum / self.smoothed.len().max(1) as f32;
        if let Some(shared) = &self.shared {
            shared.store(self.level);
        }
    }
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new()
    }
}
