use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex32};

/// Classic Blackman window (alpha = 0.16), as used by spectrum analysers.
/// w[i] = 0.42 - 0.5 cos(2πi/N) + 0.08 cos(4πi/N)
#[inline]
pub fn blackman_window(n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let two_pi = std::f32::consts::PI * 2.0;
            let denom = n as f32;
            (0..n)
                .map(|i| {
                    let phi = two_pi * i as f32 / denom;
                    (0.42 - 0.5 * phi.cos() + 0.08 * (2.0 * phi).cos()).max(0.0)
                })
                .collect()
        }
    }
}

/// Windowed forward FFT returning `n/2` linear magnitudes scaled by `1/n`.
pub struct MagnitudeSpectrum {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buf: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl MagnitudeSpectrum {
    pub fn new(n: usize) -> Self {
        let n = n.max(2);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            window: blackman_window(n),
            buf: vec![Complex32::new(0.0, 0.0); n],
            scratch,
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn bins(&self) -> usize {
        self.window.len() / 2
    }

    /// `frame.len()` must equal [`Self::len`]; `out.len()` must equal [`Self::bins`].
    pub fn process(&mut self, frame: &[f32], out: &mut [f32]) {
        debug_assert_eq!(frame.len(), self.window.len());
        debug_assert_eq!(out.len(), self.bins());
        for ((b, &x), &w) in self.buf.iter_mut().zip(frame).zip(&self.window) {
            *b = Complex32::new(x * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buf, &mut self.scratch);
        let norm = 1.0 / self.window.len() as f32;
        for (o, c) in out.iter_mut().zip(&self.buf) {
            *o = c.norm() * norm;
        }
    }
}
