use std::f32::consts::TAU;

use crate::core::phase::wrap_0_tau;

/// Sine LFO producing a frequency deviation in Hz.
#[derive(Debug, Clone, Copy)]
pub struct Lfo {
    fs: f32,
    phase: f32,
    rate_hz: f32,
    depth_hz: f32,
}

impl Lfo {
    pub fn new(fs: f32, rate_hz: f32, depth_hz: f32) -> Self {
        let mut lfo = Self {
            fs,
            phase: 0.0,
            rate_hz: 0.0,
            depth_hz: 0.0,
        };
        lfo.set_rate(rate_hz);
        lfo.set_depth(depth_hz);
        lfo
    }

    /// Takes effect on the next sample; negative or non-finite values become 0.
    pub fn set_rate(&mut self, hz: f32) {
        self.rate_hz = sanitize(hz);
    }

    /// Peak deviation in Hz; negative or non-finite values become 0.
    pub fn set_depth(&mut self, hz: f32) {
        self.depth_hz = sanitize(hz);
    }

    pub fn rate(&self) -> f32 {
        self.rate_hz
    }

    pub fn depth(&self) -> f32 {
        self.depth_hz
    }

    /// Current deviation, then advance one sample.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let out = self.phase.sin() * self.depth_hz;
        self.phase = wrap_0_tau(self.phase + TAU * self.rate_hz / self.fs);
        out
    }

    /// Fill `out` with consecutive deviations.
    pub fn fill(&mut self, out: &mut [f32]) {
        for v in out.iter_mut() {
            *v = self.next();
        }
    }
}

fn sanitize(v: f32) -> f32 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deviation_stays_within_depth() {
        let mut lfo = Lfo::new(1000.0, 1.5, 50.0);
        let mut buf = vec![0.0; 2000];
        lfo.fill(&mut buf);
        let peak = buf.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        assert!(peak <= 50.0 + 1e-3);
        assert!(peak > 49.0);
    }

    #[test]
    fn rate_sets_period() {
        let fs = 1000.0;
        let mut lfo = Lfo::new(fs, 2.0, 1.0);
        let mut buf = vec![0.0; 1000];
        lfo.fill(&mut buf);
        let crossings = buf
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        // 2 Hz over one second: one upward crossing at 0.5 s, the next falls at 1.0 s
        assert_eq!(crossings, 1);
    }

    #[test]
    fn bad_values_are_zeroed() {
        let mut lfo = Lfo::new(48_000.0, 0.5, 20.0);
        lfo.set_rate(-3.0);
        lfo.set_depth(f32::INFINITY);
        assert_eq!(lfo.rate(), 0.0);
        assert_eq!(lfo.depth(), 0.0);
        assert_eq!(lfo.next(), 0.0);
    }
}
