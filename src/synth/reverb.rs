//! Two cross-coupled feedback delay lines with a diffusion stage and wet/dry mix.
//!
//! ```text
//! in ─┬─► delay L ─┬─► ×gain ─► delay R input
//!     │            └─► diffusion ─► wet ─┐
//!     ├─► delay R ─┬─► ×gain ─► delay L input
//!     │            └─► diffusion ─┘      ├─► out
//!     └─► dry ───────────────────────────┘
//! ```
//!
//! Each stereo channel runs its own pair of lines with shared parameters.

use rand::Rng;

use super::control::LinearRamp;
use super::delay::DelayLine;
use super::util::flush_denorm;
use super::{SynthError, check_sample_rate};
use crate::core::entropy::reverb_time_for;

pub const MAX_DELAY_S: f32 = 1.0;
/// Upper bound of the random per-line offset drawn at construction.
pub const MAX_JITTER_S: f32 = 0.05;
pub const MAX_FEEDBACK: f32 = 0.7;
pub const DIFFUSION: f32 = 0.5;
/// Left line runs at this fraction of the reverb time.
pub const LEFT_RATIO: f32 = 0.8;

const TIME_RAMP_S: f32 = 0.1;
const GAIN_RAMP_S: f32 = 0.05;

/// Snapshot of the current targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Nominal reverb time T in seconds (before jitter).
    pub time_s: f32,
    /// Left and right line delays in seconds, jitter included.
    pub line_delays_s: (f32, f32),
    pub feedback: f32,
    pub diffusion: f32,
    pub mix: f32,
}

#[derive(Debug, Clone)]
struct LinePair {
    left: DelayLine,
    right: DelayLine,
}

impl LinePair {
    #[inline]
    fn process(&mut self, x: f32, delay_l: f32, delay_r: f32, gain: f32) -> f32 {
        let out_l = self.left.read(delay_l);
        let out_r = self.right.read(delay_r);
        self.left.write(flush_denorm(x + out_r * gain));
        self.right.write(flush_denorm(x + out_l * gain));
        out_l + out_r
    }
}

#[derive(Debug, Clone)]
pub struct ReverbNetwork {
    fs: f32,
    channels: [LinePair; 2],
    jitter_s: (f32, f32),
    time_s: f32,
    delay_l: LinearRamp,
    delay_r: LinearRamp,
    feedback: LinearRamp,
    wet: LinearRamp,
    dry: LinearRamp,
}

impl ReverbNetwork {
    /// `mix` in [0, 1], `time_s` is the nominal reverb time T.
    pub fn new<R: Rng + ?Sized>(
        fs: f32,
        mix: f32,
        time_s: f32,
        rng: &mut R,
    ) -> Result<Self, SynthError> {
        let fs = check_sample_rate(fs)?;
        let pair = LinePair {
            left: DelayLine::new(fs, MAX_DELAY_S)?,
            right: DelayLine::new(fs, MAX_DELAY_S)?,
        };
        let jitter_s = (
            rng.random_range(0.0..MAX_JITTER_S),
            rng.random_range(0.0..MAX_JITTER_S),
        );
        let mix = mix.clamp(0.0, 1.0);
        let time_s = clamp_time(time_s);
        Ok(Self {
            fs,
            channels: [pair.clone(), pair],
            jitter_s,
            time_s,
            delay_l: LinearRamp::new((time_s * LEFT_RATIO + jitter_s.0) * fs),
            delay_r: LinearRamp::new((time_s + jitter_s.1) * fs),
            feedback: LinearRamp::new(0.35),
            wet: LinearRamp::new(mix),
            dry: LinearRamp::new(1.0 - mix),
        })
    }

    /// Retune from a normalized entropy: T = 0.15 + 0.55·entropy seconds,
    /// lines glide to 0.8·T and T over 100 ms.
    pub fn set_time(&mut self, entropy: f32) {
        self.set_time_seconds(reverb_time_for(entropy));
    }

    pub fn set_time_seconds(&mut self, time_s: f32) {
        let t = clamp_time(time_s);
        self.time_s = t;
        let len = self.ramp_len(TIME_RAMP_S);
        self.delay_l
            .ramp_to((t * LEFT_RATIO + self.jitter_s.0) * self.fs, len);
        self.delay_r.ramp_to((t + self.jitter_s.1) * self.fs, len);
    }

    /// Wet share in [0, 1]; the dry share follows as `1 - ratio`. Clamped, 50 ms glide.
    pub fn set_mix(&mut self, ratio: f32) {
        if ratio.is_nan() {
            return;
        }
        let mix = ratio.clamp(0.0, 1.0);
        let len = self.ramp_len(GAIN_RAMP_S);
        self.wet.ramp_to(mix, len);
        self.dry.ramp_to(1.0 - mix, len);
    }

    /// Cross-feedback gain, clamped to [0, 0.7], 50 ms glide.
    pub fn set_feedback(&mut self, amount: f32) {
        if amount.is_nan() {
            return;
        }
        let len = self.ramp_len(GAIN_RAMP_S);
        self.feedback.ramp_to(amount.clamp(0.0, MAX_FEEDBACK), len);
    }

    pub fn params(&self) -> ReverbParams {
        ReverbParams {
            time_s: self.time_s,
            line_delays_s: self.line_delays_s(),
            feedback: self.feedback.target(),
            diffusion: DIFFUSION,
            mix: self.wet.target(),
        }
    }

    /// Target delays of the left and right lines in seconds.
    pub fn line_delays_s(&self) -> (f32, f32) {
        (
            self.delay_l.target() / self.fs,
            self.delay_r.target() / self.fs,
        )
    }

    /// Offsets drawn at construction, added to both line delays.
    pub fn jitter_s(&self) -> (f32, f32) {
        self.jitter_s
    }

    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let dl = self.delay_l.next();
        let dr = self.delay_r.next();
        let gain = self.feedback.next();
        let wet = self.wet.next();
        let dry = self.dry.next();
        let wl = self.channels[0].process(left, dl, dr, gain) * DIFFUSION;
        let wr = self.channels[1].process(right, dl, dr, gain) * DIFFUSION;
        (dry * left + wet * wl, dry * right + wet * wr)
    }

    /// In-place over interleaved stereo frames.
    pub fn process_interleaved(&mut self, frames: &mut [f32]) {
        for frame in frames.chunks_exact_mut(2) {
            let (l, r) = self.process_frame(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }

    pub fn clear(&mut self) {
        for pair in self.channels.iter_mut() {
            pair.left.clear();
            pair.right.clear();
        }
    }

    fn ramp_len(&self, sec: f32) -> u64 {
        ((sec * self.fs).round() as u64).max(1)
    }
}

fn clamp_time(t: f32) -> f32 {
    if t.is_finite() {
        t.clamp(0.0, MAX_DELAY_S - MAX_JITTER_S)
    } else {
        reverb_time_for(0.0)
    }
}
