//! Last stage before the device: keeps the stereo stream inside a ceiling.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoftClipParams {
    pub ceiling: f32,
    pub drive: f32,
}

impl Default for SoftClipParams {
    fn default() -> Self {
        Self {
            ceiling: 0.98,
            drive: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakLimiterParams {
    pub ceiling: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for PeakLimiterParams {
    fn default() -> Self {
        Self {
            ceiling: 0.98,
            attack_ms: 0.5,
            release_ms: 50.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutputGuardMode {
    None,
    SoftClip(SoftClipParams),
    PeakLimiter(PeakLimiterParams),
}

impl Default for OutputGuardMode {
    fn default() -> Self {
        Self::PeakLimiter(PeakLimiterParams::default())
    }
}

/// Soft clipper or channel-linked peak limiter over interleaved frames.
#[derive(Debug)]
pub struct OutputGuard {
    mode: OutputGuardMode,
    gain: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Samples that arrived above the ceiling since the last `take_overs`.
    overs: u64,
}

impl OutputGuard {
    pub fn new(mode: OutputGuardMode, sample_rate: u32) -> Self {
        let sample_rate = (sample_rate as f32).max(1.0);
        let (attack_coeff, release_coeff) = match mode {
            OutputGuardMode::PeakLimiter(p) => (
                time_to_coeff(p.attack_ms, sample_rate),
                time_to_coeff(p.release_ms, sample_rate),
            ),
            _ => (0.0, 0.0),
        };
        Self {
            mode,
            gain: 1.0,
            attack_coeff,
            release_coeff,
            overs: 0,
        }
    }

    pub fn mode(&self) -> OutputGuardMode {
        self.mode
    }

    pub fn process_interleaved(&mut self, frames: &mut [f32], channels: usize) {
        if frames.is_empty() || channels == 0 {
            return;
        }
        match self.mode {
            OutputGuardMode::None => {}
            OutputGuardMode::SoftClip(params) => {
                let ceiling = params.ceiling.abs().max(1e-6);
                let drive = params.drive.max(0.0);
                for s in frames.iter_mut() {
                    let x = if s.is_finite() { *s } else { 0.0 };
                    if x.abs() > ceiling {
                        self.overs += 1;
                    }
                    *s = (x * drive).tanh() * ceiling;
                }
            }
            OutputGuardMode::PeakLimiter(params) => {
                let ceiling = params.ceiling.abs().max(1e-6);
                for frame in frames.chunks_mut(channels) {
                    let mut peak = 0.0f32;
                    for s in frame.iter_mut() {
                        if !s.is_finite() {
                            *s = 0.0;
                        }
                        peak = peak.max(s.abs());
                    }
                    if peak > ceiling {
                        self.overs += 1;
                    }
                    let target = if peak > ceiling { ceiling / peak } else { 1.0 };
                    let coeff = if target < self.gain {
                        self.attack_coeff
                    } else {
                        self.release_coeff
                    };
                    self.gain = coeff * self.gain + (1.0 - coeff) * target;
                    for s in frame.iter_mut() {
                        *s = (*s * self.gain).clamp(-ceiling, ceiling);
                    }
                }
            }
        }
    }

    /// Over-ceiling count since the previous call.
    pub fn take_overs(&mut self) -> u64 {
        std::mem::take(&mut self.overs)
    }
}

fn time_to_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let time_s = time_ms.max(0.0) * 0.001;
    if time_s <= 0.0 {
        0.0
    } else {
        (-1.0 / (time_s * sample_rate)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_softclip() {
        let mut guard = OutputGuard::new(OutputGuardMode::SoftClip(SoftClipParams::default()), 48_000);
        let mut buf = [0.0f32, 1.5, -1.5, 0.5];
        guard.process_interleaved(&mut buf, 2);
        let ceiling = SoftClipParams::default().ceiling + 1e-6;
        for &v in &buf {
            assert!(v.abs() <= ceiling, "{v} exceeds ceiling");
        }
        assert_eq!(guard.take_overs(), 2);
        assert_eq!(guard.take_overs(), 0);
    }

    #[test]
    fn safety_limiter() {
        let mut guard = OutputGuard::new(OutputGuardMode::default(), 48_000);
        let mut buf = [0.0f32, 2.0, -2.0, 0.25, f32::NAN, 0.1];
        guard.process_interleaved(&mut buf, 2);
        let ceiling = PeakLimiterParams::default().ceiling + 1e-6;
        for &v in &buf {
            assert!(v.is_finite());
            assert!(v.abs() <= ceiling, "{v} exceeds ceiling");
        }
    }

    #[test]
    fn transparency_none() {
        let mut guard = OutputGuard::new(OutputGuardMode::None, 48_000);
        let mut buf = [0.25f32, -0.5, 0.1, 0.0];
        let original = buf;
        guard.process_interleaved(&mut buf, 2);
        assert_eq!(buf, original);
    }

    #[test]
    fn transparency_limiter() {
        let mut guard = OutputGuard::new(OutputGuardMode::default(), 48_000);
        let mut buf = [0.25f32, -0.5, 0.1, 0.0];
        let original = buf;
        guard.process_interleaved(&mut buf, 2);
        for (a, b) in buf.iter().zip(original.iter()) {
            assert!((a - b).abs() <= 1e-6);
        }
    }
}
