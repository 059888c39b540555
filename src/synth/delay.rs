use super::SynthError;

/// Circular delay line with linearly interpolated fractional reads.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buf: Vec<f32>,
    write: usize,
}

impl DelayLine {
    /// Line able to hold `max_delay_s` seconds at `fs`.
    pub fn new(fs: f32, max_delay_s: f32) -> Result<Self, SynthError> {
        if !max_delay_s.is_finite() || max_delay_s <= 0.0 {
            return Err(SynthError::InvalidDelay(max_delay_s));
        }
        let len = (fs * max_delay_s).ceil() as usize + 2;
        Ok(Self {
            buf: vec![0.0; len],
            write: 0,
        })
    }

    /// Largest readable delay in samples.
    pub fn max_delay(&self) -> f32 {
        (self.buf.len() - 2) as f32
    }

    /// Sample written `delay` samples ago, clamped to [1, max_delay].
    #[inline]
    pub fn read(&self, delay: f32) -> f32 {
        let len = self.buf.len();
        let d = delay.clamp(1.0, self.max_delay());
        let whole = d.floor();
        let frac = d - whole;
        let i0 = (self.write + len - whole as usize) % len;
        let i1 = (i0 + len - 1) % len;
        let a = self.buf[i0];
        let b = self.buf[i1];
        a + (b - a) * frac
    }

    #[inline]
    pub fn write(&mut self, x: f32) {
        self.buf[self.write] = x;
        self.write = (self.write + 1) % self.buf.len();
    }

    pub fn clear(&mut self) {
        self.buf.fill(0.0);
    }
}
