/// A parameter that glides linearly to its target over a fixed number of samples.
///
/// Every audible parameter change goes through one of these so the output never
/// jumps between two blocks.
#[derive(Debug, Clone, Copy)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u64,
}

impl LinearRamp {
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Glide from the current value to `target` over `len` samples.
    pub fn ramp_to(&mut self, target: f32, len: u64) {
        if !target.is_finite() {
            return;
        }
        self.target = target;
        if len == 0 {
            self.current = target;
            self.step = 0.0;
            self.remaining = 0;
            return;
        }
        self.step = (target - self.current) / len as f32;
        self.remaining = len;
    }

    /// Jump straight to `value`, cancelling any glide.
    pub fn set(&mut self, value: f32) {
        self.ramp_to(value, 0);
    }

    /// Value for the current sample; advances the glide by one sample.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }
        self.current
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_target_exactly_after_len() {
        let mut r = LinearRamp::new(0.0);
        r.ramp_to(1.0, 4);
        let seq: Vec<f32> = (0..6).map(|_| r.next()).collect();
        assert_eq!(seq[3], 1.0);
        assert_eq!(seq[5], 1.0);
        assert!(seq[0] > 0.0 && seq[0] < seq[1] && seq[1] < seq[2]);
        assert!(!r.is_ramping());
    }

    #[test]
    fn steps_are_bounded() {
        let mut r = LinearRamp::new(0.35);
        r.ramp_to(0.7, 2400);
        let mut prev = r.value();
        for _ in 0..2400 {
            let v = r.next();
            assert!((v - prev).abs() <= 0.35 / 2400.0 + 1e-6);
            prev = v;
        }
        assert_eq!(prev, 0.7);
    }

    #[test]
    fn retarget_mid_glide_starts_from_current() {
        let mut r = LinearRamp::new(0.0);
        r.ramp_to(1.0, 10);
        for _ in 0..5 {
            r.next();
        }
        let mid = r.value();
        r.ramp_to(0.0, 5);
        assert!(r.next() < mid);
        assert_eq!(r.target(), 0.0);
    }

    #[test]
    fn non_finite_targets_are_ignored() {
        let mut r = LinearRamp::new(0.5);
        r.ramp_to(f32::NAN, 10);
        assert_eq!(r.target(), 0.5);
        assert_eq!(r.next(), 0.5);
    }
}
