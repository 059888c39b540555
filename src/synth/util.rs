//! Small DSP helpers.

use std::f32::consts::FRAC_PI_2;

const DENORM_THRESH: f32 = 1.0e-20;

/// Flush denormals and non-finite values to zero.
#[inline(always)]
pub fn flush_denorm(x: f32) -> f32 {
    if !x.is_finite() || x.abs() < DENORM_THRESH {
        0.0
    } else {
        x
    }
}

/// Equal-power gains `(left, right)` for a pan position in [-1, 1].
#[inline]
pub fn equal_power_pan(pan: f32) -> (f32, f32) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5;
    let theta = x * FRAC_PI_2;
    (theta.cos(), theta.sin())
}

#[inline]
fn poly_blep(t: f32, dt: f32) -> f32 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

/// Band-limited square for a phase in [0, 1) advancing by `dt` per sample.
#[inline]
pub fn blep_square(phase: f32, dt: f32) -> f32 {
    let naive = if phase < 0.5 { 1.0 } else { -1.0 };
    let dt = dt.clamp(1e-6, 0.5);
    naive + poly_blep(phase, dt) - poly_blep((phase + 0.5) % 1.0, dt)
}
