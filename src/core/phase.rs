use std::f32::consts::TAU;

#[inline]
pub fn wrap_0_tau(x: f32) -> f32 {
    x.rem_euclid(TAU)
}

/// Wrap a normalized phase to [0, 1).
#[inline]
pub fn wrap_unit(x: f32) -> f32 {
    let w = x.rem_euclid(1.0);
    // rem_euclid can round up to exactly 1.0 for tiny negative inputs
    if w >= 1.0 { 0.0 } else { w }
}
