//! Amplitude dB conversions (20*log10).

/// Floor applied before taking the log so silence maps to a finite value.
pub const EPS_AMP: f32 = 1e-10;

/// Convert dB to an amplitude ratio.
pub fn db_to_amp_ratio(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert amplitude ratio to dB.
pub fn amp_to_db(a: f32) -> f32 {
    20.0 * (a.max(EPS_AMP)).log10()
}
