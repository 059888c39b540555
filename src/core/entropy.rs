//! Normalized Shannon entropy over the three-state histogram, plus the
//! linear maps that turn it into synth parameters.

/// Cell counts per state, indexed by `TriState::index()`.
pub type StateHistogram = [usize; 3];

/// log2(3), the entropy of a uniform three-state distribution.
const LOG2_3: f64 = 1.584_962_500_721_156;

/// Shannon entropy of `hist` divided by log2(3), in [0, 1].
///
/// Empty bins contribute nothing (`0 * log2(0) = 0`). Callers never pass an
/// all-zero histogram; if they do the result is 0.
pub fn entropy(hist: &StateHistogram) -> f32 {
    let total: usize = hist.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let h: f64 = hist
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum();
    ((h / LOG2_3) as f32).clamp(0.0, 1.0)
}

/// How evenly the three states share the field: `1 - Σ|count - total/3| / total`.
///
/// 1 for a perfectly balanced field, falling towards 0 as one state dominates.
pub fn activity_ratio(hist: &StateHistogram) -> f32 {
    let total: usize = hist.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let third = total / 3.0;
    let spread: f64 = hist.iter().map(|&c| (c as f64 - third).abs()).sum();
    ((1.0 - spread / total) as f32).clamp(0.0, 1.0)
}

/// Reverb time in seconds: 0.15 s for an ordered field, 0.70 s for a uniform one.
pub fn reverb_time_for(entropy: f32) -> f32 {
    0.15 + entropy.clamp(0.0, 1.0) * 0.55
}

/// LFO rate in Hz: 0.3 Hz (slow) to 1.5 Hz (fast).
pub fn lfo_rate_for(entropy: f32) -> f32 {
    0.3 + entropy.clamp(0.0, 1.0) * 1.2
}

/// LFO depth in Hz of deviation: ±10 Hz to ±50 Hz.
pub fn lfo_depth_for(entropy: f32) -> f32 {
    10.0 + entropy.clamp(0.0, 1.0) * 40.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn single_state_is_zero() {
        for n in [1, 3, 100, 19_200] {
            assert_eq!(entropy(&[n, 0, 0]), 0.0);
            assert_eq!(entropy(&[0, n, 0]), 0.0);
            assert_eq!(entropy(&[0, 0, n]), 0.0);
        }
    }

    #[test]
    fn uniform_is_one() {
        for n in [3, 99, 300, 19_200] {
            assert_abs_diff_eq!(entropy(&[n / 3, n / 3, n / 3]), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn two_equal_states() {
        // log2(2) / log2(3)
        assert_abs_diff_eq!(entropy(&[50, 50, 0]), 0.630_93, epsilon = 1e-4);
    }

    #[test]
    fn empty_histogram_is_zero() {
        assert_eq!(entropy(&[0, 0, 0]), 0.0);
        assert_eq!(activity_ratio(&[0, 0, 0]), 0.0);
    }

    #[test]
    fn activity_ratio_bounds() {
        assert_abs_diff_eq!(activity_ratio(&[10, 10, 10]), 1.0, epsilon = 1e-6);
        // |30-10| + |0-10| + |0-10| = 40 > 30, clamps to zero
        assert_eq!(activity_ratio(&[30, 0, 0]), 0.0);
        assert_abs_diff_eq!(activity_ratio(&[15, 15, 0]), 1.0 - 20.0 / 30.0, epsilon = 1e-6);
    }

    #[test]
    fn parameter_maps_hit_endpoints() {
        assert_abs_diff_eq!(reverb_time_for(0.0), 0.15);
        assert_abs_diff_eq!(reverb_time_for(1.0), 0.70, epsilon = 1e-6);
        assert_abs_diff_eq!(lfo_rate_for(0.0), 0.3);
        assert_abs_diff_eq!(lfo_rate_for(1.0), 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(lfo_depth_for(0.0), 10.0);
        assert_abs_diff_eq!(lfo_depth_for(1.0), 50.0);
        assert_abs_diff_eq!(lfo_depth_for(7.0), 50.0);
    }
}
