use approx::assert_abs_diff_eq;
use qntoy::core::entropy::{activity_ratio, entropy, lfo_depth_for, lfo_rate_for, reverb_time_for};

#[test]
fn uniform_and_pure_histograms_hit_the_bounds() {
    for n in [3usize, 30, 19_200] {
        assert_eq!(entropy(&[n, 0, 0]), 0.0);
        assert_eq!(entropy(&[0, 0, n]), 0.0);
        assert_abs_diff_eq!(entropy(&[n / 3, n / 3, n / 3]), 1.0, epsilon = 1e-6);
    }
    assert_eq!(entropy(&[0, 0, 0]), 0.0);
}

#[test]
fn two_way_split_is_log3_of_two() {
    let e = entropy(&[50, 50, 0]);
    assert_abs_diff_eq!(e, 1.0 / 3f32.log2(), epsilon = 1e-6);
}

#[test]
fn entropy_mappings_match_their_ranges() {
    assert_abs_diff_eq!(reverb_time_for(0.0), 0.15, epsilon = 1e-6);
    assert_abs_diff_eq!(reverb_time_for(1.0), 0.70, epsilon = 1e-6);
    assert_abs_diff_eq!(lfo_rate_for(1.0), 1.5, epsilon = 1e-6);
    assert_abs_diff_eq!(lfo_depth_for(0.5), 30.0, epsilon = 1e-5);
}

#[test]
fn activity_ratio_rewards_balance() {
    assert_abs_diff_eq!(activity_ratio(&[10, 10, 10]), 1.0, epsilon = 1e-6);
    // |30-10| + 2·|0-10| = 40 > total, clamped
    assert_eq!(activity_ratio(&[30, 0, 0]), 0.0);
    assert_eq!(activity_ratio(&[0, 0, 0]), 0.0);
}
