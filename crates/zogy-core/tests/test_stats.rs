use approx::assert_abs_diff_eq;

use zogy_core::stats::{effective_magnitude, mean_std, median, median_mut, sigma_clipped_stats};

#[test]
fn test_median_odd_and_even() {
    assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    assert!(median(&[]).is_nan());
}

#[test]
fn test_median_mut_agrees_with_sorting_median() {
    let values: Vec<f64> = (0..101).map(|i| ((i * 37) % 101) as f64 * 0.5 - 7.0).collect();
    let mut scratch = values.clone();
    assert_eq!(median_mut(&mut scratch), median(&values));

    let even: Vec<f64> = values[..100].to_vec();
    let mut scratch = even.clone();
    assert_eq!(median_mut(&mut scratch), median(&even));
}

#[test]
fn test_mean_std_is_population() {
    let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
    assert_abs_diff_eq!(mean, 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(std, 2.0, epsilon = 1e-12);
}

#[test]
fn test_effective_magnitude() {
    assert_abs_diff_eq!(effective_magnitude(&[3.0, 3.0, 3.0]), 3.0, epsilon = 1e-12);
    // median 0, population std sqrt(2/3)
    assert_abs_diff_eq!(effective_magnitude(&[-1.0, 0.0, 1.0, 0.0, 1.0, -1.0]), 0.816496580927726, epsilon = 1e-12);
}

#[test]
fn test_sigma_clipping_rejects_outlier() {
    let mut values = vec![1.0; 9];
    values.push(100.0);
    let stats = sigma_clipped_stats(&values, 2.0, 5);
    assert_eq!(stats.count, 9);
    assert_eq!(stats.median, 1.0);
    assert_eq!(stats.mean, 1.0);
    assert_eq!(stats.std_dev, 0.0);
}

#[test]
fn test_sigma_clipping_ignores_non_finite() {
    let stats = sigma_clipped_stats(&[1.0, 2.0, f64::NAN, 3.0, f64::INFINITY], 3.0, 5);
    assert_eq!(stats.count, 3);
    assert_eq!(stats.median, 2.0);
}

#[test]
fn test_sigma_clipping_empty() {
    let stats = sigma_clipped_stats(&[], 3.0, 5);
    assert_eq!(stats.count, 0);
    assert!(stats.median.is_nan());
}
