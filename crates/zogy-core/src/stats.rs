//! Robust scalar statistics used for flux-ratio, offset and noise estimates.

use serde::{Deserialize, Serialize};

/// Location and scale of a sample after sigma clipping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClippedStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// Number of values that survived clipping.
    pub count: usize,
}

/// Median of a sample; `NaN` for an empty one.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    median_of_sorted(&sorted)
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Median without a full sort; reorders `values`.
///
/// Uses `select_nth_unstable_by` for O(n) selection. Even-length samples
/// average the two middle values.
pub fn median_mut(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let lower_max = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        0.5 * (lower_max + upper)
    }
}

/// Mean and population standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

pub fn std_dev(values: &[f64]) -> f64 {
    mean_std(values).1
}

/// Combine the median and the spread of a sample into a single magnitude:
/// `sqrt(median^2 + std^2)`.
pub fn effective_magnitude(values: &[f64]) -> f64 {
    let m = median(values);
    let s = std_dev(values);
    (m * m + s * s).sqrt()
}

/// Iterative sigma clipping around the median.
///
/// Each pass rejects values further than `sigma` standard deviations from
/// the median of the surviving sample. Stops after `iterations` passes or
/// as soon as a pass rejects nothing.
pub fn sigma_clipped_stats(values: &[f64], sigma: f64, iterations: usize) -> ClippedStats {
    let mut kept: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if kept.is_empty() {
        return ClippedStats {
            mean: f64::NAN,
            median: f64::NAN,
            std_dev: f64::NAN,
            count: 0,
        };
    }
    kept.sort_by(|a, b| a.total_cmp(b));

    for _ in 0..iterations {
        let center = median_of_sorted(&kept);
        let (_, std) = mean_std(&kept);
        if std < 1e-300 {
            break;
        }
        let lo = center - sigma * std;
        let hi = center + sigma * std;
        let before = kept.len();
        kept.retain(|&v| v >= lo && v <= hi);
        if kept.len() == before || kept.is_empty() {
            break;
        }
    }

    if kept.is_empty() {
        // Everything rejected in one pass: report the unclipped sample.
        kept = values.iter().copied().filter(|v| v.is_finite()).collect();
        kept.sort_by(|a, b| a.total_cmp(b));
    }

    let (mean, std_dev) = mean_std(&kept);
    ClippedStats {
        mean,
        median: median_of_sorted(&kept),
        std_dev,
        count: kept.len(),
    }
}
