mod common;

use approx::assert_abs_diff_eq;
use ndarray::{s, Array2};

use zogy_core::error::ZogyError;
use zogy_core::fft::Fft2d;
use zogy_core::psf::PsfFieldModel;
use zogy_core::stats::mean_std;
use zogy_core::transform::{astrometric_variance, corrected_significance, subtract, TileInputs};

use common::{delta_kernel, gaussian_kernel, gaussian_noise};

fn inputs<'a>(
    reference: &'a Array2<f64>,
    new: &'a Array2<f64>,
    psf: &'a Array2<f64>,
    variance: &'a Array2<f64>,
    noise: f64,
) -> TileInputs<'a> {
    TileInputs {
        reference,
        new,
        psf_ref: psf,
        psf_new: psf,
        noise_ref: noise,
        noise_new: noise,
        flux_ref: 1.0,
        flux_new: 1.0,
        var_ref: variance,
        var_new: variance,
        dx: 0.0,
        dy: 0.0,
    }
}

#[test]
fn test_noise_only_scorr_is_unit_normal() {
    let n = 512;
    let border = 16;
    let sigma = 10.0;
    let reference = gaussian_noise(n, n, sigma, 1);
    let new = gaussian_noise(n, n, sigma, 2);
    let psf = delta_kernel(n);
    let variance = Array2::from_elem((n, n), sigma * sigma);
    let fft = Fft2d::new(n, n);

    let result = subtract(&inputs(&reference, &new, &psf, &variance, sigma), &fft).unwrap();
    let inner: Vec<f64> = result
        .scorr
        .slice(s![border..n - border, border..n - border])
        .iter()
        .copied()
        .collect();
    let (mean, std) = mean_std(&inner);
    assert!(mean.abs() < 0.1, "mean {mean}");
    assert!((std - 1.0).abs() < 0.1, "std {std}");
}

#[test]
fn test_identical_images_give_zero_difference() {
    let n = 64;
    let psf = PsfFieldModel::constant(gaussian_kernel(16, 2.0), 1.0)
        .unwrap()
        .sample(0.0, 0.0, n)
        .unwrap()
        .shifted;
    let mut image = Array2::<f64>::zeros((n, n));
    image[[30, 20]] = 5000.0;
    image[[10, 40]] = 800.0;
    let variance = image.mapv(|v| v + 25.0);
    let fft = Fft2d::new(n, n);

    let result = subtract(&inputs(&image, &image, &psf, &variance, 5.0), &fft).unwrap();
    for &v in result.d.iter().chain(result.s.iter()).chain(result.scorr.iter()) {
        assert!(v.abs() < 1e-8, "residual {v}");
    }
}

#[test]
fn test_difference_normalization_with_delta_kernels() {
    let n = 32;
    let psf = delta_kernel(n);
    let reference = Array2::<f64>::zeros((n, n));
    let mut new = Array2::<f64>::zeros((n, n));
    new[[12, 7]] = 100.0;
    let variance = Array2::from_elem((n, n), 4.0);
    let fft = Fft2d::new(n, n);

    let result = subtract(&inputs(&reference, &new, &psf, &variance, 2.0), &fft).unwrap();
    // D = N - R for equal noise, unit fluxes and delta kernels.
    assert_abs_diff_eq!(result.d[[12, 7]], 100.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.d[[0, 0]], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.fd, 1.0 / 8.0f64.sqrt(), epsilon = 1e-12);
}

#[test]
fn test_transient_peaks_in_scorr() {
    let n = 128;
    let psf = PsfFieldModel::constant(gaussian_kernel(16, 2.0), 1.0)
        .unwrap()
        .sample(0.0, 0.0, n)
        .unwrap()
        .shifted;
    let reference = Array2::<f64>::zeros((n, n));
    let mut new = Array2::<f64>::zeros((n, n));
    new[[70, 50]] = 2000.0;
    let variance = Array2::from_elem((n, n), 25.0);
    let fft = Fft2d::new(n, n);

    let result = subtract(&inputs(&reference, &new, &psf, &variance, 5.0), &fft).unwrap();
    let peak = result.scorr[[70, 50]];
    assert!(peak > 5.0, "peak {peak}");
    assert!(result.scorr[[20, 100]].abs() < 1e-6);
}

#[test]
fn test_zero_variance_leaves_s_unchanged() {
    let n = 32;
    let psf = delta_kernel(n);
    let reference = Array2::<f64>::zeros((n, n));
    let mut new = Array2::<f64>::zeros((n, n));
    new[[5, 5]] = 10.0;
    let variance = Array2::<f64>::zeros((n, n));
    let fft = Fft2d::new(n, n);

    let result = subtract(&inputs(&reference, &new, &psf, &variance, 1.0), &fft).unwrap();
    assert_eq!(result.scorr, result.s);
    assert!(result.scorr.iter().all(|v| v.is_finite()));
}

#[test]
fn test_shape_mismatch_rejected() {
    let a = Array2::<f64>::zeros((32, 32));
    let b = Array2::<f64>::zeros((32, 16));
    let fft = Fft2d::new(32, 32);
    let err = subtract(&inputs(&a, &b, &a, &a, 1.0), &fft).unwrap_err();
    assert!(matches!(err, ZogyError::ShapeMismatch { .. }));
}

#[test]
fn test_astrometric_variance_axis_pairing() {
    // S increases by 1 per column.
    let ramp_cols = Array2::from_shape_fn((8, 8), |(_, c)| c as f64);
    let v = astrometric_variance(&ramp_cols, 2.0, 0.0);
    assert_abs_diff_eq!(v[[3, 4]], 4.0, epsilon = 1e-12);
    let v = astrometric_variance(&ramp_cols, 0.0, 2.0);
    assert_abs_diff_eq!(v[[3, 4]], 0.0, epsilon = 1e-12);

    // S increases by 1 per row.
    let ramp_rows = Array2::from_shape_fn((8, 8), |(r, _)| r as f64);
    let v = astrometric_variance(&ramp_rows, 0.0, 3.0);
    assert_abs_diff_eq!(v[[3, 4]], 9.0, epsilon = 1e-12);
}

#[test]
fn test_corrected_significance_guard() {
    assert_eq!(corrected_significance(3.0, 0.0), 3.0);
    assert_eq!(corrected_significance(3.0, -1.0), 3.0);
    assert_eq!(corrected_significance(3.0, 9.0), 1.0);
}
