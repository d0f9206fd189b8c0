#![allow(dead_code)]

use std::collections::HashMap;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use zogy_core::catalog::{Catalog, Detection};
use zogy_core::psf::PsfFieldModel;
use zogy_core::wcs::SkyCoord;

/// Unit-sum Gaussian kernel of `size x size`, centered at `(size - 1) / 2`.
pub fn gaussian_kernel(size: usize, sigma: f64) -> Array2<f64> {
    let c = (size as f64 - 1.0) / 2.0;
    let mut k = Array2::from_shape_fn((size, size), |(r, col)| {
        let dy = r as f64 - c;
        let dx = col as f64 - c;
        (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp()
    });
    let sum = k.sum();
    k.mapv_inplace(|v| v / sum);
    k
}

/// Spatially constant Gaussian PSF model at native sampling.
pub fn gaussian_psf(size: usize, sigma: f64) -> PsfFieldModel {
    PsfFieldModel::constant(gaussian_kernel(size, sigma), 1.0).unwrap()
}

/// Seeded white Gaussian noise.
pub fn gaussian_noise(height: usize, width: usize, sigma: f64, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sigma).unwrap();
    Array2::from_shape_fn((height, width), |_| normal.sample(&mut rng))
}

/// Add `flux * kernel` with the kernel's top-left corner at
/// `(y - kh / 2, x - kw / 2)`.
pub fn add_source(data: &mut Array2<f32>, kernel: &Array2<f64>, x: usize, y: usize, flux: f64) {
    let (kh, kw) = kernel.dim();
    let (y0, x0) = (y - kh / 2, x - kw / 2);
    for ((r, c), &v) in kernel.indexed_iter() {
        data[[y0 + r, x0 + c]] += (flux * v) as f32;
    }
}

/// Padded delta kernel already rolled to index `(0, 0)`.
pub fn delta_kernel(size: usize) -> Array2<f64> {
    let mut k = Array2::<f64>::zeros((size, size));
    k[[0, 0]] = 1.0;
    k
}

/// Catalog with explicit sky coordinates: `(id, ra, dec, flux)`.
pub fn sky_catalog(entries: &[(u64, f64, f64, f64)]) -> Catalog {
    let detections = entries
        .iter()
        .map(|&(id, _, _, flux)| Detection {
            id,
            x: 0.0,
            y: 0.0,
            flux,
        })
        .collect();
    let sky: HashMap<u64, SkyCoord> = entries
        .iter()
        .map(|&(id, ra, dec, _)| (id, SkyCoord { ra, dec }))
        .collect();
    Catalog::new(detections, sky)
}

/// Coordinates of the maximum element.
pub fn argmax(data: &Array2<f32>) -> (usize, usize) {
    let mut best = ((0, 0), f32::NEG_INFINITY);
    for (idx, &v) in data.indexed_iter() {
        if v > best.1 {
            best = (idx, v);
        }
    }
    best.0
}
