//! Spatially varying PSF model and per-tile kernel sampling.
//!
//! The field model is a polynomial in normalized frame coordinates whose
//! coefficients are images:
//!
//! ```text
//! psf(x, y) = sum_k  C_k * xn^i_k * yn^j_k,   xn = (x - zero_x) / scale_x
//! ```
//!
//! Sampling a kernel for a tile evaluates the polynomial at the tile center,
//! zooms it from the model's native sampling to image pixels, normalizes it
//! to unit sum, embeds it in the middle of a padded tile-sized buffer and
//! rolls it so the kernel center sits at index `(0, 0)`.

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, ZogyError};

/// On-disk form of a fitted PSF field, as written by the external PSF fitter.
///
/// `coefficients` are listed in the fitter's term order: for each y exponent
/// `j` in `0..=degree`, x exponents `0..=degree - j`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PsfArtifact {
    pub degree: usize,
    /// Polynomial origin `[x, y]` in pixels.
    pub pol_zero: [f64; 2],
    /// Polynomial scale `[x, y]` in pixels.
    pub pol_scale: [f64; 2],
    /// Image pixels per model pixel.
    pub sampling: f64,
    #[serde(default)]
    pub fwhm: Option<f64>,
    /// One row-major image per term: `coefficients[term][row][col]`.
    pub coefficients: Vec<Vec<Vec<f64>>>,
}

/// One polynomial term: `image * xn^x_exp * yn^y_exp`.
#[derive(Clone, Debug)]
pub struct PsfTerm {
    pub x_exp: u32,
    pub y_exp: u32,
    pub image: Array2<f64>,
}

#[derive(Clone, Debug)]
pub struct PsfFieldModel {
    pub degree: usize,
    pub terms: Vec<PsfTerm>,
    pub pol_zero: [f64; 2],
    pub pol_scale: [f64; 2],
    pub sampling: f64,
    pub fwhm: Option<f64>,
}

/// Kernel for one tile.
#[derive(Clone, Debug)]
pub struct SampledPsf {
    /// Padded kernel with its center rolled to `(0, 0)`.
    pub shifted: Array2<f64>,
    /// Padded kernel centered in the buffer (diagnostics only).
    pub centered: Array2<f64>,
}

/// Exponent pairs `(x_exp, y_exp)` of a degree-`degree` polynomial in term order.
pub fn term_exponents(degree: usize) -> Vec<(u32, u32)> {
    let mut exps = Vec::with_capacity((degree + 1) * (degree + 2) / 2);
    for j in 0..=degree {
        for i in 0..=(degree - j) {
            exps.push((i as u32, j as u32));
        }
    }
    exps
}

impl PsfFieldModel {
    /// Build a model from coefficient images given in term order.
    pub fn new(
        degree: usize,
        images: Vec<Array2<f64>>,
        pol_zero: [f64; 2],
        pol_scale: [f64; 2],
        sampling: f64,
    ) -> Result<Self> {
        if degree > 3 {
            return Err(ZogyError::MalformedPsfModel(format!(
                "polynomial degree {degree} is not supported (0..=3)"
            )));
        }
        let exps = term_exponents(degree);
        if images.len() != exps.len() {
            return Err(ZogyError::MalformedPsfModel(format!(
                "degree {degree} needs {} coefficient images, got {}",
                exps.len(),
                images.len()
            )));
        }
        let shape = images[0].dim();
        if shape.0 == 0 || shape.1 == 0 {
            return Err(ZogyError::MalformedPsfModel("empty coefficient image".into()));
        }
        if let Some(bad) = images.iter().find(|img| img.dim() != shape) {
            return Err(ZogyError::MalformedPsfModel(format!(
                "coefficient images differ in shape: {shape:?} vs {:?}",
                bad.dim()
            )));
        }
        if degree > 0 && (pol_scale[0] == 0.0 || pol_scale[1] == 0.0) {
            return Err(ZogyError::MalformedPsfModel("zero polynomial scale".into()));
        }
        if !(sampling.is_finite() && sampling > 0.0) {
            return Err(ZogyError::MalformedPsfModel(format!(
                "invalid PSF sampling {sampling}"
            )));
        }

        let terms = exps
            .into_iter()
            .zip(images)
            .map(|((x_exp, y_exp), image)| PsfTerm {
                x_exp,
                y_exp,
                image,
            })
            .collect();

        Ok(Self {
            degree,
            terms,
            pol_zero,
            pol_scale,
            sampling,
            fwhm: None,
        })
    }

    /// A spatially constant PSF.
    pub fn constant(image: Array2<f64>, sampling: f64) -> Result<Self> {
        Self::new(0, vec![image], [0.0, 0.0], [1.0, 1.0], sampling)
    }

    pub fn from_artifact(artifact: PsfArtifact) -> Result<Self> {
        let images = artifact
            .coefficients
            .into_iter()
            .enumerate()
            .map(|(k, rows)| rows_to_array(k, rows))
            .collect::<Result<Vec<_>>>()?;
        let mut model = Self::new(
            artifact.degree,
            images,
            artifact.pol_zero,
            artifact.pol_scale,
            artifact.sampling,
        )?;
        model.fwhm = artifact.fwhm;
        Ok(model)
    }

    /// Shape of the native-sampling PSF image.
    pub fn native_dim(&self) -> (usize, usize) {
        self.terms[0].image.dim()
    }

    /// Evaluate the polynomial at frame position `(x, y)`, native sampling.
    pub fn evaluate(&self, x: f64, y: f64) -> Array2<f64> {
        let xn = (x - self.pol_zero[0]) / self.pol_scale[0];
        let yn = (y - self.pol_zero[1]) / self.pol_scale[1];

        let mut psf = Array2::<f64>::zeros(self.native_dim());
        for term in &self.terms {
            let weight = xn.powi(term.x_exp as i32) * yn.powi(term.y_exp as i32);
            psf.scaled_add(weight, &term.image);
        }
        psf
    }

    /// Sample the kernel for a tile centered at `(x, y)` (already expressed in
    /// the frame the model was fitted on) into a `padded x padded` buffer.
    pub fn sample(&self, x: f64, y: f64, padded: usize) -> Result<SampledPsf> {
        if padded % 2 != 0 {
            warn!(padded, "padded tile size is not even");
            return Err(ZogyError::OddDimension {
                what: "padded tile",
                height: padded,
                width: padded,
            });
        }

        let native = self.evaluate(x, y);
        let mut kernel = zoom(&native, self.sampling);
        let (kh, kw) = kernel.dim();
        if kh % 2 != 0 || kw % 2 != 0 {
            warn!(kh, kw, "resampled PSF kernel is not even in both dimensions");
            return Err(ZogyError::OddDimension {
                what: "resampled PSF kernel",
                height: kh,
                width: kw,
            });
        }
        if kh > padded || kw > padded {
            return Err(ZogyError::KernelTooLarge {
                kernel: kh.max(kw),
                padded,
            });
        }

        let sum = kernel.sum();
        if !(sum.is_finite() && sum > 0.0) {
            return Err(ZogyError::DegeneratePsf(sum));
        }
        kernel.mapv_inplace(|v| v / sum);

        let c = padded / 2;
        let mut centered = Array2::<f64>::zeros((padded, padded));
        centered
            .slice_mut(s![c - kh / 2..c + kh / 2, c - kw / 2..c + kw / 2])
            .assign(&kernel);
        let shifted = fftshift(&centered);

        Ok(SampledPsf { shifted, centered })
    }
}

fn rows_to_array(term: usize, rows: Vec<Vec<f64>>) -> Result<Array2<f64>> {
    let h = rows.len();
    let w = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != w) {
        return Err(ZogyError::MalformedPsfModel(format!(
            "coefficient image {term} has ragged rows"
        )));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((h, w), flat).map_err(|e| {
        ZogyError::MalformedPsfModel(format!("coefficient image {term}: {e}"))
    })
}

/// Resize by `factor` with corner-aligned bilinear interpolation.
///
/// Output size is `round(n * factor)` per axis; output index `o` samples the
/// input at `o * (n - 1) / (m - 1)`, so the corners map onto each other.
pub fn zoom(image: &Array2<f64>, factor: f64) -> Array2<f64> {
    let (h, w) = image.dim();
    let out_h = ((h as f64 * factor).round() as usize).max(1);
    let out_w = ((w as f64 * factor).round() as usize).max(1);
    if out_h == h && out_w == w {
        return image.clone();
    }

    let step = |n: usize, m: usize| {
        if m > 1 {
            (n - 1) as f64 / (m - 1) as f64
        } else {
            0.0
        }
    };
    let sy = step(h, out_h);
    let sx = step(w, out_w);

    Array2::from_shape_fn((out_h, out_w), |(r, c)| {
        bilinear_sample_clamped(image, r as f64 * sy, c as f64 * sx)
    })
}

fn bilinear_sample_clamped(data: &Array2<f64>, y: f64, x: f64) -> f64 {
    let (h, w) = data.dim();
    let y = y.clamp(0.0, (h - 1) as f64);
    let x = x.clamp(0.0, (w - 1) as f64);

    let y0 = y.floor() as usize;
    let x0 = x.floor() as usize;
    let y1 = (y0 + 1).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let fy = y - y0 as f64;
    let fx = x - x0 as f64;

    data[[y0, x0]] * (1.0 - fx) * (1.0 - fy)
        + data[[y0, x1]] * fx * (1.0 - fy)
        + data[[y1, x0]] * (1.0 - fx) * fy
        + data[[y1, x1]] * fx * fy
}

/// Cyclic shift: element `[r, c]` moves to `[r + dy, c + dx]` (mod shape).
pub fn roll(data: &Array2<f64>, dy: isize, dx: isize) -> Array2<f64> {
    let (h, w) = data.dim();
    if h == 0 || w == 0 {
        return data.clone();
    }
    let dy = dy.rem_euclid(h as isize) as usize;
    let dx = dx.rem_euclid(w as isize) as usize;
    Array2::from_shape_fn((h, w), |(r, c)| {
        data[[(r + h - dy) % h, (c + w - dx) % w]]
    })
}

/// Move the buffer center to index `(0, 0)`.
pub fn fftshift(data: &Array2<f64>) -> Array2<f64> {
    let (h, w) = data.dim();
    roll(data, (h / 2) as isize, (w / 2) as isize)
}

/// Inverse of [`fftshift`].
pub fn ifftshift(data: &Array2<f64>) -> Array2<f64> {
    let (h, w) = data.dim();
    roll(data, -((h / 2) as isize), -((w / 2) as isize))
}
