//! Frequency-domain optimal subtraction of one padded tile pair.
//!
//! With `R`, `N` the reference/new images, `Pr`, `Pn` their kernels,
//! `sr`, `sn` the background noise levels and `fr`, `fn` the flux scales
//! (hats denote 2D DFTs):
//!
//! ```text
//! den   = sn^2 fr^2 |Pr^|^2 + sr^2 fn^2 |Pn^|^2
//! D^    = (fr Pr^ N^ - fn Pn^ R^) / sqrt(den)
//! fD    = fr fn / sqrt(sn^2 fr^2 + sr^2 fn^2)
//! Pd^   = (fr fn / fD) Pr^ Pn^ / sqrt(den)
//! S^    = fD D^ conj(Pd^)
//! kr^   = fr fn^2 conj(Pr^) |Pn^|^2 / den
//! kn^   = fn fr^2 conj(Pn^) |Pr^|^2 / den
//! ```
//!
//! Frequencies where `den` vanishes contribute nothing.
//!
//! `S` is normalized by the square root of its total variance: the photon
//! noise of each image propagated through `kr^2`/`kn^2`, plus the
//! astrometric term built from the gradients of `kr*R` and `kn*N`.

use ndarray::{Array2, Zip};
use num_complex::Complex;
use num_traits::Zero;

use crate::error::{Result, ZogyError};
use crate::fft::{Fft2d, Spectrum};
use crate::psf::roll;

/// Everything the transform needs for one tile. All rasters share the padded
/// tile shape; images are background-subtracted and in electrons.
#[derive(Clone, Copy, Debug)]
pub struct TileInputs<'a> {
    pub reference: &'a Array2<f64>,
    pub new: &'a Array2<f64>,
    /// Shifted reference kernel (center at index `(0, 0)`).
    pub psf_ref: &'a Array2<f64>,
    /// Shifted new kernel (center at index `(0, 0)`).
    pub psf_new: &'a Array2<f64>,
    pub noise_ref: f64,
    pub noise_new: f64,
    pub flux_ref: f64,
    pub flux_new: f64,
    /// Per-pixel variance of the reference image.
    pub var_ref: &'a Array2<f64>,
    /// Per-pixel variance of the new image.
    pub var_new: &'a Array2<f64>,
    /// Positional offset magnitude along x (columns), pixels.
    pub dx: f64,
    /// Positional offset magnitude along y (rows), pixels.
    pub dy: f64,
}

/// Outputs for one tile, all at the padded tile shape.
#[derive(Clone, Debug)]
pub struct SubtractionResult {
    pub d: Array2<f64>,
    pub s: Array2<f64>,
    pub scorr: Array2<f64>,
    /// Variance of S from the reference image's photon noise.
    pub vsr: Array2<f64>,
    /// Variance of S from the new image's photon noise.
    pub vsn: Array2<f64>,
    /// Astrometric variance of S from the reference image.
    pub vsr_ast: Array2<f64>,
    /// Astrometric variance of S from the new image.
    pub vsn_ast: Array2<f64>,
    /// Normalization of the difference image.
    pub fd: f64,
}

impl TileInputs<'_> {
    fn check_shapes(&self, expected: (usize, usize)) -> Result<()> {
        let rasters = [
            self.reference,
            self.new,
            self.psf_ref,
            self.psf_new,
            self.var_ref,
            self.var_new,
        ];
        for raster in rasters {
            if raster.dim() != expected {
                return Err(ZogyError::ShapeMismatch {
                    expected,
                    actual: raster.dim(),
                });
            }
        }
        Ok(())
    }
}

/// Run the optimal subtraction on one tile.
pub fn subtract(inputs: &TileInputs<'_>, fft: &Fft2d) -> Result<SubtractionResult> {
    inputs.check_shapes(fft.dim())?;

    let fr = inputs.flux_ref;
    let fnew = inputs.flux_new;
    let sr2 = inputs.noise_ref * inputs.noise_ref;
    let sn2 = inputs.noise_new * inputs.noise_new;
    let fr2 = fr * fr;
    let fn2 = fnew * fnew;

    let r_hat = fft.forward(inputs.reference);
    let n_hat = fft.forward(inputs.new);
    let pr_hat = fft.forward(inputs.psf_ref);
    let pn_hat = fft.forward(inputs.psf_new);
    let pr2 = pr_hat.mapv(|c| c.norm_sqr());
    let pn2 = pn_hat.mapv(|c| c.norm_sqr());

    let denominator = Zip::from(&pr2)
        .and(&pn2)
        .map_collect(|&a, &b| sn2 * fr2 * a + sr2 * fn2 * b);
    let sqrt_den = denominator.mapv(f64::sqrt);

    let fd = fr * fnew / (sn2 * fr2 + sr2 * fn2).sqrt();

    // Difference image.
    let d_hat = Zip::from(&pr_hat)
        .and(&n_hat)
        .and(&pn_hat)
        .and(&r_hat)
        .and(&sqrt_den)
        .map_collect(|&pr, &n, &pn, &r, &sd| {
            if sd > 0.0 {
                (pr * n * fr - pn * r * fnew) / sd
            } else {
                Complex::zero()
            }
        });
    let mut d = fft.inverse_real(&d_hat);
    d.mapv_inplace(|v| v / fd);

    // Significance image via the difference-image PSF.
    let pd_scale = fr * fnew / fd;
    let pd_hat = Zip::from(&pr_hat)
        .and(&pn_hat)
        .and(&sqrt_den)
        .map_collect(|&pr, &pn, &sd| {
            if sd > 0.0 {
                pr * pn * (pd_scale / sd)
            } else {
                Complex::zero()
            }
        });
    let s_hat = Zip::from(&d_hat)
        .and(&pd_hat)
        .map_collect(|&dh, &pd| dh * pd.conj() * fd);
    let s = fft.inverse_real(&s_hat);

    // Per-image matched-filter kernels.
    let kr_hat = Zip::from(&pr_hat)
        .and(&pn2)
        .and(&denominator)
        .map_collect(|&pr, &abs_pn2, &den| kernel_term(pr, fr * fn2 * abs_pn2, den));
    let kn_hat = Zip::from(&pn_hat)
        .and(&pr2)
        .and(&denominator)
        .map_collect(|&pn, &abs_pr2, &den| kernel_term(pn, fnew * fr2 * abs_pr2, den));

    let vsr = propagate_variance(fft, &kr_hat, inputs.var_ref);
    let vsn = propagate_variance(fft, &kn_hat, inputs.var_new);

    let sr = fft.inverse_real(&(&kr_hat * &r_hat));
    let sn = fft.inverse_real(&(&kn_hat * &n_hat));
    let vsr_ast = astrometric_variance(&sr, inputs.dx, inputs.dy);
    let vsn_ast = astrometric_variance(&sn, inputs.dx, inputs.dy);

    let scorr = Zip::from(&s)
        .and(&vsr)
        .and(&vsn)
        .and(&vsr_ast)
        .and(&vsn_ast)
        .map_collect(|&sig, &a, &b, &c, &e| corrected_significance(sig, a + b + c + e));

    Ok(SubtractionResult {
        d,
        s,
        scorr,
        vsr,
        vsn,
        vsr_ast,
        vsn_ast,
        fd,
    })
}

/// `conj(p) * weight / den`, zero where the denominator vanishes.
fn kernel_term(p: Complex<f64>, weight: f64, den: f64) -> Complex<f64> {
    if den > 0.0 {
        p.conj() * (weight / den)
    } else {
        Complex::zero()
    }
}

/// Convolve a variance map with the square of a kernel given by its spectrum.
fn propagate_variance(fft: &Fft2d, kernel_hat: &Spectrum, variance: &Array2<f64>) -> Array2<f64> {
    let kernel = fft.inverse_real(kernel_hat);
    let kernel2_hat = fft.forward(&kernel.mapv(|k| k * k));
    let var_hat = fft.forward(variance);
    fft.inverse_real(&(&var_hat * &kernel2_hat))
}

/// Variance from residual misregistration: squared first differences of
/// `s` along each axis weighted by the squared offset along that axis.
pub fn astrometric_variance(s: &Array2<f64>, dx: f64, dy: f64) -> Array2<f64> {
    let along_cols = roll(s, 0, 1);
    let along_rows = roll(s, 1, 0);
    let dx2 = dx * dx;
    let dy2 = dy * dy;
    Zip::from(s)
        .and(&along_cols)
        .and(&along_rows)
        .map_collect(|&v, &left, &up| {
            let ds_dx = v - left;
            let ds_dy = v - up;
            dx2 * ds_dx * ds_dx + dy2 * ds_dy * ds_dy
        })
}

/// `S / sqrt(V)` where the variance is positive, `S` unchanged otherwise.
pub fn corrected_significance(s: f64, variance: f64) -> f64 {
    if variance > 0.0 {
        s / variance.sqrt()
    } else {
        s
    }
}

