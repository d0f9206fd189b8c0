use std::sync::Arc;

use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis, Zip};
use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

pub type Spectrum = Array2<Complex<f64>>;

/// Planned 2D DFT for one fixed raster shape.
///
/// All tiles of a run share the padded tile shape, so the plans are built
/// once and shared by every tile worker.
pub struct Fft2d {
    height: usize,
    width: usize,
    row_forward: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl Fft2d {
    pub fn new(height: usize, width: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            height,
            width,
            row_forward: planner.plan_fft_forward(width),
            col_forward: planner.plan_fft_forward(height),
            row_inverse: planner.plan_fft_inverse(width),
            col_inverse: planner.plan_fft_inverse(height),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Forward transform of a real raster.
    pub fn forward(&self, data: &Array2<f64>) -> Spectrum {
        debug_assert_eq!(data.dim(), self.dim());
        let mut work = data.mapv(|v| Complex::new(v, 0.0));
        self.forward_in_place(&mut work);
        work
    }

    pub fn forward_in_place(&self, work: &mut Spectrum) {
        let parallel = self.is_parallel();
        transform_lanes(work, &self.row_forward, Axis(1), parallel);
        transform_lanes(work, &self.col_forward, Axis(0), parallel);
    }

    /// Inverse transform, returning the real part normalized by `1/(h*w)`.
    pub fn inverse_real(&self, spectrum: &Spectrum) -> Array2<f64> {
        debug_assert_eq!(spectrum.dim(), self.dim());
        let parallel = self.is_parallel();
        let mut work = spectrum.clone();
        transform_lanes(&mut work, &self.col_inverse, Axis(0), parallel);
        transform_lanes(&mut work, &self.row_inverse, Axis(1), parallel);

        let scale = 1.0 / (self.height * self.width) as f64;
        work.mapv(|c| c.re * scale)
    }

    fn is_parallel(&self) -> bool {
        self.height * self.width >= PARALLEL_PIXEL_THRESHOLD
    }
}

/// Run a 1D transform over every lane along `axis`.
fn transform_lanes(work: &mut Spectrum, fft: &Arc<dyn Fft<f64>>, axis: Axis, parallel: bool) {
    let process = |mut lane: ArrayViewMut1<Complex<f64>>| {
        let mut buffer = lane.to_vec();
        fft.process(&mut buffer);
        lane.assign(&ArrayView1::from(&buffer[..]));
    };

    if parallel {
        Zip::from(work.lanes_mut(axis)).par_for_each(process);
    } else {
        Zip::from(work.lanes_mut(axis)).for_each(process);
    }
}
