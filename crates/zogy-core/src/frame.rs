use ndarray::Array2;

use crate::consts::DEFAULT_PIXEL_SCALE;

/// A full-resolution raster plus the detector metadata needed to turn it
/// into electrons and a noise model.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data in ADU, row-major, shape = (height, width)
    pub data: Array2<f32>,
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(data: Array2<f32>, metadata: FrameMetadata) -> Self {
        Self { data, metadata }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Pixel data converted to electrons.
    pub fn electrons(&self) -> Array2<f32> {
        let gain = self.metadata.gain as f32;
        self.data.mapv(|v| v * gain)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameMetadata {
    /// Electrons per ADU.
    pub gain: f64,
    /// Read noise in electrons.
    pub read_noise: f64,
    /// Saturation level in ADU. Reported with the run summary; the
    /// subtraction itself does not mask saturated pixels.
    pub saturation: f64,
    /// Arcseconds per pixel.
    pub pixel_scale: f64,
}

impl Default for FrameMetadata {
    fn default() -> Self {
        Self {
            gain: 1.0,
            read_noise: 0.0,
            saturation: f64::INFINITY,
            pixel_scale: DEFAULT_PIXEL_SCALE,
        }
    }
}
