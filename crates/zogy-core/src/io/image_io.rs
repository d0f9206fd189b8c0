use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::Result;
use crate::stats::sigma_clipped_stats;

/// Display limits for a quick-look rendering: clipped median -3σ / +10σ.
pub fn quicklook_limits(data: &Array2<f32>) -> (f32, f32) {
    let values: Vec<f64> = data.iter().map(|&v| v as f64).collect();
    let stats = sigma_clipped_stats(&values, 3.0, 5);
    if !(stats.median.is_finite() && stats.std_dev.is_finite()) || stats.std_dev <= 0.0 {
        return (-1.0, 1.0);
    }
    (
        (stats.median - 3.0 * stats.std_dev) as f32,
        (stats.median + 10.0 * stats.std_dev) as f32,
    )
}

/// Save a raster as 8-bit grayscale PNG with a linear stretch between `lo`
/// and `hi`. Row 0 is written at the bottom, the usual orientation for sky
/// images.
pub fn save_quicklook_png(data: &Array2<f32>, path: &Path, lo: f32, hi: f32) -> Result<()> {
    let (h, w) = data.dim();
    let span = if hi > lo { hi - lo } else { 1.0 };

    let mut img = GrayImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let v = data[[row, col]];
            let t = if v.is_finite() { ((v - lo) / span).clamp(0.0, 1.0) } else { 0.0 };
            img.put_pixel(col as u32, (h - 1 - row) as u32, Luma([(t * 255.0) as u8]));
        }
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
