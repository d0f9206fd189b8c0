use ndarray::{Array2, Zip};

use crate::stats::median_mut;
use crate::tiles::Tile;

/// Background-subtracted tile image with its noise model.
#[derive(Clone, Debug)]
pub struct PreparedTile {
    /// Image in electrons with the background removed.
    pub image: Array2<f64>,
    /// Per-pixel variance: electrons + read_noise^2.
    pub variance: Array2<f64>,
    /// Median of the padded buffer before background removal.
    pub median: f64,
    /// Background noise level, `sqrt(median + read_noise^2)`.
    pub noise: f64,
}

/// Cut one tile out of a frame (in electrons) and prepare it for the transform.
///
/// The variance is taken before clamping. Non-positive pixels are replaced
/// by the buffer median, then the background (measured raster or the median)
/// is subtracted.
pub fn prepare_tile(
    tile: &Tile,
    electrons: &Array2<f32>,
    background: Option<&Array2<f32>>,
    read_noise: f64,
    padded: usize,
) -> PreparedTile {
    let mut image = tile.extract(electrons, padded);
    let rn2 = read_noise * read_noise;
    let variance = image.mapv(|v| v + rn2);

    let mut scratch: Vec<f64> = image.iter().copied().collect();
    let median = median_mut(&mut scratch);
    let noise = (median.max(0.0) + rn2).sqrt();

    image.mapv_inplace(|v| if v <= 0.0 { median } else { v });

    match background {
        Some(bkg) => {
            let bkg_tile = tile.extract(bkg, padded);
            Zip::from(&mut image).and(&bkg_tile).for_each(|v, &b| *v -= b);
        }
        None => image.mapv_inplace(|v| v - median),
    }

    PreparedTile {
        image,
        variance,
        median,
        noise,
    }
}
