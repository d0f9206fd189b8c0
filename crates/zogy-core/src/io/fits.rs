//! FITS rasters through `fitrs`.
//!
//! Only the primary HDU is used. Integer data is scaled by `BSCALE`/`BZERO`
//! into physical values; blank integer pixels become `NaN`.

use std::path::Path;

use fitrs::{Fits, FitsData, FitsDataArray, Hdu, HeaderValue};
use ndarray::Array2;
use num_traits::ToPrimitive;
use tracing::debug;

use crate::error::{Result, ZogyError};
use crate::frame::{Frame, FrameMetadata};

fn header_f64(hdu: &Hdu, key: &str) -> Option<f64> {
    match hdu.value(key)? {
        HeaderValue::IntegerNumber(n) => Some(*n as f64),
        HeaderValue::RealFloatingNumber(f) => Some(*f),
        _ => None,
    }
}

fn header_dim(hdu: &Hdu, key: &str) -> Result<usize> {
    match hdu.value(key) {
        Some(HeaderValue::IntegerNumber(n)) if *n > 0 => Ok(*n as usize),
        Some(_) => Err(ZogyError::Fits(format!("{key} is not a positive integer"))),
        None => Err(ZogyError::Fits(format!("missing {key} header"))),
    }
}

fn scaled<T: ToPrimitive>(raw: Option<&T>, bscale: f64, bzero: f64) -> f32 {
    raw.and_then(|v| v.to_f64())
        .map_or(f32::NAN, |v| (bzero + bscale * v) as f32)
}

fn open_primary(path: &Path) -> Result<Hdu> {
    if !path.exists() {
        return Err(ZogyError::MissingArtifact(path.to_path_buf()));
    }
    let fits = Fits::open(path)
        .map_err(|e| ZogyError::Fits(format!("{}: {e}", path.display())))?;
    fits.get(0)
        .ok_or_else(|| ZogyError::Fits(format!("{}: no primary HDU", path.display())))
}

fn raster_from_hdu(hdu: &Hdu) -> Result<Array2<f32>> {
    let naxis = header_dim(hdu, "NAXIS")?;
    if naxis < 2 {
        return Err(ZogyError::Fits(format!(
            "expected a 2D image, NAXIS = {naxis}"
        )));
    }
    let width = header_dim(hdu, "NAXIS1")?;
    let height = header_dim(hdu, "NAXIS2")?;
    let bscale = header_f64(hdu, "BSCALE").unwrap_or(1.0);
    let bzero = header_f64(hdu, "BZERO").unwrap_or(0.0);

    let pixels: Vec<f32> = match hdu.read_data() {
        FitsData::Characters(_) => {
            return Err(ZogyError::Fits("character data is not an image".into()));
        }
        FitsData::IntegersI32(FitsDataArray { data, .. }) => data
            .iter()
            .map(|v| scaled(v.as_ref(), bscale, bzero))
            .collect(),
        FitsData::IntegersU32(FitsDataArray { data, .. }) => data
            .iter()
            .map(|v| scaled(v.as_ref(), bscale, bzero))
            .collect(),
        FitsData::FloatingPoint32(FitsDataArray { data, .. }) => {
            data.iter().map(|&v| v * bscale as f32 + bzero as f32).collect()
        }
        FitsData::FloatingPoint64(FitsDataArray { data, .. }) => {
            data.iter().map(|&v| (bzero + bscale * v) as f32).collect()
        }
    };

    let expected = width * height;
    if pixels.len() < expected {
        return Err(ZogyError::Fits(format!(
            "data size mismatch: expected {expected} pixels, got {}",
            pixels.len()
        )));
    }
    // Only the first plane of a cube is used.
    let mut pixels = pixels;
    pixels.truncate(expected);
    Array2::from_shape_vec((height, width), pixels)
        .map_err(|e| ZogyError::Fits(e.to_string()))
}

/// Read the primary image of a FITS file without metadata.
pub fn read_raster(path: &Path) -> Result<Array2<f32>> {
    let hdu = open_primary(path)?;
    raster_from_hdu(&hdu)
}

/// Read a frame and its detector keywords (`GAIN`, `RDNOISE`, `SATURATE`,
/// `PIXSCALE`). Absent keywords keep their defaults.
pub fn read_frame(path: &Path) -> Result<Frame> {
    let hdu = open_primary(path)?;
    let data = raster_from_hdu(&hdu)?;

    let defaults = FrameMetadata::default();
    let metadata = FrameMetadata {
        gain: header_f64(&hdu, "GAIN").unwrap_or(defaults.gain),
        read_noise: header_f64(&hdu, "RDNOISE").unwrap_or(defaults.read_noise),
        saturation: header_f64(&hdu, "SATURATE").unwrap_or(defaults.saturation),
        pixel_scale: header_f64(&hdu, "PIXSCALE").unwrap_or(defaults.pixel_scale),
    };
    if !(metadata.gain.is_finite() && metadata.gain > 0.0) {
        return Err(ZogyError::Fits(format!(
            "{}: GAIN must be positive, got {}",
            path.display(),
            metadata.gain
        )));
    }
    debug!(
        path = %path.display(),
        height = data.nrows(),
        width = data.ncols(),
        gain = metadata.gain,
        read_noise = metadata.read_noise,
        "Loaded FITS frame"
    );
    Ok(Frame::new(data, metadata))
}

/// Write a raster as a 32-bit float primary image.
pub fn write_raster(path: &Path, data: &Array2<f32>) -> Result<()> {
    let (height, width) = data.dim();
    let pixels: Vec<f32> = data.iter().copied().collect();
    let primary = Hdu::new(&[width, height], pixels);
    Fits::create(path, primary)
        .map_err(|e| ZogyError::Fits(format!("{}: {e}", path.display())))?;
    Ok(())
}
