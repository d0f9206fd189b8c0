use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZogyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON artifact error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("FITS error: {0}")]
    Fits(String),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{what} must be even in both dimensions, got {height}x{width}")]
    OddDimension {
        what: &'static str,
        height: usize,
        width: usize,
    },

    #[error("PSF kernel {kernel}x{kernel} does not fit in a {padded}x{padded} tile buffer")]
    KernelTooLarge { kernel: usize, padded: usize },

    #[error("Malformed PSF field model: {0}")]
    MalformedPsfModel(String),

    #[error("PSF kernel sum is not positive and finite ({0})")]
    DegeneratePsf(f64),

    #[error("Missing required artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Measured background mode needs a background raster for the {0} frame")]
    MissingBackground(&'static str),

    #[error("No sky coordinate for detection {0}")]
    MissingSkyCoordinate(u64),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

pub type Result<T> = std::result::Result<T, ZogyError>;
