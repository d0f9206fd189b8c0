use serde::{Deserialize, Serialize};

use crate::catalog::MatchConfig;
use crate::consts::{
    DEFAULT_CLIP_ITERATIONS, DEFAULT_FLUX_RATIO_CLIP_SIGMA, DEFAULT_OFFSET_FALLBACK_FACTOR,
    DEFAULT_TILE_BORDER, DEFAULT_TILE_SIZE,
};
use crate::error::{Result, ZogyError};

/// How the background is removed from each tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackgroundMode {
    /// Subtract the tile's median.
    #[default]
    Median,
    /// Subtract a measured background raster supplied with each frame.
    Measured,
}

impl std::fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Median => write!(f, "Tile median"),
            Self::Measured => write!(f, "Measured raster"),
        }
    }
}

/// Immutable settings for one subtraction run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtractionConfig {
    /// Inner tile size in pixels.
    pub tile_size: usize,
    /// Border added on each side of a tile for the FFT work.
    pub tile_border: usize,
    pub background: BackgroundMode,
    /// Use the flux ratio of matches inside a tile when there are any.
    pub flux_ratio_local: bool,
    /// Use the offsets of matches inside a tile when there are any.
    pub offset_local: bool,
    /// Local offsets larger than this multiple of the global ones are rejected.
    pub offset_fallback_factor: f64,
    /// Sigma threshold for the clipped global flux ratio.
    pub flux_ratio_clip_sigma: f64,
    pub clip_iterations: usize,
    pub matching: MatchConfig,
    /// Arcseconds per pixel; taken from the new frame's metadata when unset.
    pub pixel_scale: Option<f64>,
}

impl Default for SubtractionConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            tile_border: DEFAULT_TILE_BORDER,
            background: BackgroundMode::Median,
            flux_ratio_local: true,
            offset_local: true,
            offset_fallback_factor: DEFAULT_OFFSET_FALLBACK_FACTOR,
            flux_ratio_clip_sigma: DEFAULT_FLUX_RATIO_CLIP_SIGMA,
            clip_iterations: DEFAULT_CLIP_ITERATIONS,
            matching: MatchConfig::default(),
            pixel_scale: None,
        }
    }
}

impl SubtractionConfig {
    pub fn padded_size(&self) -> usize {
        self.tile_size + 2 * self.tile_border
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(ZogyError::InvalidConfig("tile_size must be positive".into()));
        }
        let padded = self.padded_size();
        if padded % 2 != 0 {
            return Err(ZogyError::OddDimension {
                what: "padded tile",
                height: padded,
                width: padded,
            });
        }
        if self.offset_fallback_factor.is_nan() || self.offset_fallback_factor <= 0.0 {
            return Err(ZogyError::InvalidConfig(format!(
                "offset_fallback_factor must be positive, got {}",
                self.offset_fallback_factor
            )));
        }
        if self.matching.radius_arcsec.is_nan() || self.matching.radius_arcsec <= 0.0 {
            return Err(ZogyError::InvalidConfig(format!(
                "matching radius must be positive, got {}",
                self.matching.radius_arcsec
            )));
        }
        if let Some(scale) = self.pixel_scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ZogyError::InvalidConfig(format!(
                    "pixel_scale must be positive, got {scale}"
                )));
            }
        }
        Ok(())
    }
}
