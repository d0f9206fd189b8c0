/// Minimum pixel count (h*w) to use row/column-level Rayon parallelism in FFTs.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Default inner tile size in pixels.
pub const DEFAULT_TILE_SIZE: usize = 1024;

/// Default border added around each tile to keep FFT wrap-around out of the
/// inner region.
pub const DEFAULT_TILE_BORDER: usize = 28;

/// Maximum separation (arcsec) for a new/reference detection pair to count as a match.
pub const DEFAULT_MATCH_RADIUS_ARCSEC: f64 = 1.0;

/// A local offset estimate larger than this multiple of the global estimate
/// is replaced by the global one.
pub const DEFAULT_OFFSET_FALLBACK_FACTOR: f64 = 2.0;

/// Sigma threshold for the clipped global flux-ratio statistics.
pub const DEFAULT_FLUX_RATIO_CLIP_SIGMA: f64 = 2.0;

/// Maximum number of sigma-clipping passes.
pub const DEFAULT_CLIP_ITERATIONS: usize = 5;

/// Pixel scale (arcsec/pixel) assumed when the frame header does not carry one.
pub const DEFAULT_PIXEL_SCALE: f64 = 0.4;

/// Arcseconds per degree.
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;
