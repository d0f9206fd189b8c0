use std::sync::Arc;

use ndarray::Array2;

use crate::catalog::MatchSummary;
use crate::frame::Frame;
use crate::psf::PsfFieldModel;
use crate::wcs::SkyProjection;

/// Subtraction stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubtractionStage {
    Matching,
    Subtracting,
}

impl std::fmt::Display for SubtractionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matching => write!(f, "Matching catalogs"),
            Self::Subtracting => write!(f, "Subtracting tiles"),
        }
    }
}

/// Thread-safe progress reporting for a subtraction run.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (e.g., tile count), if known.
    fn begin_stage(&self, _stage: SubtractionStage, _total_items: Option<usize>) {}

    /// `items_done` work items of the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Maps tile centers on the subtraction grid back to the pixel frame a PSF
/// model was fitted on, for frames that were resampled onto another grid.
#[derive(Clone)]
pub struct Reprojection {
    /// Solution of the common pixel grid the tiles live on.
    pub grid: Arc<dyn SkyProjection>,
    /// Solution of the frame the PSF model was derived from.
    pub original: Arc<dyn SkyProjection>,
}

/// One side (new or reference) of a subtraction, fully materialized.
#[derive(Clone)]
pub struct FrameInputs {
    pub frame: Frame,
    pub psf: PsfFieldModel,
    /// Measured background in ADU, same shape as the frame.
    pub background: Option<Array2<f32>>,
    pub psf_reprojection: Option<Reprojection>,
}

impl FrameInputs {
    pub fn new(frame: Frame, psf: PsfFieldModel) -> Self {
        Self {
            frame,
            psf,
            background: None,
            psf_reprojection: None,
        }
    }

    pub fn with_background(mut self, background: Array2<f32>) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_psf_reprojection(mut self, reprojection: Reprojection) -> Self {
        self.psf_reprojection = Some(reprojection);
        self
    }
}

/// Where a per-tile estimate came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimateSource {
    Local,
    Global,
}

/// Flux ratio and offsets used for one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileEstimates {
    pub flux_ratio: f64,
    pub dx: f64,
    pub dy: f64,
    pub flux_source: EstimateSource,
    pub offset_source: EstimateSource,
}

/// Per-tile quality signals.
#[derive(Clone, Copy, Debug)]
pub struct TileDiagnostics {
    pub index: usize,
    pub noise_new: f64,
    pub noise_ref: f64,
    pub estimates: TileEstimates,
    pub local_matches: usize,
}

/// Full-frame results of a run.
#[derive(Clone, Debug)]
pub struct SubtractionOutput {
    /// Difference image in reference ADU.
    pub d: Array2<f32>,
    pub s: Array2<f32>,
    pub scorr: Array2<f32>,
    pub global: MatchSummary,
    pub match_fraction: f64,
    pub tiles: Vec<TileDiagnostics>,
}
