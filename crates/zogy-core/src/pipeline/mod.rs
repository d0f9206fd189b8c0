pub mod config;
mod orchestrator;
mod prepare;
mod types;

pub use orchestrator::{run_subtraction, select_estimates, Subtraction};
pub use prepare::{prepare_tile, PreparedTile};
pub use types::{
    EstimateSource, FrameInputs, NoOpReporter, ProgressReporter, Reprojection,
    SubtractionOutput, SubtractionStage, TileDiagnostics, TileEstimates,
};
