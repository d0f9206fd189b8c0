use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array2, ArrayViewMut2};
use rayon::prelude::*;
use tracing::{debug, info, warn, Level};

use crate::catalog::{match_catalogs, Catalog, MatchSet, MatchSummary};
use crate::error::{Result, ZogyError};
use crate::fft::Fft2d;
use crate::psf::SampledPsf;
use crate::stats::sigma_clipped_stats;
use crate::tiles::{Tile, TileGrid};
use crate::transform::{subtract, TileInputs};
use crate::wcs::remap_point;

use super::config::{BackgroundMode, SubtractionConfig};
use super::prepare::{prepare_tile, PreparedTile};
use super::types::{
    EstimateSource, FrameInputs, NoOpReporter, ProgressReporter, SubtractionOutput,
    SubtractionStage, TileDiagnostics, TileEstimates,
};

/// One tile's cells of the D, S and Scorr mosaics.
struct MosaicCells<'a> {
    d: ArrayViewMut2<'a, f32>,
    s: ArrayViewMut2<'a, f32>,
    scorr: ArrayViewMut2<'a, f32>,
}

/// Pick the flux ratio and offsets for a tile.
///
/// Local values are used only when the corresponding toggle is on and the
/// tile holds at least one match. A local offset that is non-finite or
/// exceeds `offset_fallback_factor` times the global one is replaced by
/// the global value.
pub fn select_estimates(
    global: &MatchSummary,
    local: Option<&MatchSummary>,
    config: &SubtractionConfig,
) -> TileEstimates {
    let (flux_ratio, flux_source) = match local {
        Some(l) if config.flux_ratio_local && l.flux_ratio.is_finite() && l.flux_ratio > 0.0 => {
            (l.flux_ratio, EstimateSource::Local)
        }
        _ => (global.flux_ratio, EstimateSource::Global),
    };

    let (dx, dy, offset_source) = match local {
        Some(l) if config.offset_local => {
            let limit_x = config.offset_fallback_factor * global.dx;
            let limit_y = config.offset_fallback_factor * global.dy;
            let dx = if l.dx.is_finite() && l.dx <= limit_x {
                l.dx
            } else {
                warn!(local = l.dx, global = global.dx, "Rejected local x offset");
                global.dx
            };
            let dy = if l.dy.is_finite() && l.dy <= limit_y {
                l.dy
            } else {
                warn!(local = l.dy, global = global.dy, "Rejected local y offset");
                global.dy
            };
            (dx, dy, EstimateSource::Local)
        }
        _ => (global.dx, global.dy, EstimateSource::Global),
    };

    TileEstimates {
        flux_ratio,
        dx,
        dy,
        flux_source,
        offset_source,
    }
}

/// Drives the tiled subtraction of a new frame against a reference frame
/// already resampled onto the same pixel grid.
pub struct Subtraction {
    config: SubtractionConfig,
}

impl Subtraction {
    pub fn new(config: SubtractionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SubtractionConfig {
        &self.config
    }

    /// Match the two catalogs, then subtract.
    pub fn run_with_catalogs(
        &self,
        new: &FrameInputs,
        reference: &FrameInputs,
        new_catalog: &Catalog,
        ref_catalog: &Catalog,
        reporter: &dyn ProgressReporter,
    ) -> Result<SubtractionOutput> {
        reporter.begin_stage(SubtractionStage::Matching, None);
        let matches = match_catalogs(new_catalog, ref_catalog, &self.config.matching)?;
        reporter.finish_stage();
        info!(
            matched = matches.matches.len(),
            fraction = matches.match_fraction,
            "Catalogs matched"
        );
        self.run(new, reference, &matches, reporter)
    }

    /// Subtract using precomputed star matches.
    pub fn run(
        &self,
        new: &FrameInputs,
        reference: &FrameInputs,
        matches: &MatchSet,
        reporter: &dyn ProgressReporter,
    ) -> Result<SubtractionOutput> {
        let (h, w) = new.frame.dim();
        if reference.frame.dim() != (h, w) {
            return Err(ZogyError::ShapeMismatch {
                expected: (h, w),
                actual: reference.frame.dim(),
            });
        }

        let grid = TileGrid::plan(h, w, self.config.tile_size, self.config.tile_border)?;
        let padded = grid.padded_size();
        let pixel_scale = self
            .config
            .pixel_scale
            .unwrap_or(new.frame.metadata.pixel_scale);

        let global = MatchSummary::global(
            &matches.matches,
            pixel_scale,
            self.config.flux_ratio_clip_sigma,
            self.config.clip_iterations,
        );
        info!(
            tiles = grid.len(),
            padded,
            flux_ratio = global.flux_ratio,
            flux_ratio_std = global.flux_ratio_std,
            dx = global.dx,
            dy = global.dy,
            "Starting tiled subtraction"
        );

        let sides = [
            PreparedSide::new(new, self.config.background, "new")?,
            PreparedSide::new(reference, self.config.background, "reference")?,
        ];
        let fft = Fft2d::new(padded, padded);

        let mut d = Array2::<f32>::zeros((h, w));
        let mut s = Array2::<f32>::zeros((h, w));
        let mut scorr = Array2::<f32>::zeros((h, w));
        let cells: Vec<MosaicCells> = grid
            .split_inner(d.view_mut())?
            .into_iter()
            .zip(grid.split_inner(s.view_mut())?)
            .zip(grid.split_inner(scorr.view_mut())?)
            .map(|((d, s), scorr)| MosaicCells { d, s, scorr })
            .collect();

        reporter.begin_stage(SubtractionStage::Subtracting, Some(grid.len()));
        let done = AtomicUsize::new(0);
        let tiles = grid
            .tiles
            .par_iter()
            .zip(cells)
            .map(|(tile, mut cells)| {
                let out = self.process_tile(tile, padded, &sides, &global, matches, pixel_scale, &fft, &mut cells);
                reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
                out
            })
            .collect::<Result<Vec<_>>>()?;
        reporter.finish_stage();
        info!("Subtraction complete");

        Ok(SubtractionOutput {
            d,
            s,
            scorr,
            global,
            match_fraction: matches.match_fraction,
            tiles,
        })
    }

    /// Subtract one tile and write its inner region into `cells`.
    #[allow(clippy::too_many_arguments)]
    fn process_tile(
        &self,
        tile: &Tile,
        padded: usize,
        sides: &[PreparedSide; 2],
        global: &MatchSummary,
        matches: &MatchSet,
        pixel_scale: f64,
        fft: &Fft2d,
        cells: &mut MosaicCells,
    ) -> Result<TileDiagnostics> {
        let [new, reference] = sides;
        let tile_new = new.prepare(tile, padded);
        let tile_ref = reference.prepare(tile, padded);
        let psf_new = new.sample_psf(tile, padded)?;
        let psf_ref = reference.sample_psf(tile, padded)?;

        let local = MatchSummary::local(&matches.matches, &tile.inner, pixel_scale);
        if local.is_none() {
            debug!(tile = tile.index, "No matches in tile; using global estimates");
        }
        let estimates = select_estimates(global, local.as_ref(), &self.config);

        let inputs = TileInputs {
            reference: &tile_ref.image,
            new: &tile_new.image,
            psf_ref: &psf_ref.shifted,
            psf_new: &psf_new.shifted,
            noise_ref: tile_ref.noise,
            noise_new: tile_new.noise,
            flux_ref: 1.0,
            flux_new: estimates.flux_ratio,
            var_ref: &tile_ref.variance,
            var_new: &tile_new.variance,
            dx: estimates.dx,
            dy: estimates.dy,
        };
        let result = subtract(&inputs, fft)?;

        let gain_ref = reference.inputs.frame.metadata.gain;
        tile.store_inner(&result.d, &mut cells.d, 1.0 / gain_ref)?;
        tile.store_inner(&result.s, &mut cells.s, 1.0)?;
        tile.store_inner(&result.scorr, &mut cells.scorr, 1.0)?;

        if tracing::enabled!(Level::DEBUG) {
            let values: Vec<f64> = cells.scorr.iter().map(|&v| v as f64).collect();
            let stats = sigma_clipped_stats(&values, 3.0, 5);
            debug!(
                tile = tile.index,
                median_new = tile_new.median,
                median_ref = tile_ref.median,
                noise_new = tile_new.noise,
                noise_ref = tile_ref.noise,
                flux_ratio = estimates.flux_ratio,
                flux_source = ?estimates.flux_source,
                dx = estimates.dx,
                dy = estimates.dy,
                offset_source = ?estimates.offset_source,
                scorr_std = stats.std_dev,
                "Tile subtracted"
            );
        }

        Ok(TileDiagnostics {
            index: tile.index,
            noise_new: tile_new.noise,
            noise_ref: tile_ref.noise,
            estimates,
            local_matches: local.map_or(0, |l| l.count),
        })
    }
}

/// Frame-level data converted once per run and shared by all tile workers.
struct PreparedSide<'a> {
    inputs: &'a FrameInputs,
    electrons: Array2<f32>,
    background: Option<Array2<f32>>,
}

impl<'a> PreparedSide<'a> {
    fn new(inputs: &'a FrameInputs, mode: BackgroundMode, label: &'static str) -> Result<Self> {
        let gain = inputs.frame.metadata.gain as f32;
        let background = match mode {
            BackgroundMode::Median => None,
            BackgroundMode::Measured => {
                let bkg = inputs
                    .background
                    .as_ref()
                    .ok_or(ZogyError::MissingBackground(label))?;
                if bkg.dim() != inputs.frame.dim() {
                    return Err(ZogyError::ShapeMismatch {
                        expected: inputs.frame.dim(),
                        actual: bkg.dim(),
                    });
                }
                Some(bkg.mapv(|v| v * gain))
            }
        };
        Ok(Self {
            inputs,
            electrons: inputs.frame.electrons(),
            background,
        })
    }

    fn prepare(&self, tile: &Tile, padded: usize) -> PreparedTile {
        prepare_tile(
            tile,
            &self.electrons,
            self.background.as_ref(),
            self.inputs.frame.metadata.read_noise,
            padded,
        )
    }

    fn sample_psf(&self, tile: &Tile, padded: usize) -> Result<SampledPsf> {
        let (x, y) = match &self.inputs.psf_reprojection {
            Some(rp) => remap_point(tile.cx, tile.cy, rp.grid.as_ref(), rp.original.as_ref()),
            None => (tile.cx, tile.cy),
        };
        self.inputs.psf.sample(x, y, padded)
    }
}

/// Run a subtraction with default reporting.
pub fn run_subtraction(
    config: &SubtractionConfig,
    new: &FrameInputs,
    reference: &FrameInputs,
    new_catalog: &Catalog,
    ref_catalog: &Catalog,
) -> Result<SubtractionOutput> {
    Subtraction::new(config.clone())?.run_with_catalogs(
        new,
        reference,
        new_catalog,
        ref_catalog,
        &NoOpReporter,
    )
}
