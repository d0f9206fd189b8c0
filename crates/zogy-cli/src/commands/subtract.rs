use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use zogy_core::io::{quicklook_limits, save_quicklook_png, write_raster, FrameArtifacts, LoadedFrame};
use zogy_core::pipeline::config::{BackgroundMode, SubtractionConfig};
use zogy_core::pipeline::{
    FrameInputs, ProgressReporter, Reprojection, Subtraction, SubtractionStage,
};

use crate::summary::{print_result_summary, print_subtraction_summary};

#[derive(Clone, Copy, ValueEnum)]
pub enum BackgroundArg {
    Median,
    Measured,
}

#[derive(Args)]
pub struct SubtractArgs {
    /// Identifier of the new frame (`<id>.fits`, `<id>.cat.json`, ...)
    pub new: PathBuf,

    /// Identifier of the reference frame, already resampled onto the new frame's grid
    pub reference: PathBuf,

    /// Subtraction config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Inner tile size in pixels
    #[arg(long)]
    pub tile_size: Option<usize>,

    /// Border around each tile in pixels
    #[arg(long)]
    pub border: Option<usize>,

    /// Background removal
    #[arg(long, value_enum)]
    pub background: Option<BackgroundArg>,

    /// Use only full-frame flux ratio and offset estimates
    #[arg(long)]
    pub global_only: bool,

    /// Directory for D.fits, S.fits and Scorr.fits
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Also write PNG quick-looks of the outputs
    #[arg(long)]
    pub quicklook: bool,
}

struct BarReporter {
    pb: ProgressBar,
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: SubtractionStage, total_items: Option<usize>) {
        self.pb.set_message(stage.to_string());
        self.pb.set_length(total_items.unwrap_or(1) as u64);
        self.pb.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        self.pb.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.pb.length() {
            self.pb.set_position(len);
        }
    }
}

fn load_config(args: &SubtractArgs) -> Result<SubtractionConfig> {
    let mut config: SubtractionConfig = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid subtraction config")?
    } else {
        SubtractionConfig::default()
    };

    if let Some(tile_size) = args.tile_size {
        config.tile_size = tile_size;
    }
    if let Some(border) = args.border {
        config.tile_border = border;
    }
    if let Some(background) = args.background {
        config.background = match background {
            BackgroundArg::Median => BackgroundMode::Median,
            BackgroundArg::Measured => BackgroundMode::Measured,
        };
    }
    if args.global_only {
        config.flux_ratio_local = false;
        config.offset_local = false;
    }
    Ok(config)
}

fn load_frame(identifier: &Path, need_background: bool) -> Result<LoadedFrame> {
    let artifacts = FrameArtifacts::discover(identifier)
        .with_context(|| format!("Failed to resolve artifacts for {}", identifier.display()))?;
    artifacts
        .load(need_background)
        .with_context(|| format!("Failed to load {}", identifier.display()))
}

fn into_inputs(loaded: LoadedFrame) -> FrameInputs {
    let inputs = FrameInputs::new(loaded.frame, loaded.psf);
    match loaded.background {
        Some(bkg) => inputs.with_background(bkg),
        None => inputs,
    }
}

pub fn run(args: &SubtractArgs) -> Result<()> {
    let config = load_config(args)?;
    let need_background = config.background == BackgroundMode::Measured;

    let new = load_frame(&args.new, need_background)?;
    let reference = load_frame(&args.reference, need_background)?;

    // The reference PSF was fitted on the reference's own pixel grid.
    let reprojection = match (&new.wcs, &reference.wcs) {
        (Some(grid), Some(original)) if grid != original => Some(Reprojection {
            grid: Arc::new(grid.clone()),
            original: Arc::new(original.clone()),
        }),
        _ => None,
    };
    let new_catalog = new.catalog.clone();
    let ref_catalog = reference.catalog.clone();
    let new_inputs = into_inputs(new);
    let mut ref_inputs = into_inputs(reference);
    if let Some(rp) = reprojection {
        ref_inputs = ref_inputs.with_psf_reprojection(rp);
    }

    print_subtraction_summary(&config, &args.new, &args.reference, &new_inputs);

    let subtraction = Subtraction::new(config)?;
    let pb = ProgressBar::new(1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let reporter = BarReporter { pb };

    let output = subtraction.run_with_catalogs(
        &new_inputs,
        &ref_inputs,
        &new_catalog,
        &ref_catalog,
        &reporter,
    )?;
    reporter.pb.finish_with_message("Done");

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let products = [("D", &output.d), ("S", &output.s), ("Scorr", &output.scorr)];
    for (name, data) in products {
        let path = args.output_dir.join(format!("{name}.fits"));
        write_raster(&path, data).with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote {name}");
        if args.quicklook {
            let png = args.output_dir.join(format!("{name}.png"));
            let (lo, hi) = quicklook_limits(data);
            save_quicklook_png(data, &png, lo, hi)
                .with_context(|| format!("Failed to write {}", png.display()))?;
        }
    }

    print_result_summary(&output, &args.output_dir);
    Ok(())
}
