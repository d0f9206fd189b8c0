use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use zogy_core::consts::{DEFAULT_TILE_BORDER, DEFAULT_TILE_SIZE};
use zogy_core::io::read_frame;
use zogy_core::tiles::TileGrid;

#[derive(Args)]
pub struct TilesArgs {
    /// FITS image of the frame
    pub file: PathBuf,

    /// Inner tile size in pixels
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_size: usize,

    /// Border around each tile in pixels
    #[arg(long, default_value_t = DEFAULT_TILE_BORDER)]
    pub border: usize,
}

pub fn run(args: &TilesArgs) -> Result<()> {
    let frame = read_frame(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let (h, w) = frame.dim();
    let grid = TileGrid::plan(h, w, args.tile_size, args.border)?;

    println!("Frame:       {}x{}", w, h);
    println!("Tiles:       {} ({} x {})", grid.len(), grid.nx, grid.ny);
    println!("Buffer:      {0}x{0}", grid.padded_size());
    println!();
    println!("{:>5}  {:>19}  {:>19}  {:>16}", "tile", "x range", "y range", "center");
    for tile in &grid.tiles {
        let b = tile.inner;
        println!(
            "{:>5}  {:>19}  {:>19}  {:>16}",
            tile.index,
            format!("[{}, {})", b.x0, b.x1),
            format!("[{}, {})", b.y0, b.y1),
            format!("({:.1}, {:.1})", tile.cx, tile.cy),
        );
    }

    Ok(())
}
