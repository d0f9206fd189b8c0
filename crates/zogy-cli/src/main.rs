mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "zogy", about = "Optimal image subtraction for transient detection")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subtract a reference frame from a new frame
    Subtract(commands::subtract::SubtractArgs),
    /// Print or save the default subtraction config
    Config(commands::config::ConfigArgs),
    /// Show the tile plan for a frame
    Tiles(commands::tiles::TilesArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Subtract(args) => commands::subtract::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Tiles(args) => commands::tiles::run(args),
    }
}
