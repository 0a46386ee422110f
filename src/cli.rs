//! Defines command-line interface options using `clap` for the gridstack application.

use clap::Parser;
use gridstack::statistics::StatOperation;
use std::path::PathBuf;

/// A CLI tool for inspecting and reducing ASCII raster grids
#[derive(Parser, Debug)]
#[command(
    version,
    name = "gridstack",
    about = "Inspect, summarize and reduce ASCII grid rasters"
)]
pub struct Args {
    /// Path to the grid file (.asc)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Print the grid metadata
    #[arg(long)]
    pub describe: bool,

    /// Print basic statistics (count/sum/mean/sd/quartiles) of the grid
    #[arg(long)]
    pub summary: bool,

    /// Category table (.txt, `;`-separated); treats the grid as categorical
    #[arg(long)]
    pub table: Option<PathBuf>,

    /// Print the area of every category (requires a categorical grid)
    #[arg(long)]
    pub areas: bool,

    /// Reduce a stack of grids: mean, sd, min, max, sum, median or pNN
    #[arg(long, value_parser = parse_operation)]
    pub reduce: Option<StatOperation>,

    /// Comma-separated grid files forming the stack to reduce
    #[arg(long, value_delimiter = ',')]
    pub stack: Vec<PathBuf>,

    /// Drop absent cells before reducing instead of propagating them
    #[arg(long, default_value_t = false)]
    pub skip_absent: bool,

    /// Path to write the reduced grid. If not set, prints a summary.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Enable verbose (debug) logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

fn parse_operation(s: &str) -> Result<StatOperation, String> {
    s.parse::<StatOperation>().map_err(|e| e.to_string())
}
