//! Entry point for the gridstack application.
//! Handles CLI parsing, grid loading, and dispatches operations like stack
//! reductions, summaries and category areas.

use clap::Parser;
use gridstack::prelude::{
    CategoricalRaster, Collection, EngineConfig, GridError, OrderedFields, ParallelConfig, Raster,
    RasterKind, StatOperation,
};
use gridstack::table::render_value;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
mod cli;

use cli::Args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    ParallelConfig::new(args.threads).setup_global_pool()?;

    if let Some(operation) = args.reduce {
        reduce_stack_files(&args, operation)?;
    }

    let Some(file) = args.file.as_deref() else {
        if args.reduce.is_none() {
            warn!("nothing to do: pass --file or --reduce with --stack");
        }
        return Ok(());
    };

    let config = EngineConfig::default();
    if let Some(table) = args.table.as_deref() {
        let grid: CategoricalRaster<u32> =
            CategoricalRaster::load(&stem_of(file), RasterKind::Lulc, file, None, Some(table))?;
        info!(file = %file.display(), categories = grid.table().len(), "opened categorical grid");
        if args.describe {
            print_fields(&grid.metadata());
        }
        if args.summary {
            print_fields(&grid.raster().basic_statistics().to_fields(None));
        }
        if args.areas {
            for area in grid.areas(&config) {
                println!(
                    "{:>5}  {:<24} {:>10} cells {:>14.4} km2 {:>8.2} %",
                    area.id, area.name, area.cell_count, area.area_km2, area.area_pct
                );
            }
        }
    } else {
        let grid: Raster<f32> = Raster::load(&stem_of(file), RasterKind::Generic, file, None)?;
        info!(file = %file.display(), "opened grid");
        if args.areas {
            warn!("--areas needs a category table (--table)");
        }
        if args.describe || !args.summary {
            print_fields(&grid.metadata());
        }
        if args.summary {
            print_fields(&grid.basic_statistics().to_fields(None));
        }
    }

    Ok(())
}

fn reduce_stack_files(args: &Args, operation: StatOperation) -> gridstack::Result<()> {
    let mut stack: Collection<Raster<f32>> = Collection::new("stack");
    for path in &args.stack {
        stack.load(&stem_of(path), RasterKind::Generic, path, None)?;
    }
    let reduced = stack
        .reduce(operation, args.skip_absent)?
        .ok_or_else(|| GridError::Generic("stack is empty or its grids differ in shape".into()))?;

    if let Some(output_path) = args.output.as_deref() {
        let written = reduced.export_asc(output_path)?;
        println!("Saved {} to {}", reduced.name(), written.display());
    } else {
        println!("{}", reduced.name());
        print_fields(&reduced.basic_statistics().to_fields(None));
    }
    Ok(())
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_fields(fields: &OrderedFields) {
    for (key, value) in fields.iter() {
        println!("  {key:<14} {}", render_value(value));
    }
}
