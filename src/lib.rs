//! gridstack: georeferenced raster grids, categorical maps and aligned
//! raster stacks
//!
//! A Rust library for loading, masking, resampling and summarizing 2-D
//! raster grids stored in the six-line-header ASCII grid format, with
//! categorical (id + attribute table) grids and collections of aligned
//! grids reduced cell by cell in parallel.
//!
//! ## Key Features
//!
//! - **NODATA-aware cells**: `NaN` for floating grids, a boolean mask for
//!   integer grids, NODATA sentinels only ever written on export
//! - **Area of interest**: single-level apply/release with a saved backup
//! - **Resampling**: nearest, bilinear and bicubic onto another grid
//! - **Categorical grids**: table-synchronized reclassification, area
//!   accounting and zonal statistics
//! - **Aligned stacks**: mean, sd, min, max, sum, median and percentile
//!   reductions across members using Rayon
//! - **Series**: dated members, change detection and conversion matrices
//!
//! ## Module Organization
//!
//! - [`codec`]: grid file and coordinate-system side file I/O
//! - [`nodata`]: cell types and the NODATA / mask engine
//! - [`header`]: grid header geometry
//! - [`raster`]: the base grid
//! - [`categorical`]: categorical grids
//! - [`table`]: category tables and ordered field records
//! - [`collection`]: catalogued collections and stack reductions
//! - [`series`]: dated series and change detection
//! - [`statistics`]: statistical operations and parallel reductions
//! - [`interpolation`]: resampling samplers
//! - [`config`]: raster kinds, display settings and engine constants
//! - [`parallel`]: parallel processing configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//! ```rust,no_run
//! use gridstack::prelude::*;
//! use std::path::Path;
//!
//! let dem: Raster<f32> =
//!     Raster::load("dem", RasterKind::Elevation, Path::new("dem.asc"), None).unwrap();
//! let stats = dem.basic_statistics();
//! println!("mean elevation: {}", stats.mean);
//!
//! let mut stack: Collection<Raster<f32>> = Collection::new("ndvi");
//! stack.insert(dem.clone());
//! let mean = stack.mean(true).unwrap();
//! ```

pub mod categorical;
pub mod codec;
pub mod collection;
pub mod config;
pub mod errors;
pub mod header;
pub mod interpolation;
pub mod nodata;
pub mod parallel;
pub mod raster;
pub mod series;
pub mod statistics;
pub mod table;

pub use errors::{GridError, Result};

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::categorical::{CategoricalRaster, CategoryArea, ZonalStats};
    pub use crate::collection::{Catalogued, Collection, GridLayer};
    pub use crate::config::{EngineConfig, RasterKind, ViewOverrides, ViewSpec};
    pub use crate::errors::{GridError, Result};
    pub use crate::header::{BoundingBox, GridHeader};
    pub use crate::interpolation::ResampleMethod;
    pub use crate::nodata::{CellKind, CellValue, Cells};
    pub use crate::parallel::ParallelConfig;
    pub use crate::raster::{GridPoint, Raster, RasterInfo};
    pub use crate::series::{CategoricalSeries, ConversionMatrix, RasterSeries};
    pub use crate::statistics::{BasicStats, StatOperation};
    pub use crate::table::{CategoryRow, CategoryTable, OrderedFields};
}
