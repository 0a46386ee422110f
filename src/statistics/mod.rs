//! Statistical computations and parallel reduction operations
//!
//! # Organization
//!
//! This module is organized into submodules:
//! - [`operations`]: statistical operations and the basic statistics summary
//! - [`parallel`]: per-cell reduction of stacked grids on the rayon pool

pub mod operations;
pub mod parallel;

// Re-export the main types and functions for convenience
pub use operations::{mean, percentile, std_dev, BasicStats, StatOperation};
pub use parallel::{reduce_stack, stack_layers};
