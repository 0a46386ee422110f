//! Parallel computation implementations for statistical operations
//!
//! Cross-grid reductions stack every layer into an (n_layers x n_cells)
//! matrix and reduce each cell column independently on the rayon pool.
//! The whole stack is materialized at once, so the working set is
//! O(n_layers x n_cells).

use super::operations::StatOperation;
use crate::errors::{GridError, Result};
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use tracing::debug;

/// Stack same-shaped layers into an (n_layers x n_cells) matrix.
///
/// # Errors
///
/// Returns [`GridError::ShapeMismatch`] if any layer differs in shape from
/// the first.
pub fn stack_layers(layers: &[Array2<f64>]) -> Result<Array2<f64>> {
    let Some(first) = layers.first() else {
        return Ok(Array2::zeros((0, 0)));
    };
    let shape = first.dim();
    let cells = first.len();
    let mut data = Vec::with_capacity(layers.len() * cells);
    for layer in layers {
        if layer.dim() != shape {
            return Err(GridError::ShapeMismatch {
                expected: shape,
                found: layer.dim(),
            });
        }
        data.extend(layer.iter().copied());
    }
    Ok(Array2::from_shape_vec((layers.len(), cells), data)?)
}

/// Reduce a stack of same-shaped layers cell by cell.
///
/// With `skip_absent` the `NaN` samples of a cell are dropped before the
/// operation runs and a cell left with no samples is `NaN`; without it any
/// `NaN` sample makes the cell `NaN`.
///
/// # Errors
///
/// Fails when the layers differ in shape or the stack is empty.
pub fn reduce_stack(
    layers: &[Array2<f64>],
    operation: StatOperation,
    skip_absent: bool,
) -> Result<Array2<f64>> {
    let Some(first) = layers.first() else {
        return Err(GridError::Generic("cannot reduce an empty stack".to_string()));
    };
    let shape = first.dim();
    let stack = stack_layers(layers)?;
    let cells = stack.len_of(Axis(1));

    debug!(
        cells,
        layers = layers.len(),
        threads = rayon::current_num_threads(),
        operation = %operation,
        "reducing stack"
    );

    let result: Vec<f64> = (0..cells)
        .into_par_iter()
        .map(|cell| {
            let column = stack.column(cell);
            if !skip_absent && column.iter().any(|v| v.is_nan()) {
                return f64::NAN;
            }
            let samples: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            operation.apply(&samples)
        })
        .collect();

    Ok(Array2::from_shape_vec(shape, result)?)
}
