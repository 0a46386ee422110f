//! Interpolation methods for grid resampling.
//!
//! Samplers read a source lattice (absent cells as `NaN`) at a fractional
//! (row, col) position where integer positions fall on cell centers.

use crate::errors::{GridError, Result};
use crate::header::GridHeader;
use ndarray::Array2;
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Tolerance for positions that sit on the lattice edge
const EDGE_EPS: f64 = 1e-9;

/// Interpolation method used when resampling onto another grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleMethod {
    /// Value of the closest non-absent cell
    Nearest,
    /// Bilinear between the four surrounding cell centers
    #[default]
    Linear,
    /// Catmull-Rom bicubic over the 4x4 neighbourhood
    Cubic,
}

impl ResampleMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
            Self::Cubic => "cubic",
        }
    }

    /// Sample `data` at fractional position (`row`, `col`)
    #[must_use]
    pub fn sample(self, data: &Array2<f64>, row: f64, col: f64) -> f64 {
        match self {
            Self::Nearest => nearest_interpolate(data, row, col),
            Self::Linear => bilinear_interpolate(data, row, col),
            Self::Cubic => cubic_interpolate(data, row, col),
        }
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResampleMethod {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "linear" | "bilinear" => Ok(Self::Linear),
            "cubic" | "bicubic" => Ok(Self::Cubic),
            other => Err(GridError::Generic(format!(
                "unknown resampling method '{other}'"
            ))),
        }
    }
}

/// Nearest neighbor interpolation.
///
/// Returns the value of the closest non-absent cell center, searching
/// outward ring by ring. Positions outside the lattice still resolve to
/// the closest cell; only an all-absent source yields `NaN`.
#[must_use]
pub fn nearest_interpolate(data: &Array2<f64>, row: f64, col: f64) -> f64 {
    let (nrows, ncols) = data.dim();
    if nrows == 0 || ncols == 0 || row.is_nan() || col.is_nan() {
        return f64::NAN;
    }
    let r0 = row.round().clamp(0.0, (nrows - 1) as f64) as isize;
    let c0 = col.round().clamp(0.0, (ncols - 1) as f64) as isize;
    let offset = ((row - r0 as f64).powi(2) + (col - c0 as f64).powi(2)).sqrt();

    let mut best: Option<(f64, f64)> = None;
    for ring in 0..=nrows.max(ncols) as isize {
        if let Some((dist2, _)) = best {
            if dist2.sqrt() < ring as f64 - offset {
                break;
            }
        }
        for r in (r0 - ring)..=(r0 + ring) {
            for c in (c0 - ring)..=(c0 + ring) {
                if (r - r0).abs().max((c - c0).abs()) != ring {
                    continue;
                }
                if r < 0 || c < 0 || r >= nrows as isize || c >= ncols as isize {
                    continue;
                }
                let value = data[[r as usize, c as usize]];
                if value.is_nan() {
                    continue;
                }
                let dist2 = (row - r as f64).powi(2) + (col - c as f64).powi(2);
                if best.map_or(true, |(d, _)| dist2 < d) {
                    best = Some((dist2, value));
                }
            }
        }
    }
    best.map_or(f64::NAN, |(_, value)| value)
}

/// Lower lattice index and weight along one axis, `None` outside the hull
fn axis_position(pos: f64, len: usize) -> Option<(usize, usize, f64)> {
    if len == 0 || pos < -EDGE_EPS || pos > (len - 1) as f64 + EDGE_EPS {
        return None;
    }
    let pos = pos.clamp(0.0, (len - 1) as f64);
    let i0 = (pos.floor() as usize).min(len - 1);
    let i1 = (i0 + 1).min(len - 1);
    Some((i0, i1, pos - i0 as f64))
}

/// Bilinear interpolation.
///
/// Smoothly interpolates between the four nearest cell centers. Absent
/// corners are dropped and the remaining weights renormalised, so a
/// position on a cell center returns that cell. Positions outside the hull
/// of cell centers, or carrying no weight on a present cell, are `NaN`.
#[must_use]
pub fn bilinear_interpolate(data: &Array2<f64>, row: f64, col: f64) -> f64 {
    let (nrows, ncols) = data.dim();
    let (Some((r0, r1, rf)), Some((c0, c1, cf))) =
        (axis_position(row, nrows), axis_position(col, ncols))
    else {
        return f64::NAN;
    };

    let corners = [
        (data[[r0, c0]], (1.0 - rf) * (1.0 - cf)),
        (data[[r0, c1]], (1.0 - rf) * cf),
        (data[[r1, c0]], rf * (1.0 - cf)),
        (data[[r1, c1]], rf * cf),
    ];

    let mut weighted = 0.0;
    let mut total = 0.0;
    for (value, weight) in corners {
        if value.is_nan() || weight <= EDGE_EPS {
            continue;
        }
        weighted += value * weight;
        total += weight;
    }
    if total <= EDGE_EPS {
        return f64::NAN;
    }
    weighted / total
}

/// Bicubic interpolation.
///
/// Uses the 16 surrounding cell centers, clamped at the lattice edge.
/// Falls back to bilinear, which skips absent cells, when any of them is
/// absent.
#[must_use]
pub fn cubic_interpolate(data: &Array2<f64>, row: f64, col: f64) -> f64 {
    let (nrows, ncols) = data.dim();
    let (Some((r0, _, rf)), Some((c0, _, cf))) =
        (axis_position(row, nrows), axis_position(col, ncols))
    else {
        return f64::NAN;
    };

    let mut values = [[0.0_f64; 4]; 4];
    for (j, row_values) in values.iter_mut().enumerate() {
        let r = (r0 as isize + j as isize - 1).clamp(0, nrows as isize - 1) as usize;
        for (i, value) in row_values.iter_mut().enumerate() {
            let c = (c0 as isize + i as isize - 1).clamp(0, ncols as isize - 1) as usize;
            *value = data[[r, c]];
            if value.is_nan() {
                return bilinear_interpolate(data, row, col);
            }
        }
    }

    let mut columns = [0.0_f64; 4];
    for (j, v) in values.iter().enumerate() {
        columns[j] = cubic_1d(v[0], v[1], v[2], v[3], cf);
    }
    cubic_1d(columns[0], columns[1], columns[2], columns[3], rf)
}

/// 1D cubic interpolation using Catmull-Rom spline.
fn cubic_1d(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;

    a * t3 + b * t2 + c * t + d
}

/// Resample `data`, laid out by `source`, at every cell center of `target`.
///
/// Target rows are processed in parallel.
///
/// # Errors
///
/// Fails when `data` does not match the source header shape.
pub fn resample_grid(
    data: &Array2<f64>,
    source: &GridHeader,
    target: &GridHeader,
    method: ResampleMethod,
) -> Result<Array2<f64>> {
    if data.dim() != source.shape() {
        return Err(GridError::ShapeMismatch {
            expected: source.shape(),
            found: data.dim(),
        });
    }
    let (nrows, ncols) = target.shape();
    let output: Vec<f64> = (0..nrows)
        .into_par_iter()
        .flat_map_iter(|r| {
            (0..ncols).map(move |c| {
                let (x, y) = target.cell_center(r, c);
                let (row, col) = source.fractional_index(x, y);
                method.sample(data, row, col)
            })
        })
        .collect();
    Ok(Array2::from_shape_vec((nrows, ncols), output)?)
}
