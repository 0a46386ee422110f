//! Grid codec: the six-line-header ASCII grid format and its one-line
//! coordinate-system side file
//!
//! ```text
//! ncols         3
//! nrows         2
//! xllcorner     500000
//! yllcorner     6000000
//! cellsize      30
//! NODATA_value  -9999
//!  1 2 3
//!  4 -9999 6
//! ```
//!
//! Parsing is all-or-nothing: any malformed header line or row aborts the
//! load before an array is built.

use crate::errors::{GridError, Result};
use crate::header::GridHeader;
use crate::nodata::CellValue;
use ndarray::Array2;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Width of the key column in written headers
const KEY_WIDTH: usize = 14;

/// Path of the coordinate-system side file that accompanies `grid_path`
#[must_use]
pub fn companion_prj_path(grid_path: &Path) -> PathBuf {
    grid_path.with_extension("prj")
}

/// Read only the header of a grid file.
///
/// # Errors
///
/// Fails on I/O errors or when the header is malformed.
pub fn read_header(path: &Path) -> Result<GridHeader> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::with_capacity(6);
    for line in reader.lines().take(6) {
        lines.push(line?);
    }
    parse_header(path, &lines)
}

/// Read a grid file into its header and the raw cell tokens as `f64`.
///
/// NODATA cells still carry the literal NODATA value; the caller decides
/// how to represent them.
///
/// # Errors
///
/// Fails on I/O errors, a malformed header, or rows whose count or width
/// disagree with the header.
pub fn read_grid(path: &Path) -> Result<(GridHeader, Array2<f64>)> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().collect::<std::io::Result<Vec<String>>>()?;
    let header_lines = lines.get(..6).unwrap_or(&lines);
    let header = parse_header(path, header_lines)?;

    let mut data = Vec::new();
    let mut rows = 0;
    for (offset, line) in lines.iter().enumerate().skip(6) {
        let line_no = offset + 1;
        if line.trim().is_empty() {
            continue;
        }
        if rows == header.nrows {
            return Err(GridError::parse(
                path,
                line_no,
                format!("more than {} data rows", header.nrows),
            ));
        }
        let before = data.len();
        for token in line.split_whitespace() {
            let value = token.parse::<f64>().map_err(|_| {
                GridError::parse(path, line_no, format!("non-numeric cell value '{token}'"))
            })?;
            data.push(value);
        }
        let width = data.len() - before;
        if width != header.ncols {
            return Err(GridError::parse(
                path,
                line_no,
                format!("expected {} values, found {width}", header.ncols),
            ));
        }
        rows += 1;
    }
    if rows != header.nrows {
        return Err(GridError::parse(
            path,
            lines.len(),
            format!("expected {} data rows, found {rows}", header.nrows),
        ));
    }

    debug!(path = %path.display(), rows = header.nrows, cols = header.ncols, "read grid");
    let array = Array2::from_shape_vec(header.shape(), data)?;
    Ok((header, array))
}

/// Write a grid file. `external` must already hold the NODATA value in
/// every absent cell.
///
/// # Errors
///
/// Fails on I/O errors or when `external` does not match the header shape.
pub fn write_grid<T: CellValue>(
    path: &Path,
    header: &GridHeader,
    external: &Array2<T>,
) -> Result<PathBuf> {
    if external.dim() != header.shape() {
        return Err(GridError::ShapeMismatch {
            expected: header.shape(),
            found: external.dim(),
        });
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for (key, value) in header.entries() {
        writeln!(writer, "{key:<width$}{value}", width = KEY_WIDTH)?;
    }
    for row in external.rows() {
        let mut line = String::with_capacity(row.len() * 8);
        for value in row {
            line.push(' ');
            line.push_str(&value.to_string());
        }
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    debug!(path = %path.display(), "wrote grid");
    Ok(path.to_path_buf())
}

/// Read the coordinate-system side file. A missing file is not an error.
///
/// # Errors
///
/// Fails when the file exists but cannot be read.
pub fn read_prj(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let first = content.lines().next().unwrap_or_default();
    Ok(Some(first.to_string()))
}

/// Write the coordinate-system side file verbatim.
///
/// # Errors
///
/// Fails on I/O errors.
pub fn write_prj(path: &Path, coordinate_system: &str) -> Result<PathBuf> {
    fs::write(path, coordinate_system)?;
    Ok(path.to_path_buf())
}

fn parse_header(path: &Path, lines: &[String]) -> Result<GridHeader> {
    if lines.len() < 6 {
        return Err(GridError::parse(
            path,
            lines.len(),
            format!("header has {} lines, expected 6", lines.len()),
        ));
    }
    let mut values = [0.0_f64; 6];
    for (i, (line, key)) in lines.iter().zip(GridHeader::KEYS).enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [found_key, raw] = tokens.as_slice() else {
            return Err(GridError::parse(
                path,
                i + 1,
                format!("expected '{key} <value>', found '{}'", line.trim()),
            ));
        };
        if *found_key != key {
            return Err(GridError::parse(
                path,
                i + 1,
                format!("expected key '{key}', found '{found_key}'"),
            ));
        }
        values[i] = raw.parse::<f64>().map_err(|_| {
            GridError::parse(path, i + 1, format!("non-numeric value '{raw}' for '{key}'"))
        })?;
    }

    let count = |i: usize| -> Result<usize> {
        let v = values[i];
        if v.fract() != 0.0 || v < 1.0 {
            return Err(GridError::parse(
                path,
                i + 1,
                format!("'{}' must be a positive integer, found {v}", GridHeader::KEYS[i]),
            ));
        }
        Ok(v as usize)
    };
    let ncols = count(0)?;
    let nrows = count(1)?;
    if ncols.checked_mul(nrows).is_none() {
        return Err(GridError::parse(
            path,
            2,
            format!("grid of {nrows} x {ncols} cells is too large"),
        ));
    }
    if !(values[4].is_finite() && values[4] > 0.0) {
        return Err(GridError::parse(path, 5, "cellsize must be a positive finite number"));
    }

    Ok(GridHeader::new(
        ncols, nrows, values[2], values[3], values[4], values[5],
    ))
}
