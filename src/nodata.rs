//! Cell types and the NODATA / mask engine
//!
//! Grids keep NODATA cells in an "absent" internal form:
//!
//! - floating point cells hold `NaN`;
//! - integer cells carry a boolean mask next to the values, so a NODATA
//!   sentinel can never collide with a real measurement.
//!
//! The external form (the literal NODATA value written in place of every
//! absent cell) is only ever produced as a copy for serialization, which
//! keeps exports round-trip neutral.

use crate::errors::{GridError, Result};
use ndarray::{Array2, Zip};
use num_traits::{NumCast, ToPrimitive};
use std::fmt::{Debug, Display};

/// Numeric element type of a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    Float32,
}

impl CellKind {
    /// Whether absent cells are stored as `NaN` (true) or masked (false)
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32)
    }

    /// Conventional dtype name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::Float32 => "float32",
        }
    }
}

/// A numeric type that can be stored in a grid cell
pub trait CellValue:
    Copy + PartialEq + PartialOrd + Debug + Display + NumCast + Default + Send + Sync + 'static
{
    /// Element kind of this type
    const KIND: CellKind;

    /// `true` for the floating point absent marker
    fn is_nan(self) -> bool;

    /// Lossy cast from `f64`; `None` when the value cannot be represented
    /// (NaN or out of range for integer types).
    fn cast_from(value: f64) -> Option<Self> {
        <Self as NumCast>::from(value)
    }

    /// Cast from `f64` only when the value survives the round trip, so a
    /// fractional NODATA value never matches a truncated integer cell.
    fn exact_from(value: f64) -> Option<Self> {
        Self::cast_from(value).filter(|v| Self::KIND.is_float() || v.as_f64() == value)
    }

    /// Widen to `f64`
    fn as_f64(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }
}

macro_rules! impl_integer_cell {
    ($($t:ty => $kind:ident),* $(,)?) => {
        $(
            impl CellValue for $t {
                const KIND: CellKind = CellKind::$kind;

                fn is_nan(self) -> bool {
                    false
                }
            }
        )*
    };
}

impl_integer_cell!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
);

impl CellValue for f32 {
    const KIND: CellKind = CellKind::Float32;

    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
}

/// Cell array in internal ("absent") representation
///
/// For integer kinds `mask` is always `Some` and has the shape of
/// `values`; for floating kinds it is always `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cells<T> {
    values: Array2<T>,
    mask: Option<Array2<bool>>,
}

impl<T: CellValue> Cells<T> {
    /// Wrap raw values; nothing is absent until [`Cells::to_internal`] runs.
    #[must_use]
    pub fn from_values(values: Array2<T>) -> Self {
        let mask = if T::KIND.is_float() {
            None
        } else {
            Some(Array2::from_elem(values.raw_dim(), false))
        };
        Self { values, mask }
    }

    /// Cast `f64` data into this cell type. Values that cannot be
    /// represented (NaN in an integer grid, out of range) become absent.
    #[must_use]
    pub fn from_f64(data: &Array2<f64>) -> Self {
        if T::KIND.is_float() {
            let values = data.mapv(|v| T::cast_from(v).unwrap_or_default());
            return Self { values, mask: None };
        }
        let mask = data.mapv(|v| T::cast_from(v).is_none());
        let values = data.mapv(|v| T::cast_from(v).unwrap_or_default());
        Self {
            values,
            mask: Some(mask),
        }
    }

    /// All-absent cells of the given shape
    #[must_use]
    pub fn absent(rows: usize, cols: usize) -> Self {
        Self::from_f64(&Array2::from_elem((rows, cols), f64::NAN))
    }

    /// (rows, columns)
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Raw values. Absent integer cells hold an unspecified filler value;
    /// check [`Cells::is_absent`] before reading them.
    #[must_use]
    pub fn values(&self) -> &Array2<T> {
        &self.values
    }

    /// Whether the cell at `(row, col)` is absent
    #[must_use]
    pub fn is_absent(&self, row: usize, col: usize) -> bool {
        match &self.mask {
            Some(mask) => mask[[row, col]],
            None => self.values[[row, col]].is_nan(),
        }
    }

    /// Cell value, `None` when absent
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if self.is_absent(row, col) {
            None
        } else {
            Some(self.values[[row, col]])
        }
    }

    /// Boolean array, `true` where the cell is absent
    #[must_use]
    pub fn absent_mask(&self) -> Array2<bool> {
        match &self.mask {
            Some(mask) => mask.clone(),
            None => self.values.mapv(CellValue::is_nan),
        }
    }

    /// Number of absent cells
    #[must_use]
    pub fn absent_count(&self) -> usize {
        match &self.mask {
            Some(mask) => mask.iter().filter(|&&m| m).count(),
            None => self.values.iter().filter(|v| v.is_nan()).count(),
        }
    }

    /// Convert to the sentinel-free internal form: every cell equal to
    /// `nodata` becomes absent. Idempotent.
    pub fn to_internal(&mut self, nodata: f64) {
        let Some(sentinel) = T::exact_from(nodata) else {
            return;
        };
        match &mut self.mask {
            Some(mask) => {
                Zip::from(mask).and(&self.values).for_each(|m, &v| {
                    if v == sentinel {
                        *m = true;
                    }
                });
            }
            None => {
                if let Some(nan) = T::cast_from(f64::NAN) {
                    self.values.mapv_inplace(|v| if v == sentinel { nan } else { v });
                }
            }
        }
    }

    /// External copy with `nodata` written into every absent cell.
    ///
    /// The receiver is left in internal form.
    ///
    /// # Errors
    ///
    /// Returns an error when `nodata` cannot be represented in the cell type.
    pub fn to_external(&self, nodata: f64) -> Result<Array2<T>> {
        let sentinel = T::cast_from(nodata).ok_or_else(|| {
            GridError::Generic(format!(
                "NODATA value {nodata} cannot be stored in a {} grid",
                T::KIND.as_str()
            ))
        })?;
        let mut external = self.values.clone();
        match &self.mask {
            Some(mask) => {
                Zip::from(&mut external).and(mask).for_each(|v, &m| {
                    if m {
                        *v = sentinel;
                    }
                });
            }
            None => external.mapv_inplace(|v| if v.is_nan() { sentinel } else { v }),
        }
        Ok(external)
    }

    /// Widened copy with absent cells as `NaN`
    #[must_use]
    pub fn to_f64(&self) -> Array2<f64> {
        match &self.mask {
            Some(mask) => {
                let mut out = self.values.mapv(CellValue::as_f64);
                Zip::from(&mut out).and(mask).for_each(|v, &m| {
                    if m {
                        *v = f64::NAN;
                    }
                });
                out
            }
            None => self.values.mapv(CellValue::as_f64),
        }
    }

    /// Non-absent values in row-major order
    #[must_use]
    pub fn valid_values(&self) -> Vec<f64> {
        match &self.mask {
            Some(mask) => self
                .values
                .iter()
                .zip(mask.iter())
                .filter(|(_, m)| !**m)
                .map(|(v, _)| v.as_f64())
                .collect(),
            None => self
                .values
                .iter()
                .filter(|v| !v.is_nan())
                .map(|v| v.as_f64())
                .collect(),
        }
    }

    /// Mark every cell where `outside` is true as absent
    pub fn mark_absent(&mut self, outside: &Array2<bool>) {
        match &mut self.mask {
            Some(mask) => {
                Zip::from(mask).and(outside).for_each(|m, &o| {
                    if o {
                        *m = true;
                    }
                });
            }
            None => {
                if let Some(nan) = T::cast_from(f64::NAN) {
                    Zip::from(&mut self.values).and(outside).for_each(|v, &o| {
                        if o {
                            *v = nan;
                        }
                    });
                }
            }
        }
    }

    /// Apply `f` to every non-absent value
    pub fn map_valid(&mut self, f: impl Fn(T) -> T) {
        match &self.mask {
            Some(mask) => {
                Zip::from(&mut self.values).and(mask).for_each(|v, &m| {
                    if !m {
                        *v = f(*v);
                    }
                });
            }
            None => self.values.mapv_inplace(|v| if v.is_nan() { v } else { f(v) }),
        }
    }
}
