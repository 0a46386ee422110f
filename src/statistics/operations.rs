//! Core statistical operations
//!
//! This module defines the reduction operations applied to samples and the
//! basic statistics summary of a set of values. Every function here works
//! on plain `f64` slices; absent cells are represented as `NaN`.

use crate::errors::{GridError, Result};
use crate::table::OrderedFields;
use std::fmt;
use std::str::FromStr;

/// Supported statistical operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatOperation {
    /// Arithmetic mean
    Mean,
    /// Population standard deviation
    Std,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
    /// Sum of values
    Sum,
    /// 50th percentile
    Median,
    /// Percentile in [0, 100], linear interpolation between ranks
    Percentile(f64),
}

impl StatOperation {
    /// Get the string representation of the operation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Std => "sd",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Median => "median",
            Self::Percentile(_) => "percentile",
        }
    }

    /// Suffix used when naming the output of a reduction
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Mean => "Mean".to_string(),
            Self::Std => "SD".to_string(),
            Self::Min => "Min".to_string(),
            Self::Max => "Max".to_string(),
            Self::Sum => "Sum".to_string(),
            Self::Median => "Median".to_string(),
            Self::Percentile(p) => format!("{p}th percentile"),
        }
    }

    /// Apply the operation to finite `values`. Returns `NaN` for an empty
    /// sample.
    #[must_use]
    pub fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        match self {
            Self::Mean => mean(values),
            Self::Std => std_dev(values),
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Sum => values.iter().sum(),
            Self::Median => percentile(values, 50.0),
            Self::Percentile(p) => percentile(values, p),
        }
    }
}

impl fmt::Display for StatOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentile(p) => write!(f, "p{p}"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl FromStr for StatOperation {
    type Err = GridError;

    /// Parses `mean`, `sd`/`std`, `min`, `max`, `sum`, `median` and `pNN`
    /// (e.g. `p90`).
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "mean" => Ok(Self::Mean),
            "sd" | "std" => Ok(Self::Std),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "sum" => Ok(Self::Sum),
            "median" => Ok(Self::Median),
            other => {
                let p = other
                    .strip_prefix('p')
                    .and_then(|rest| rest.parse::<f64>().ok())
                    .filter(|p| (0.0..=100.0).contains(p))
                    .ok_or_else(|| GridError::Generic(format!("unknown statistic '{s}'")))?;
                Ok(Self::Percentile(p))
            }
        }
    }
}

#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Percentile `p` (0 to 100) with linear interpolation between the two
/// closest ranks
#[must_use]
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * weight
}

/// Summary statistics of the non-absent values of a grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicStats {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl BasicStats {
    /// Field names in output order
    pub const FIELDS: [&'static str; 9] = [
        "count", "sum", "mean", "sd", "min", "p25", "median", "p75", "max",
    ];

    /// Statistics of the finite entries of `values`. Every field except
    /// `count` is `NaN` when nothing is left.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Self {
                count: 0,
                sum: f64::NAN,
                mean: f64::NAN,
                sd: f64::NAN,
                min: f64::NAN,
                p25: f64::NAN,
                median: f64::NAN,
                p75: f64::NAN,
                max: f64::NAN,
            };
        }
        sorted.sort_by(f64::total_cmp);
        Self {
            count: sorted.len(),
            sum: sorted.iter().sum(),
            mean: mean(&sorted),
            sd: std_dev(&sorted),
            min: sorted[0],
            p25: percentile_sorted(&sorted, 25.0),
            median: percentile_sorted(&sorted, 50.0),
            p75: percentile_sorted(&sorted, 75.0),
            max: sorted[sorted.len() - 1],
        }
    }

    /// Values in [`BasicStats::FIELDS`] order
    #[must_use]
    pub fn values(&self) -> [f64; 9] {
        [
            self.count as f64,
            self.sum,
            self.mean,
            self.sd,
            self.min,
            self.p25,
            self.median,
            self.p75,
            self.max,
        ]
    }

    /// Statistics as ordered fields, each key prefixed with `prefix` and
    /// an underscore when a prefix is given
    #[must_use]
    pub fn to_fields(&self, prefix: Option<&str>) -> OrderedFields {
        let mut fields = OrderedFields::new();
        for (name, value) in Self::FIELDS.iter().zip(self.values()) {
            let key = match prefix {
                Some(p) => format!("{p}_{name}"),
                None => (*name).to_string(),
            };
            if *name == "count" {
                fields.insert(key, self.count);
            } else {
                fields.insert(key, value);
            }
        }
        fields
    }
}
