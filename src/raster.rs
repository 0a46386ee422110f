//! Base grid: one georeferenced 2-D array with its header, coordinate
//! system and display settings
//!
//! Every setter brings new data into the internal ("absent") form exactly
//! once; exporters work on an external copy, so a grid is never left
//! holding NODATA sentinels.

use crate::categorical::CategoricalRaster;
use crate::codec;
use crate::collection::Catalogued;
use crate::config::{RasterKind, ViewOverrides, ViewSpec};
use crate::errors::{GridError, Result};
use crate::header::{BoundingBox, GridHeader};
use crate::interpolation::{self, ResampleMethod};
use crate::nodata::{CellValue, Cells};
use crate::statistics::BasicStats;
use crate::table::OrderedFields;
use chrono::NaiveDate;
use ndarray::Array2;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Descriptive attributes of a grid
#[derive(Debug, Clone, PartialEq)]
pub struct RasterInfo {
    pub varname: String,
    pub varalias: String,
    pub units: String,
    pub description: String,
    pub source: String,
    pub date: Option<NaiveDate>,
}

impl RasterInfo {
    #[must_use]
    pub fn for_kind(kind: RasterKind) -> Self {
        let defaults = kind.defaults();
        Self {
            varname: defaults.varname.to_string(),
            varalias: defaults.varalias.to_string(),
            units: defaults.units.to_string(),
            description: defaults.description.to_string(),
            source: String::new(),
            date: None,
        }
    }
}

/// One cell flattened into point form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
    /// `NaN` for absent cells
    pub value: f64,
    pub row: usize,
    pub col: usize,
}

/// A georeferenced grid of `T` cells
#[derive(Debug, Clone)]
pub struct Raster<T: CellValue> {
    name: String,
    kind: RasterKind,
    pub info: RasterInfo,
    header: GridHeader,
    cells: Cells<T>,
    backup: Option<Cells<T>>,
    aoi_active: bool,
    coordinate_system: Option<String>,
    view: ViewSpec,
    path_asc: Option<PathBuf>,
    path_prj: Option<PathBuf>,
}

impl<T: CellValue> Raster<T> {
    /// Grid with every cell absent
    #[must_use]
    pub fn new(name: impl Into<String>, kind: RasterKind, header: GridHeader) -> Self {
        let (rows, cols) = header.shape();
        Self {
            name: name.into(),
            kind,
            info: RasterInfo::for_kind(kind),
            header,
            cells: Cells::absent(rows, cols),
            backup: None,
            aoi_active: false,
            coordinate_system: None,
            view: ViewSpec::for_kind(kind),
            path_asc: None,
            path_prj: None,
        }
    }

    /// Grid holding `array`, NODATA cells masked.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] when `array` disagrees with `header`.
    pub fn from_array(
        name: impl Into<String>,
        kind: RasterKind,
        header: GridHeader,
        array: Array2<T>,
    ) -> Result<Self> {
        let mut raster = Self::new(name, kind, header);
        raster.set_array(array)?;
        Ok(raster)
    }

    /// Grid holding `data` cast to `T`; `NaN` and unrepresentable values
    /// become absent.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] when `data` disagrees with `header`.
    pub fn from_f64(
        name: impl Into<String>,
        kind: RasterKind,
        header: GridHeader,
        data: &Array2<f64>,
    ) -> Result<Self> {
        let mut raster = Self::new(name, kind, header);
        raster.set_array_f64(data)?;
        Ok(raster)
    }

    /// Load a grid file. Without an explicit `prj` the sibling `.prj` file
    /// is read when it exists.
    ///
    /// # Errors
    ///
    /// Fails on I/O or parse errors; nothing is returned for a bad file.
    pub fn load(
        name: impl Into<String>,
        kind: RasterKind,
        asc: &Path,
        prj: Option<&Path>,
    ) -> Result<Self> {
        let (header, raw) = codec::read_grid(asc)?;
        let mut raster = Self::new(name, kind, header);
        raster.set_array_f64(&raw)?;
        raster.load_prj(asc, prj)?;
        raster.path_asc = Some(asc.to_path_buf());
        info!(
            name = %raster.name,
            path = %asc.display(),
            rows = header.nrows,
            cols = header.ncols,
            "loaded grid"
        );
        Ok(raster)
    }

    /// Load only the header (and coordinate system) of a grid file; cells
    /// stay absent.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a malformed header.
    pub fn load_header(
        name: impl Into<String>,
        kind: RasterKind,
        asc: &Path,
        prj: Option<&Path>,
    ) -> Result<Self> {
        let header = codec::read_header(asc)?;
        let mut raster = Self::new(name, kind, header);
        raster.load_prj(asc, prj)?;
        raster.path_asc = Some(asc.to_path_buf());
        Ok(raster)
    }

    fn load_prj(&mut self, asc: &Path, prj: Option<&Path>) -> Result<()> {
        let prj_path = prj.map_or_else(|| codec::companion_prj_path(asc), Path::to_path_buf);
        self.coordinate_system = codec::read_prj(&prj_path)?;
        self.path_prj = self.coordinate_system.as_ref().map(|_| prj_path);
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub const fn kind(&self) -> RasterKind {
        self.kind
    }

    #[must_use]
    pub const fn header(&self) -> &GridHeader {
        &self.header
    }

    /// (rows, columns)
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        self.header.shape()
    }

    #[must_use]
    pub const fn nodata_value(&self) -> f64 {
        self.header.nodata_value
    }

    /// Cells in internal form
    #[must_use]
    pub const fn cells(&self) -> &Cells<T> {
        &self.cells
    }

    /// Cell value, `None` when absent
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.cells.get(row, col)
    }

    #[must_use]
    pub fn coordinate_system(&self) -> Option<&str> {
        self.coordinate_system.as_deref()
    }

    pub fn set_coordinate_system(&mut self, coordinate_system: Option<String>) {
        self.coordinate_system = coordinate_system;
    }

    #[must_use]
    pub const fn view(&self) -> &ViewSpec {
        &self.view
    }

    /// Merge `overrides` into the display settings
    pub fn set_view(&mut self, overrides: &ViewOverrides) {
        self.view = self.view.with_overrides(overrides);
    }

    #[must_use]
    pub fn path_asc(&self) -> Option<&Path> {
        self.path_asc.as_deref()
    }

    #[must_use]
    pub fn path_prj(&self) -> Option<&Path> {
        self.path_prj.as_deref()
    }

    #[must_use]
    pub const fn date(&self) -> Option<NaiveDate> {
        self.info.date
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.info.date = date;
    }

    /// Whether an AOI with a saved backup is currently applied
    #[must_use]
    pub const fn is_aoi_active(&self) -> bool {
        self.aoi_active
    }

    #[must_use]
    pub const fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    /// Replace the header. A header of a different shape resets every cell
    /// to absent.
    pub fn set_header(&mut self, header: GridHeader) {
        if header.shape() != self.header.shape() {
            let (rows, cols) = header.shape();
            self.cells = Cells::absent(rows, cols);
            self.discard_backup();
        }
        self.header = header;
    }

    /// Adopt the header and coordinate system of `reference`, optionally
    /// with another NODATA value. Cells are reset to absent.
    pub fn copy_structure<U: CellValue>(&mut self, reference: &Raster<U>, nodata: Option<f64>) {
        let header = match nodata {
            Some(value) => reference.header.with_nodata(value),
            None => reference.header,
        };
        let (rows, cols) = header.shape();
        self.header = header;
        self.cells = Cells::absent(rows, cols);
        self.discard_backup();
        self.coordinate_system = reference.coordinate_system.clone();
    }

    fn check_shape(&self, found: (usize, usize)) -> Result<()> {
        if found == self.header.shape() {
            Ok(())
        } else {
            Err(GridError::ShapeMismatch {
                expected: self.header.shape(),
                found,
            })
        }
    }

    /// Replace the cell array; NODATA cells are masked and the kind's value
    /// clamp applied.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] when `array` disagrees with the header.
    pub fn set_array(&mut self, array: Array2<T>) -> Result<()> {
        self.check_shape(array.dim())?;
        let mut cells = Cells::from_values(array);
        cells.to_internal(self.header.nodata_value);
        self.cells = cells;
        self.apply_kind_clamp();
        Ok(())
    }

    /// Replace the cell array from `f64` data cast to `T`; `NaN` and values
    /// `T` cannot hold become absent.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] when `data` disagrees with the header.
    pub fn set_array_f64(&mut self, data: &Array2<f64>) -> Result<()> {
        self.check_shape(data.dim())?;
        let mut cells = Cells::from_f64(data);
        cells.to_internal(self.header.nodata_value);
        self.cells = cells;
        self.apply_kind_clamp();
        Ok(())
    }

    fn apply_kind_clamp(&mut self) {
        if let Some((lower, upper)) = self.kind.defaults().clamp {
            self.clip_values(lower, upper);
        }
    }

    /// External copy of the cells with the NODATA value in absent cells.
    ///
    /// # Errors
    ///
    /// Fails when the NODATA value cannot be stored in `T`.
    pub fn to_external(&self) -> Result<Array2<T>> {
        self.cells.to_external(self.header.nodata_value)
    }

    /// Widened copy with absent cells as `NaN`
    #[must_use]
    pub fn to_f64(&self) -> Array2<f64> {
        self.cells.to_f64()
    }

    /// Non-absent values in row-major order
    #[must_use]
    pub fn valid_values(&self) -> Vec<f64> {
        self.cells.valid_values()
    }

    /// Restrict the grid to the non-zero, non-absent cells of `aoi`.
    ///
    /// # Errors
    ///
    /// Fails on a shape mismatch, or when an AOI is already applied and
    /// `inplace` is false.
    pub fn apply_aoi<U: CellValue>(&mut self, aoi: &Raster<U>, inplace: bool) -> Result<()> {
        let outside = aoi
            .cells
            .to_f64()
            .mapv(|v| v.is_nan() || v == 0.0);
        self.apply_aoi_mask(&outside, inplace)
    }

    /// Mark every cell where `outside` is true as absent.
    ///
    /// Unless `inplace` is set the current cells are saved first and the AOI
    /// is flagged active; only one level of backup exists, so applying a
    /// second AOI before [`Raster::release_aoi`] is rejected. An `inplace`
    /// application saves nothing and cannot be released.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] or [`GridError::AoiAlreadyActive`].
    pub fn apply_aoi_mask(&mut self, outside: &Array2<bool>, inplace: bool) -> Result<()> {
        self.check_shape(outside.dim())?;
        if !inplace {
            if self.aoi_active {
                return Err(GridError::AoiAlreadyActive {
                    name: self.name.clone(),
                });
            }
            self.backup = Some(self.cells.clone());
            self.aoi_active = true;
        }
        self.cells.mark_absent(outside);
        debug!(name = %self.name, inplace, "applied AOI");
        Ok(())
    }

    /// Restore the cells saved by [`Raster::apply_aoi`]; no-op without an
    /// active AOI.
    pub fn release_aoi(&mut self) {
        if let Some(backup) = self.backup.take() {
            self.cells = backup;
            debug!(name = %self.name, "released AOI");
        }
        self.aoi_active = false;
    }

    /// Drop the AOI backup without restoring it
    pub(crate) fn discard_backup(&mut self) {
        self.backup = None;
        self.aoi_active = false;
    }

    /// Clamp every non-absent value into [`lower`, `upper`].
    pub fn clip_values(&mut self, lower: f64, upper: f64) {
        let low = T::cast_from(lower);
        let high = T::cast_from(upper);
        self.cells.map_valid(|v| {
            let x = v.as_f64();
            if x < lower {
                low.unwrap_or(v)
            } else if x > upper {
                high.unwrap_or(v)
            } else {
                v
            }
        });
    }

    /// Copy with values clamped into [`lower`, `upper`]
    #[must_use]
    pub fn clipped(&self, lower: f64, upper: f64) -> Self {
        let mut copy = self.clone();
        copy.clip_values(lower, upper);
        copy
    }

    /// Interpolate this grid at every cell center of `reference`.
    ///
    /// Both grids are assumed to share a coordinate system. Returns the
    /// values in the reference's shape with absent cells as `NaN`.
    ///
    /// # Errors
    ///
    /// Fails when the cell array disagrees with the header.
    pub fn resample<U: CellValue>(
        &self,
        reference: &Raster<U>,
        method: ResampleMethod,
    ) -> Result<Array2<f64>> {
        interpolation::resample_grid(&self.to_f64(), &self.header, &reference.header, method)
    }

    /// Resample onto `reference` and adopt its header and coordinate
    /// system. The NODATA value of `reference` is kept when `T` can store
    /// it, the current one otherwise.
    ///
    /// # Errors
    ///
    /// Fails when resampling fails.
    pub fn rebase<U: CellValue>(
        &mut self,
        reference: &Raster<U>,
        method: ResampleMethod,
    ) -> Result<()> {
        let values = self.resample(reference, method)?;
        let nodata = if T::exact_from(reference.header.nodata_value).is_some() {
            reference.header.nodata_value
        } else {
            self.header.nodata_value
        };
        self.header = reference.header.with_nodata(nodata);
        self.discard_backup();
        self.coordinate_system = reference.coordinate_system.clone();
        self.set_array_f64(&values)?;
        debug!(name = %self.name, method = %method, "rebased grid");
        Ok(())
    }

    /// Cells as points at their centers, row-major
    #[must_use]
    pub fn extract_points(&self, drop_absent: bool) -> Vec<GridPoint> {
        let (nrows, ncols) = self.shape();
        let mut points = Vec::with_capacity(nrows * ncols);
        for row in 0..nrows {
            for col in 0..ncols {
                let value = self.cells.get(row, col).map_or(f64::NAN, CellValue::as_f64);
                if drop_absent && value.is_nan() {
                    continue;
                }
                let (x, y) = self.header.cell_center(row, col);
                points.push(GridPoint {
                    x,
                    y,
                    value,
                    row,
                    col,
                });
            }
        }
        points
    }

    #[must_use]
    pub fn basic_statistics(&self) -> BasicStats {
        BasicStats::from_values(&self.valid_values())
    }

    #[must_use]
    pub fn bbox(&self) -> BoundingBox {
        self.header.bbox()
    }

    /// AOI grid of the cells whose value lies in [`lower`, `upper`]
    ///
    /// # Errors
    ///
    /// Fails only if the new grid cannot be built.
    pub fn area_of_interest(&self, lower: f64, upper: f64) -> Result<CategoricalRaster<u8>> {
        let inside = self
            .to_f64()
            .mapv(|v| u8::from(!v.is_nan() && v >= lower && v <= upper));
        let name = format!("{} {lower}-{upper}", self.info.varname);
        let mut raster = Raster::new(name, RasterKind::Aoi, self.header.with_nodata(0.0));
        raster.coordinate_system = self.coordinate_system.clone();
        raster.set_array(inside)?;
        CategoricalRaster::from_raster(raster)
    }

    /// Biodiversity area in hectare equivalents from a habitat quality
    /// grid: `b_a * cellsize^2 * q / 10000`
    ///
    /// # Errors
    ///
    /// Fails only if the new grid cannot be built.
    pub fn biodiversity_area(&self, b_a: f64) -> Result<Raster<f32>> {
        let factor = b_a * self.header.cellsize.powi(2) / 10_000.0;
        let values = self.to_f64().mapv(|q| q * factor);
        let mut raster = Raster::new(
            format!("{} Ba", self.name),
            RasterKind::BiodiversityArea,
            self.header,
        );
        raster.coordinate_system = self.coordinate_system.clone();
        raster.info.date = self.info.date;
        raster.set_array_f64(&values)?;
        Ok(raster)
    }

    /// Ordered metadata record
    #[must_use]
    pub fn metadata(&self) -> OrderedFields {
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map_or(Value::Null, |p| Value::from(p.display().to_string()))
        };
        OrderedFields::new()
            .with("Name", self.name.as_str())
            .with("Variable", self.info.varname.as_str())
            .with("VarAlias", self.info.varalias.as_str())
            .with("Units", self.info.units.as_str())
            .with(
                "Date",
                self.info
                    .date
                    .map_or(Value::Null, |d| Value::from(d.format("%Y-%m-%d").to_string())),
            )
            .with("Source", self.info.source.as_str())
            .with("Description", self.info.description.as_str())
            .with("cellsize", self.header.cellsize)
            .with("ncols", self.header.ncols)
            .with("nrows", self.header.nrows)
            .with("xllcorner", self.header.xllcorner)
            .with("yllcorner", self.header.yllcorner)
            .with("NODATA_value", self.header.nodata_value)
            .with(
                "Prj",
                self.coordinate_system
                    .as_deref()
                    .map_or(Value::Null, Value::from),
            )
            .with("Path_ASC", path(&self.path_asc))
            .with("Path_PRJ", path(&self.path_prj))
    }

    /// Write the grid file to `path`, NODATA substituted for absent cells.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or an unrepresentable NODATA value.
    pub fn export_asc(&self, path: &Path) -> Result<PathBuf> {
        let external = self.to_external()?;
        codec::write_grid(path, &self.header, &external)
    }

    /// Write `<folder>/<filename>.asc` and, when a coordinate system is
    /// set, `<folder>/<filename>.prj`. The grid name is used by default.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or an unrepresentable NODATA value.
    pub fn export(&self, folder: &Path, filename: Option<&str>) -> Result<Vec<PathBuf>> {
        let stem = filename.unwrap_or(&self.name);
        let mut written = vec![self.export_asc(&folder.join(format!("{stem}.asc")))?];
        if let Some(cs) = &self.coordinate_system {
            written.push(codec::write_prj(&folder.join(format!("{stem}.prj")), cs)?);
        }
        info!(name = %self.name, folder = %folder.display(), "exported grid");
        Ok(written)
    }
}

impl<T: CellValue> Catalogued for Raster<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> OrderedFields {
        Raster::metadata(self)
    }
}
