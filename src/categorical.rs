//! Categorical grids: integer category ids resolved through an attribute
//! table
//!
//! NODATA is fixed to 0 for every categorical grid, so id 0 never names a
//! category. Table and cells are mutated together by [`CategoricalRaster::reclassify`].

use crate::collection::Catalogued;
use crate::config::{EngineConfig, RasterKind, ViewOverrides};
use crate::errors::{GridError, Result};
use crate::header::GridHeader;
use crate::interpolation::ResampleMethod;
use crate::nodata::CellValue;
use crate::raster::Raster;
use crate::statistics::BasicStats;
use crate::table::{CategoryRow, CategoryTable, OrderedFields};
use chrono::NaiveDate;
use ndarray::Array2;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// NODATA value of every categorical grid
pub const CATEGORICAL_NODATA: f64 = 0.0;

/// Area accounting of one category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryArea {
    pub id: u32,
    pub name: String,
    pub alias: String,
    pub cell_count: usize,
    pub area_m2: f64,
    pub area_ha: f64,
    pub area_km2: f64,
    /// Fraction of all counted cells
    pub area_f: f64,
    /// Percentage of all counted cells, rounded to 2 decimals
    pub area_pct: f64,
}

impl CategoryArea {
    /// Column names in output order
    pub const FIELDS: [&'static str; 6] = [
        "Cell_count",
        "Area_m2",
        "Area_ha",
        "Area_km2",
        "Area_f",
        "Area_%",
    ];

    #[must_use]
    pub fn to_fields(&self) -> OrderedFields {
        OrderedFields::new()
            .with(Self::FIELDS[0], self.cell_count)
            .with(Self::FIELDS[1], self.area_m2)
            .with(Self::FIELDS[2], self.area_ha)
            .with(Self::FIELDS[3], self.area_km2)
            .with(Self::FIELDS[4], self.area_f)
            .with(Self::FIELDS[5], self.area_pct)
    }
}

/// Statistics of a sampled grid inside one category
#[derive(Debug, Clone, PartialEq)]
pub struct ZonalStats {
    pub id: u32,
    pub name: String,
    pub alias: String,
    pub stats: BasicStats,
}

impl ZonalStats {
    /// Statistics as `<varname>_<statistic>` fields
    #[must_use]
    pub fn to_fields(&self, varname: &str, skip_count: bool) -> OrderedFields {
        let mut fields = self.stats.to_fields(Some(varname));
        if skip_count {
            fields.remove(&format!("{varname}_count"));
        }
        fields
    }
}

/// Category id held by a cell value, if it is a non-negative integer
fn id_of<T: CellValue>(value: T) -> Option<u32> {
    let x = value.as_f64();
    (x >= 0.0 && x.fract() == 0.0 && x <= f64::from(u32::MAX)).then_some(x as u32)
}

/// A grid of category ids with its attribute table
#[derive(Debug, Clone)]
pub struct CategoricalRaster<T: CellValue> {
    raster: Raster<T>,
    table: CategoryTable,
    path_csv: Option<PathBuf>,
}

impl<T: CellValue> CategoricalRaster<T> {
    /// Empty categorical grid; preset kinds start with their fixed table.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: RasterKind, header: GridHeader) -> Self {
        let raster = Raster::new(name, kind, header.with_nodata(CATEGORICAL_NODATA));
        let mut categorical = Self {
            raster,
            table: CategoryTable::empty(),
            path_csv: None,
        };
        categorical.reset_table();
        categorical
    }

    /// Wrap a grid, forcing its NODATA value to 0. Cells holding 0 become
    /// absent.
    ///
    /// # Errors
    ///
    /// Fails only if the cells cannot be re-masked.
    pub fn from_raster(raster: Raster<T>) -> Result<Self> {
        let mut raster = raster;
        if raster.nodata_value() != CATEGORICAL_NODATA {
            let data = raster.to_f64();
            raster.set_header(raster.header().with_nodata(CATEGORICAL_NODATA));
            raster.set_array_f64(&data)?;
        }
        let mut categorical = Self {
            raster,
            table: CategoryTable::empty(),
            path_csv: None,
        };
        categorical.reset_table();
        Ok(categorical)
    }

    /// Categorical grid holding `array`, with an optional table.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] when `array` disagrees with `header`.
    pub fn from_array(
        name: impl Into<String>,
        kind: RasterKind,
        header: GridHeader,
        array: Array2<T>,
        table: Option<CategoryTable>,
    ) -> Result<Self> {
        let mut categorical = Self::new(name, kind, header);
        categorical.set_array(array)?;
        if let Some(table) = table {
            categorical.set_table(table);
        }
        Ok(categorical)
    }

    /// Load a grid file, its coordinate system and optionally a table file.
    ///
    /// # Errors
    ///
    /// Fails on I/O or parse errors of any of the files.
    pub fn load(
        name: impl Into<String>,
        kind: RasterKind,
        asc: &Path,
        prj: Option<&Path>,
        table: Option<&Path>,
    ) -> Result<Self> {
        let raster = Raster::load(name, kind, asc, prj)?;
        let mut categorical = Self::from_raster(raster)?;
        if let Some(path) = table {
            categorical.load_table(path)?;
        }
        Ok(categorical)
    }

    #[must_use]
    pub const fn raster(&self) -> &Raster<T> {
        &self.raster
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.raster.set_name(name);
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) {
        self.raster.set_date(date);
    }

    pub fn set_coordinate_system(&mut self, coordinate_system: Option<String>) {
        self.raster.set_coordinate_system(coordinate_system);
    }

    /// Mask the cells outside `aoi`; see [`Raster::apply_aoi`].
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] or [`GridError::AoiAlreadyActive`].
    pub fn apply_aoi<U: CellValue>(&mut self, aoi: &Raster<U>, inplace: bool) -> Result<()> {
        self.raster.apply_aoi(aoi, inplace)
    }

    pub fn release_aoi(&mut self) {
        self.raster.release_aoi();
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.raster.name()
    }

    #[must_use]
    pub const fn kind(&self) -> RasterKind {
        self.raster.kind()
    }

    #[must_use]
    pub const fn table(&self) -> &CategoryTable {
        &self.table
    }

    #[must_use]
    pub fn path_csv(&self) -> Option<&Path> {
        self.path_csv.as_deref()
    }

    fn reset_table(&mut self) {
        let kind = self.raster.kind();
        if kind.derives_table() {
            self.derive_zone_table();
        } else if let Some(preset) = kind.defaults().preset_table {
            self.set_table(preset());
        } else {
            self.set_table(CategoryTable::empty());
        }
    }

    fn derive_zone_table(&mut self) {
        let ids = self.present_ids();
        let table = CategoryTable::zones(&ids, &self.raster.info.varname, &self.raster.info.varalias);
        self.set_table(table);
    }

    /// Replace the table and regenerate the derived display state
    pub fn set_table(&mut self, table: CategoryTable) {
        self.table = table;
        self.raster.set_view(&ViewOverrides {
            vmin: Some(0.0),
            vmax: self.table.max_id().map(f64::from),
            colors: Some(self.table.color_ramp()),
            ..ViewOverrides::default()
        });
    }

    /// Normalize `rows` into a table and install it.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DuplicateCategory`] on repeated ids.
    pub fn set_table_rows(&mut self, rows: Vec<CategoryRow>) -> Result<()> {
        let table = CategoryTable::new(rows)?;
        self.set_table(table);
        Ok(())
    }

    /// Load and install a `;`-delimited table file.
    ///
    /// # Errors
    ///
    /// Fails on I/O or parse errors.
    pub fn load_table(&mut self, path: &Path) -> Result<()> {
        let table = CategoryTable::read(path)?;
        self.set_table(table);
        self.path_csv = Some(path.to_path_buf());
        Ok(())
    }

    /// Replace the cell array; derived zone tables are regenerated.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] when `array` disagrees with the header.
    pub fn set_array(&mut self, array: Array2<T>) -> Result<()> {
        self.raster.set_array(array)?;
        if self.kind().derives_table() {
            self.derive_zone_table();
        }
        Ok(())
    }

    /// Replace the cell array from `f64` data; derived zone tables are
    /// regenerated.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] when `data` disagrees with the header.
    pub fn set_array_f64(&mut self, data: &Array2<f64>) -> Result<()> {
        self.raster.set_array_f64(data)?;
        if self.kind().derives_table() {
            self.derive_zone_table();
        }
        Ok(())
    }

    /// Distinct category ids present in the cells
    #[must_use]
    pub fn present_ids(&self) -> BTreeSet<u32> {
        self.category_counts().into_keys().collect()
    }

    /// Number of cells per present category id
    #[must_use]
    pub fn category_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        let cells = self.raster.cells();
        let (nrows, ncols) = cells.shape();
        for row in 0..nrows {
            for col in 0..ncols {
                if let Some(id) = cells.get(row, col).and_then(id_of) {
                    *counts.entry(id).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// Drop table rows whose id no longer appears in the cells
    pub fn clear_unused_categories(&mut self) {
        let present = self.present_ids();
        let mut table = self.table.clone();
        table.retain_ids(&present);
        self.set_table(table);
    }

    /// Recolour the table from the categorical palette
    pub fn set_palette_colors(&mut self) {
        let mut table = self.table.clone();
        table.set_palette_colors();
        self.set_table(table);
    }

    /// Rewrite category ids through `mapping` (old id, new id) and install
    /// `new_table`.
    ///
    /// Every pair is evaluated against the original cells, so chained pairs
    /// such as (1, 2) and (2, 3) never cascade. Ids not in `mapping` are kept.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::IdCollision`] when an old id appears twice and a
    /// generic error when a new id cannot be stored in `T`.
    pub fn reclassify(&mut self, mapping: &[(u32, u32)], new_table: CategoryTable) -> Result<()> {
        let mut lookup: BTreeMap<u32, T> = BTreeMap::new();
        for &(old, new) in mapping {
            let value = T::exact_from(f64::from(new)).ok_or_else(|| {
                GridError::Generic(format!(
                    "category id {new} cannot be stored in a {} grid",
                    T::KIND.as_str()
                ))
            })?;
            if lookup.insert(old, value).is_some() {
                return Err(GridError::IdCollision { id: old });
            }
        }

        let cells = self.raster.cells();
        let (nrows, ncols) = cells.shape();
        let mut data = Array2::from_elem((nrows, ncols), f64::NAN);
        for row in 0..nrows {
            for col in 0..ncols {
                if let Some(value) = cells.get(row, col) {
                    let mapped = id_of(value)
                        .and_then(|id| lookup.get(&id))
                        .copied()
                        .unwrap_or(value);
                    data[[row, col]] = mapped.as_f64();
                }
            }
        }
        self.raster.set_array_f64(&data)?;
        self.set_table(new_table);
        debug!(name = %self.name(), pairs = mapping.len(), "reclassified categories");
        Ok(())
    }

    /// Cell count and area of every category of `table`, measured on
    /// this grid's cells.
    ///
    /// Cell sides of geographic grids are converted with
    /// [`EngineConfig::degrees_to_meters`]. Fractions are relative to the
    /// cells counted over all rows of `table`.
    #[must_use]
    pub fn areas_for(&self, table: &CategoryTable, config: &EngineConfig) -> Vec<CategoryArea> {
        let unit_area = config.cell_area_m2(
            self.raster.header().cellsize,
            self.raster.coordinate_system(),
        );
        let counts = self.category_counts();
        let per_row: Vec<(&CategoryRow, usize)> = table
            .rows()
            .iter()
            .map(|row| (row, counts.get(&row.id).copied().unwrap_or(0)))
            .collect();
        let total: usize = per_row.iter().map(|(_, n)| n).sum();

        per_row
            .into_iter()
            .map(|(row, count)| {
                let area_m2 = count as f64 * unit_area;
                let area_f = if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64
                };
                CategoryArea {
                    id: row.id,
                    name: row.name.clone(),
                    alias: row.alias.clone(),
                    cell_count: count,
                    area_m2,
                    area_ha: area_m2 / 10_000.0,
                    area_km2: area_m2 / 1_000_000.0,
                    area_f,
                    area_pct: (area_f * 10_000.0).round() / 100.0,
                }
            })
            .collect()
    }

    /// Cell count and area of every category of the grid's own table
    #[must_use]
    pub fn areas(&self, config: &EngineConfig) -> Vec<CategoryArea> {
        self.areas_for(&self.table, config)
    }

    /// [`CategoricalRaster::areas`], with `merge` also writing the
    /// `Cell_count` / `Area_*` columns into the table.
    ///
    /// # Errors
    ///
    /// Fails only if merging into the table fails.
    pub fn area_by_category(
        &mut self,
        merge: bool,
        config: &EngineConfig,
    ) -> Result<Vec<CategoryArea>> {
        let areas = self.areas(config);
        if merge {
            for area in &areas {
                for (key, value) in area.to_fields().iter() {
                    self.table.set_field(area.id, key, value.clone())?;
                }
            }
        }
        Ok(areas)
    }

    /// Statistics of `sample` inside the footprint of every category that
    /// is both in the table and present in the cells.
    ///
    /// `sample` is never modified: each footprint is applied to a scratch
    /// copy. With `merge` the `<varname>_<statistic>` columns are written
    /// into the table (without `count` when `skip_count` is set).
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] when `sample` has another shape.
    pub fn zonal_statistics<U: CellValue>(
        &mut self,
        sample: &Raster<U>,
        skip_count: bool,
        merge: bool,
    ) -> Result<Vec<ZonalStats>> {
        if sample.shape() != self.raster.shape() {
            return Err(GridError::ShapeMismatch {
                expected: self.raster.shape(),
                found: sample.shape(),
            });
        }
        let present = self.present_ids();
        let ids = self.raster.to_f64();
        let mut results = Vec::new();
        for row in self.table.rows().iter().filter(|r| present.contains(&r.id)) {
            let id = f64::from(row.id);
            let outside = ids.mapv(|v| v != id);
            let mut scratch = sample.clone();
            scratch.apply_aoi_mask(&outside, true)?;
            results.push(ZonalStats {
                id: row.id,
                name: row.name.clone(),
                alias: row.alias.clone(),
                stats: scratch.basic_statistics(),
            });
        }

        if merge {
            let varname = sample.info.varname.clone();
            for zonal in &results {
                for (key, value) in zonal.to_fields(&varname, skip_count).iter() {
                    self.table.set_field(zonal.id, key, value.clone())?;
                }
            }
        }
        debug!(name = %self.name(), sample = %sample.name(), zones = results.len(), "zonal statistics");
        Ok(results)
    }

    /// AOI grid of the cells holding `id`
    ///
    /// # Errors
    ///
    /// Fails only if the new grid cannot be built.
    pub fn get_aoi(&self, id: u32) -> Result<CategoricalRaster<u8>> {
        let target = f64::from(id);
        let inside = self.raster.to_f64().mapv(|v| u8::from(v == target));
        let name = format!("{} {id}", self.raster.info.varname);
        let mut aoi = CategoricalRaster::new(name, RasterKind::Aoi, *self.raster.header());
        aoi.raster
            .set_coordinate_system(self.raster.coordinate_system().map(str::to_string));
        aoi.set_array(inside)?;
        Ok(aoi)
    }

    /// Nearest-neighbour resampling onto `reference`
    ///
    /// # Errors
    ///
    /// Fails when resampling fails.
    pub fn resample<U: CellValue>(&self, reference: &Raster<U>) -> Result<Array2<f64>> {
        self.raster.resample(reference, ResampleMethod::Nearest)
    }

    /// Nearest-neighbour rebase onto `reference`; NODATA stays 0.
    ///
    /// # Errors
    ///
    /// Fails when resampling fails.
    pub fn rebase<U: CellValue>(&mut self, reference: &Raster<U>) -> Result<()> {
        let values = self.resample(reference)?;
        let header = reference.header().with_nodata(CATEGORICAL_NODATA);
        self.raster.set_header(header);
        self.raster.discard_backup();
        self.raster
            .set_coordinate_system(reference.coordinate_system().map(str::to_string));
        self.set_array_f64(&values)
    }

    /// Write the table to `<folder>/<filename>.txt`; the grid name is used
    /// by default.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn export_table(&self, folder: &Path, filename: Option<&str>) -> Result<PathBuf> {
        let stem = filename.unwrap_or(self.name());
        self.table.write(&folder.join(format!("{stem}.txt")))
    }

    /// Write the grid, its coordinate system and its table.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn export(&self, folder: &Path, filename: Option<&str>) -> Result<Vec<PathBuf>> {
        let mut written = self.raster.export(folder, filename)?;
        written.push(self.export_table(folder, filename)?);
        info!(name = %self.name(), files = written.len(), "exported categorical grid");
        Ok(written)
    }

    /// Ordered metadata record (grid metadata plus `Path_CSV`)
    #[must_use]
    pub fn metadata(&self) -> OrderedFields {
        let path = self
            .path_csv
            .as_ref()
            .map_or(Value::Null, |p| Value::from(p.display().to_string()));
        self.raster.metadata().with("Path_CSV", path)
    }
}

impl<T: CellValue> Catalogued for CategoricalRaster<T> {
    fn name(&self) -> &str {
        self.raster.name()
    }

    fn metadata(&self) -> OrderedFields {
        CategoricalRaster::metadata(self)
    }
}
