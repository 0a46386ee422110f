//! Date-aware series of aligned grids and categorical change detection
//!
//! A series is a [`Collection`] whose members carry a date and share one
//! shape. Categorical series additionally keep a collection-level table
//! (the union of member tables) and compare members between two dates.

use crate::categorical::{CategoricalRaster, CategoryArea};
use crate::collection::{Collection, GridLayer};
use crate::config::{EngineConfig, RasterKind};
use crate::errors::{GridError, Result};
use crate::nodata::CellValue;
use crate::raster::Raster;
use crate::statistics::BasicStats;
use crate::table::CategoryTable;
use chrono::NaiveDate;
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Date format of series member file names and metadata
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date encoded at the end of a file stem after the last `_`
#[must_use]
pub fn date_from_stem(stem: &str) -> Option<NaiveDate> {
    let (_, tail) = stem.rsplit_once('_')?;
    NaiveDate::parse_from_str(tail, DATE_FORMAT).ok()
}

/// Grid files in `folder` whose name starts with `prefix`, with the date
/// parsed from each stem, in date order
fn dated_files(folder: &Path, prefix: &str) -> Result<Vec<(PathBuf, String, NaiveDate)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("asc") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        if !stem.starts_with(prefix) {
            continue;
        }
        match date_from_stem(&stem) {
            Some(date) => files.push((path, stem, date)),
            None => warn!(file = %path.display(), "no date at the end of file name, skipped"),
        }
    }
    files.sort_by(|a, b| a.2.cmp(&b.2).then_with(|| a.1.cmp(&b.1)));
    Ok(files)
}

/// Statistics of one series member
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStats {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub stats: BasicStats,
}

/// Area accounting of one categorical series member
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesAreas {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub areas: Vec<CategoryArea>,
}

fn check_alignment<G: GridLayer>(collection: &Collection<G>, member: &G) -> Result<()> {
    if let Some(existing) = collection.iter().find(|m| m.name() != member.name()) {
        let expected = existing.raster().shape();
        let found = member.raster().shape();
        if expected != found {
            return Err(GridError::ShapeMismatch { expected, found });
        }
    }
    Ok(())
}

fn members_by_date<G: GridLayer>(collection: &Collection<G>) -> Vec<&G> {
    let mut members: Vec<&G> = collection.iter().collect();
    members.sort_by_key(|m| m.raster().date());
    members
}

fn find_by_date<G: GridLayer>(collection: &Collection<G>, date: NaiveDate) -> Result<&G> {
    collection
        .iter()
        .find(|m| m.raster().date() == Some(date))
        .ok_or_else(|| GridError::DateNotFound {
            date: date.format(DATE_FORMAT).to_string(),
        })
}

/// Series of dated quantitative grids
#[derive(Debug, Clone)]
pub struct RasterSeries<T: CellValue> {
    collection: Collection<Raster<T>>,
}

impl<T: CellValue> RasterSeries<T> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            collection: Collection::new(name),
        }
    }

    /// Underlying collection (catalog, reductions)
    #[must_use]
    pub const fn collection(&self) -> &Collection<Raster<T>> {
        &self.collection
    }

    pub fn collection_mut(&mut self) -> &mut Collection<Raster<T>> {
        &mut self.collection
    }

    /// Add a member; it must match the shape of the current members.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] for a misaligned member.
    pub fn insert(&mut self, raster: Raster<T>) -> Result<Option<Raster<T>>> {
        check_alignment(&self.collection, &raster)?;
        Ok(self.collection.insert(raster))
    }

    /// Member dates in ascending order
    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        members_by_date(&self.collection)
            .into_iter()
            .filter_map(|m| m.date())
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`GridError::DateNotFound`] when no member has `date`.
    pub fn by_date(&self, date: NaiveDate) -> Result<&Raster<T>> {
        find_by_date(&self.collection, date)
    }

    /// Load every `<prefix>*_YYYY-MM-DD.asc` file of `folder`, each with
    /// its sibling `.prj` when present. Returns the number of grids loaded.
    ///
    /// # Errors
    ///
    /// Fails on I/O or parse errors and on misaligned grids.
    pub fn load_folder(&mut self, folder: &Path, prefix: &str, kind: RasterKind) -> Result<usize> {
        let files = dated_files(folder, prefix)?;
        for (path, stem, date) in &files {
            let mut raster = Raster::load(stem.as_str(), kind, path, None)?;
            raster.set_date(Some(*date));
            self.insert(raster)?;
        }
        info!(series = %self.collection.name(), loaded = files.len(), "loaded series folder");
        Ok(files.len())
    }

    /// Basic statistics of every member, in date order
    #[must_use]
    pub fn series_stats(&self) -> Vec<SeriesStats> {
        members_by_date(&self.collection)
            .into_iter()
            .map(|m| SeriesStats {
                name: m.name().to_string(),
                date: m.date(),
                stats: m.basic_statistics(),
            })
            .collect()
    }
}

/// Category-to-category transitions between two dates
///
/// Row and column `k` of every matrix refer to `ids[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionMatrix {
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub ids: Vec<u32>,
    pub aliases: Vec<String>,
    pub area_f_start: Vec<f64>,
    pub area_f_end: Vec<f64>,
    pub area_km2_start: Vec<f64>,
    pub area_km2_end: Vec<f64>,
    /// `[i, j]`: fraction of the start footprint of `i` that is `j` at the end
    pub conversion: Array2<f64>,
    /// `[i, k]`: share of the start area converted from `k` into `i`
    pub expansion: Array2<f64>,
    /// `[i, j]`: share of the start area converted from `i` into `j`
    pub retraction: Array2<f64>,
    /// Product of the conversion diagonal
    pub conversion_index: f64,
}

/// Series of dated categorical grids with a collection-level table
#[derive(Debug, Clone)]
pub struct CategoricalSeries<T: CellValue> {
    collection: Collection<CategoricalRaster<T>>,
    table: CategoryTable,
    clear_unused: bool,
}

impl<T: CellValue> CategoricalSeries<T> {
    /// Empty series. With `clear_unused` each member's unused categories
    /// are dropped before the tables are merged.
    #[must_use]
    pub fn new(name: impl Into<String>, clear_unused: bool) -> Self {
        Self {
            collection: Collection::new(name),
            table: CategoryTable::empty(),
            clear_unused,
        }
    }

    #[must_use]
    pub const fn collection(&self) -> &Collection<CategoricalRaster<T>> {
        &self.collection
    }

    pub fn collection_mut(&mut self) -> &mut Collection<CategoricalRaster<T>> {
        &mut self.collection
    }

    /// Union of the member tables; repeated ids keep the last member's row
    #[must_use]
    pub const fn table(&self) -> &CategoryTable {
        &self.table
    }

    /// Add a member and refresh the collection-level table.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] for a misaligned member.
    pub fn insert(&mut self, raster: CategoricalRaster<T>) -> Result<Option<CategoricalRaster<T>>> {
        check_alignment(&self.collection, &raster)?;
        let replaced = self.collection.insert(raster);
        self.update_table();
        Ok(replaced)
    }

    /// Rebuild the collection-level table from the members
    pub fn update_table(&mut self) {
        if self.clear_unused {
            let names: Vec<String> = self.collection.names().iter().map(|n| n.to_string()).collect();
            for name in names {
                if let Some(member) = self.collection.get_mut(&name) {
                    member.clear_unused_categories();
                }
            }
        }
        self.table = CategoryTable::union(self.collection.iter().map(CategoricalRaster::table));
    }

    #[must_use]
    pub fn dates(&self) -> Vec<NaiveDate> {
        members_by_date(&self.collection)
            .into_iter()
            .filter_map(|m| m.raster().date())
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`GridError::DateNotFound`] when no member has `date`.
    pub fn by_date(&self, date: NaiveDate) -> Result<&CategoricalRaster<T>> {
        find_by_date(&self.collection, date)
    }

    /// Load every `<prefix>*_YYYY-MM-DD.asc` file of `folder` with a shared
    /// table file. Returns the number of grids loaded.
    ///
    /// # Errors
    ///
    /// Fails on I/O or parse errors and on misaligned grids.
    pub fn load_folder(
        &mut self,
        folder: &Path,
        prefix: &str,
        kind: RasterKind,
        table: Option<&Path>,
    ) -> Result<usize> {
        let files = dated_files(folder, prefix)?;
        for (path, stem, date) in &files {
            let mut raster = CategoricalRaster::load(stem.as_str(), kind, path, None, table)?;
            raster.set_date(Some(*date));
            self.insert(raster)?;
        }
        info!(series = %self.collection.name(), loaded = files.len(), "loaded categorical series folder");
        Ok(files.len())
    }

    /// Area accounting of every member against the collection-level
    /// table, in date order
    #[must_use]
    pub fn series_areas(&self, config: &EngineConfig) -> Vec<SeriesAreas> {
        members_by_date(&self.collection)
            .into_iter()
            .map(|m| SeriesAreas {
                name: m.name().to_string(),
                date: m.raster().date(),
                areas: m.areas_for(&self.table, config),
            })
            .collect()
    }

    /// Three-class change grid of category `id` between two dates:
    /// 1 retraction, 2 stable, 3 expansion; cells where `id` is in neither
    /// date are absent.
    ///
    /// # Errors
    ///
    /// Fails when a date is missing or `id` is not in the series table.
    pub fn change(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        id: u32,
    ) -> Result<CategoricalRaster<u8>> {
        let category = self
            .table
            .get(id)
            .ok_or(GridError::CategoryNotFound { id })?;
        let first = find_by_date(&self.collection, start)?;
        let last = find_by_date(&self.collection, end)?;
        if first.raster().shape() != last.raster().shape() {
            return Err(GridError::ShapeMismatch {
                expected: first.raster().shape(),
                found: last.raster().shape(),
            });
        }

        let target = f64::from(id);
        let before = first.raster().to_f64().mapv(|v| i8::from(v == target));
        let after = last.raster().to_f64().mapv(|v| i8::from(v == target));
        let mut classes = Array2::<u8>::zeros(before.dim());
        ndarray::Zip::from(&mut classes)
            .and(&before)
            .and(&after)
            .for_each(|c, &b, &a| {
                if a + b > 0 {
                    *c = (a - b + 2) as u8;
                }
            });

        let name = format!(
            "{} of {} from {} to {}",
            self.collection.name(),
            category.name,
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT)
        );
        let mut change =
            CategoricalRaster::new(name, RasterKind::LulcChange, *first.raster().header());
        change.set_coordinate_system(first.raster().coordinate_system().map(str::to_string));
        change.set_date(Some(end));
        change.set_array(classes)?;
        Ok(change)
    }

    /// Change grids of category `id` between every pair of consecutive
    /// dates
    ///
    /// # Errors
    ///
    /// Fails when `id` is not in the series table.
    pub fn change_series(&self, id: u32) -> Result<CategoricalSeries<u8>> {
        let mut series = CategoricalSeries::new(format!("{} - Change Series", self.collection.name()), false);
        let dates = self.dates();
        for pair in dates.windows(2) {
            series.insert(self.change(pair[0], pair[1], id)?)?;
        }
        Ok(series)
    }

    /// Conversion, expansion and retraction matrices over the series table
    /// between two dates.
    ///
    /// # Errors
    ///
    /// Fails when a date is missing or the two members differ in shape.
    pub fn conversion_matrix(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        config: &EngineConfig,
    ) -> Result<ConversionMatrix> {
        let first = find_by_date(&self.collection, start)?;
        let last = find_by_date(&self.collection, end)?;
        if first.raster().shape() != last.raster().shape() {
            return Err(GridError::ShapeMismatch {
                expected: first.raster().shape(),
                found: last.raster().shape(),
            });
        }

        let ids = self.table.ids();
        let n = ids.len();
        let areas_start = first.areas_for(&self.table, config);
        let areas_end = last.areas_for(&self.table, config);

        let start_values = first.raster().to_f64();
        let end_values = last.raster().to_f64();
        let index_of = |v: f64| ids.iter().position(|&id| f64::from(id) == v);

        let mut counts = Array2::<f64>::zeros((n, n));
        ndarray::Zip::from(&start_values)
            .and(&end_values)
            .for_each(|&s, &e| {
                if let (Some(i), Some(j)) = (index_of(s), index_of(e)) {
                    counts[[i, j]] += 1.0;
                }
            });

        let mut conversion = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            let total: f64 = counts.row(i).sum();
            if total > 0.0 {
                for j in 0..n {
                    conversion[[i, j]] = counts[[i, j]] / total;
                }
            }
        }

        let area_f_start: Vec<f64> = areas_start.iter().map(|a| a.area_f).collect();
        let mut expansion = Array2::<f64>::zeros((n, n));
        let mut retraction = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for k in 0..n {
                if i != k {
                    expansion[[i, k]] = area_f_start[k] * conversion[[k, i]];
                    retraction[[i, k]] = area_f_start[i] * conversion[[i, k]];
                }
            }
        }
        let conversion_index = conversion.diag().iter().product();

        Ok(ConversionMatrix {
            date_start: start,
            date_end: end,
            ids,
            aliases: self.table.rows().iter().map(|r| r.alias.clone()).collect(),
            area_f_start,
            area_f_end: areas_end.iter().map(|a| a.area_f).collect(),
            area_km2_start: areas_start.iter().map(|a| a.area_km2).collect(),
            area_km2_end: areas_end.iter().map(|a| a.area_km2).collect(),
            conversion,
            expansion,
            retraction,
            conversion_index,
        })
    }
}
