//! Keyed collections of grids with a derived catalog, and aligned-stack
//! reductions across their members
//!
//! The catalog holds one metadata row per member, sorted by member name.
//! It is a cache: [`Collection::refresh_catalog`] rebuilds it from the
//! members at any time.

use crate::categorical::CategoricalRaster;
use crate::config::RasterKind;
use crate::errors::{GridError, Result};
use crate::interpolation::ResampleMethod;
use crate::nodata::CellValue;
use crate::raster::Raster;
use crate::statistics::{reduce_stack, BasicStats, StatOperation};
use crate::table::OrderedFields;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Anything that can be listed in a collection catalog
pub trait Catalogued {
    /// Catalog key
    fn name(&self) -> &str;

    /// One catalog row
    fn metadata(&self) -> OrderedFields;
}

/// A catalogued member backed by a grid
pub trait GridLayer: Catalogued + Clone {
    type Cell: CellValue;

    fn raster(&self) -> &Raster<Self::Cell>;

    fn set_name(&mut self, name: String);

    /// Mask the cells outside `aoi`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] or [`GridError::AoiAlreadyActive`].
    fn apply_aoi<U: CellValue>(&mut self, aoi: &Raster<U>, inplace: bool) -> Result<()>;

    fn release_aoi(&mut self);

    /// Replace the cells from `f64` data (absent as `NaN`).
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ShapeMismatch`] on a shape mismatch.
    fn set_values(&mut self, data: &Array2<f64>) -> Result<()>;

    /// Resample onto `reference` and adopt its header.
    ///
    /// # Errors
    ///
    /// Fails when resampling fails.
    fn rebase_onto<U: CellValue>(
        &mut self,
        reference: &Raster<U>,
        method: ResampleMethod,
    ) -> Result<()>;
}

impl<T: CellValue> GridLayer for Raster<T> {
    type Cell = T;

    fn raster(&self) -> &Raster<T> {
        self
    }

    fn set_name(&mut self, name: String) {
        Raster::set_name(self, name);
    }

    fn apply_aoi<U: CellValue>(&mut self, aoi: &Raster<U>, inplace: bool) -> Result<()> {
        Raster::apply_aoi(self, aoi, inplace)
    }

    fn release_aoi(&mut self) {
        Raster::release_aoi(self);
    }

    fn set_values(&mut self, data: &Array2<f64>) -> Result<()> {
        self.set_array_f64(data)
    }

    fn rebase_onto<U: CellValue>(
        &mut self,
        reference: &Raster<U>,
        method: ResampleMethod,
    ) -> Result<()> {
        self.rebase(reference, method)
    }
}

impl<T: CellValue> GridLayer for CategoricalRaster<T> {
    type Cell = T;

    fn raster(&self) -> &Raster<T> {
        CategoricalRaster::raster(self)
    }

    fn set_name(&mut self, name: String) {
        CategoricalRaster::set_name(self, name);
    }

    fn apply_aoi<U: CellValue>(&mut self, aoi: &Raster<U>, inplace: bool) -> Result<()> {
        CategoricalRaster::apply_aoi(self, aoi, inplace)
    }

    fn release_aoi(&mut self) {
        CategoricalRaster::release_aoi(self);
    }

    fn set_values(&mut self, data: &Array2<f64>) -> Result<()> {
        self.set_array_f64(data)
    }

    /// Categorical grids always resample by nearest neighbour.
    fn rebase_onto<U: CellValue>(
        &mut self,
        reference: &Raster<U>,
        _method: ResampleMethod,
    ) -> Result<()> {
        self.rebase(reference)
    }
}

/// Basic statistics of one collection member
#[derive(Debug, Clone, PartialEq)]
pub struct MemberStats {
    pub name: String,
    pub stats: BasicStats,
}

/// Named set of members with a catalog kept in sync on insert and remove
#[derive(Debug, Clone)]
pub struct Collection<G> {
    name: String,
    members: BTreeMap<String, G>,
    catalog: Vec<OrderedFields>,
}

impl<G: Catalogued> Collection<G> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
            catalog: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `member` under its name, returning the member it replaced.
    pub fn insert(&mut self, member: G) -> Option<G> {
        let key = member.name().to_string();
        let replaced = self.members.insert(key.clone(), member);
        if replaced.is_some() {
            debug!(collection = %self.name, member = %key, "replaced member");
        }
        self.refresh_catalog();
        replaced
    }

    /// Remove and return the member called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::MemberNotFound`] for an unknown name.
    pub fn remove(&mut self, name: &str) -> Result<G> {
        let member = self
            .members
            .remove(name)
            .ok_or_else(|| GridError::MemberNotFound {
                name: name.to_string(),
            })?;
        self.refresh_catalog();
        Ok(member)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&G> {
        self.members.get(name)
    }

    /// Mutable access to a member. Call [`Collection::refresh_catalog`]
    /// after changing its metadata.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut G> {
        self.members.get_mut(name)
    }

    /// Member names in catalog order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.members.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &G> {
        self.members.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn catalog(&self) -> &[OrderedFields] {
        &self.catalog
    }

    /// Re-derive every catalog row from the members
    pub fn refresh_catalog(&mut self) {
        self.catalog = self.members.values().map(Catalogued::metadata).collect();
    }
}

impl<G: GridLayer> Collection<G> {
    /// Whether every member has the same (rows, columns)
    #[must_use]
    pub fn same_shape(&self) -> bool {
        let mut shapes = self.members.values().map(|m| m.raster().shape());
        match shapes.next() {
            Some(first) => shapes.all(|shape| shape == first),
            None => true,
        }
    }

    /// Reduce the members cell by cell.
    ///
    /// The result is a clone of the first member (in name order) named
    /// `"<collection> <statistic>"` and holding the reduced values. Returns
    /// `Ok(None)` for an empty collection or when members differ in shape.
    ///
    /// # Errors
    ///
    /// Fails if the reduced values cannot be stored in the member type.
    pub fn reduce(&self, operation: StatOperation, skip_absent: bool) -> Result<Option<G>> {
        let Some(first) = self.members.values().next() else {
            warn!(collection = %self.name, "cannot reduce an empty collection");
            return Ok(None);
        };
        if !self.same_shape() {
            warn!(collection = %self.name, "members differ in shape, reduction skipped");
            return Ok(None);
        }
        let layers: Vec<Array2<f64>> = self.members.values().map(|m| m.raster().to_f64()).collect();
        let reduced = reduce_stack(&layers, operation, skip_absent)?;

        let mut output = first.clone();
        // the output must not inherit the member's AOI backup
        output.release_aoi();
        output.set_name(format!("{} {}", self.name, operation.label()));
        output.set_values(&reduced)?;
        info!(
            collection = %self.name,
            members = layers.len(),
            operation = %operation,
            "reduced collection"
        );
        Ok(Some(output))
    }

    /// # Errors
    ///
    /// See [`Collection::reduce`].
    pub fn mean(&self, skip_absent: bool) -> Result<Option<G>> {
        self.reduce(StatOperation::Mean, skip_absent)
    }

    /// # Errors
    ///
    /// See [`Collection::reduce`].
    pub fn std(&self, skip_absent: bool) -> Result<Option<G>> {
        self.reduce(StatOperation::Std, skip_absent)
    }

    /// # Errors
    ///
    /// See [`Collection::reduce`].
    pub fn min(&self, skip_absent: bool) -> Result<Option<G>> {
        self.reduce(StatOperation::Min, skip_absent)
    }

    /// # Errors
    ///
    /// See [`Collection::reduce`].
    pub fn max(&self, skip_absent: bool) -> Result<Option<G>> {
        self.reduce(StatOperation::Max, skip_absent)
    }

    /// # Errors
    ///
    /// See [`Collection::reduce`].
    pub fn sum(&self, skip_absent: bool) -> Result<Option<G>> {
        self.reduce(StatOperation::Sum, skip_absent)
    }

    /// # Errors
    ///
    /// See [`Collection::reduce`].
    pub fn median(&self, skip_absent: bool) -> Result<Option<G>> {
        self.reduce(StatOperation::Median, skip_absent)
    }

    /// # Errors
    ///
    /// See [`Collection::reduce`].
    pub fn percentile(&self, p: f64, skip_absent: bool) -> Result<Option<G>> {
        self.reduce(StatOperation::Percentile(p), skip_absent)
    }

    /// Basic statistics of every member, in name order
    #[must_use]
    pub fn collection_stats(&self) -> Vec<MemberStats> {
        self.members
            .values()
            .map(|m| MemberStats {
                name: m.name().to_string(),
                stats: m.raster().basic_statistics(),
            })
            .collect()
    }

    /// Apply `aoi` to every member.
    ///
    /// # Errors
    ///
    /// Stops at the first member that rejects the AOI.
    pub fn apply_aoi_all<U: CellValue>(&mut self, aoi: &Raster<U>, inplace: bool) -> Result<()> {
        for member in self.members.values_mut() {
            member.apply_aoi(aoi, inplace)?;
        }
        Ok(())
    }

    pub fn release_aoi_all(&mut self) {
        for member in self.members.values_mut() {
            member.release_aoi();
        }
    }

    /// Rebase every member onto `reference`.
    ///
    /// # Errors
    ///
    /// Stops at the first member that fails to resample.
    pub fn rebase_all<U: CellValue>(
        &mut self,
        reference: &Raster<U>,
        method: ResampleMethod,
    ) -> Result<()> {
        for member in self.members.values_mut() {
            member.rebase_onto(reference, method)?;
        }
        self.refresh_catalog();
        Ok(())
    }
}

impl<T: CellValue> Collection<Raster<T>> {
    /// Load a grid file and insert it.
    ///
    /// # Errors
    ///
    /// Fails on I/O or parse errors.
    pub fn load(
        &mut self,
        name: &str,
        kind: RasterKind,
        asc: &Path,
        prj: Option<&Path>,
    ) -> Result<()> {
        self.insert(Raster::load(name, kind, asc, prj)?);
        Ok(())
    }
}

impl<T: CellValue> Collection<CategoricalRaster<T>> {
    /// Load a categorical grid file (and optional table) and insert it.
    ///
    /// # Errors
    ///
    /// Fails on I/O or parse errors.
    pub fn load(
        &mut self,
        name: &str,
        kind: RasterKind,
        asc: &Path,
        prj: Option<&Path>,
        table: Option<&Path>,
    ) -> Result<()> {
        self.insert(CategoricalRaster::load(name, kind, asc, prj, table)?);
        Ok(())
    }
}
