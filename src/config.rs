//! Raster kinds, display settings and engine constants
//!
//! Kind-specific behaviour (variable names, units, colour maps, value clamps,
//! preset category tables) is a lookup keyed by [`RasterKind`]. Display
//! settings are immutable [`ViewSpec`] values changed only through an
//! explicit [`ViewOverrides`] merge.

use crate::table::CategoryTable;
use std::fmt;

/// Semantic kind of a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterKind {
    Generic,
    Elevation,
    Slope,
    Twi,
    Hand,
    Dto,
    Ndvi,
    Et24h,
    HabitatQuality,
    HabitatDegradation,
    BiodiversityArea,
    Categorical,
    Lulc,
    LulcChange,
    Lithology,
    Soils,
    Aoi,
    Ldd,
    Zones,
}

/// Defaults attached to a [`RasterKind`]
#[derive(Debug, Clone, Copy)]
pub struct KindDefaults {
    pub varname: &'static str,
    pub varalias: &'static str,
    pub description: &'static str,
    pub units: &'static str,
    pub cmap: &'static str,
    /// Values are clamped into this range whenever the array is set
    pub clamp: Option<(f64, f64)>,
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    /// Fixed category table for preset categorical kinds
    pub preset_table: Option<fn() -> CategoryTable>,
}

impl KindDefaults {
    const fn base(
        varname: &'static str,
        varalias: &'static str,
        description: &'static str,
        units: &'static str,
        cmap: &'static str,
    ) -> Self {
        Self {
            varname,
            varalias,
            description,
            units,
            cmap,
            clamp: None,
            vmin: None,
            vmax: None,
            preset_table: None,
        }
    }

    const fn view(mut self, vmin: f64, vmax: f64) -> Self {
        self.vmin = Some(vmin);
        self.vmax = Some(vmax);
        self
    }

    const fn clamped(mut self, lower: f64, upper: f64) -> Self {
        self.clamp = Some((lower, upper));
        self
    }

    const fn preset(mut self, table: fn() -> CategoryTable) -> Self {
        self.preset_table = Some(table);
        self
    }
}

impl RasterKind {
    /// Every kind, quantitative first
    pub const ALL: [RasterKind; 19] = [
        Self::Generic,
        Self::Elevation,
        Self::Slope,
        Self::Twi,
        Self::Hand,
        Self::Dto,
        Self::Ndvi,
        Self::Et24h,
        Self::HabitatQuality,
        Self::HabitatDegradation,
        Self::BiodiversityArea,
        Self::Categorical,
        Self::Lulc,
        Self::LulcChange,
        Self::Lithology,
        Self::Soils,
        Self::Aoi,
        Self::Ldd,
        Self::Zones,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Elevation => "elevation",
            Self::Slope => "slope",
            Self::Twi => "twi",
            Self::Hand => "hand",
            Self::Dto => "dto",
            Self::Ndvi => "ndvi",
            Self::Et24h => "et24h",
            Self::HabitatQuality => "habitat-quality",
            Self::HabitatDegradation => "habitat-degradation",
            Self::BiodiversityArea => "biodiversity-area",
            Self::Categorical => "categorical",
            Self::Lulc => "lulc",
            Self::LulcChange => "lulc-change",
            Self::Lithology => "lithology",
            Self::Soils => "soils",
            Self::Aoi => "aoi",
            Self::Ldd => "ldd",
            Self::Zones => "zones",
        }
    }

    /// Whether grids of this kind hold category ids
    #[must_use]
    pub const fn is_categorical(self) -> bool {
        matches!(
            self,
            Self::Categorical
                | Self::Lulc
                | Self::LulcChange
                | Self::Lithology
                | Self::Soils
                | Self::Aoi
                | Self::Ldd
                | Self::Zones
        )
    }

    /// Whether the category table is derived from the ids in the grid
    #[must_use]
    pub const fn derives_table(self) -> bool {
        matches!(self, Self::Zones)
    }

    #[must_use]
    pub fn defaults(self) -> KindDefaults {
        use KindDefaults as D;
        match self {
            Self::Generic => D::base("Unknown variable", "Var", "", "units", "jet"),
            Self::Elevation => D::base("Elevation", "DEM", "Height above sea level", "m", "BrBG_r"),
            Self::Slope => D::base("Slope", "SLP", "Slope of terrain", "deg.", "OrRd"),
            Self::Twi => D::base(
                "TWI",
                "TWI",
                "Topographical Wetness Index",
                "index units",
                "YlGnBu",
            ),
            Self::Hand => D::base(
                "HAND",
                "HAND",
                "Height Above the Nearest Drainage",
                "m",
                "YlGnBu_r",
            ),
            Self::Dto => D::base("DTO", "DTO", "Distance To Outlet", "meters", "rainbow"),
            Self::Ndvi => D::base(
                "NDVI",
                "NDVI",
                "Normalized difference vegetation index",
                "index units",
                "RdYlGn",
            )
            .clamped(-1.0, 1.0)
            .view(-1.0, 1.0),
            Self::Et24h => D::base(
                "Daily Evapotranspiration",
                "ET24h",
                "Daily Evapotranspiration",
                "mm",
                "jet",
            )
            .clamped(0.0, 100.0)
            .view(0.0, 15.0),
            Self::HabitatQuality => D::base(
                "Habitat Quality",
                "HQ",
                "Habitat Quality from the InVEST model",
                "index units",
                "RdYlGn",
            )
            .view(0.0, 1.0),
            Self::HabitatDegradation => D::base(
                "Habitat Degradation",
                "HDeg",
                "Habitat Degradation from the InVEST model",
                "index units",
                "YlOrRd",
            )
            .view(0.0, 0.7),
            Self::BiodiversityArea => D::base(
                "Biodiversity Area",
                "Ba",
                "Biodiversity area in ha equivalents",
                "ha",
                "YlGn",
            ),
            Self::Categorical => D::base("Unknown variable", "Var", "Unknown", "category ID", "tab20"),
            Self::Lulc => D::base(
                "Land Use and Land Cover",
                "LULC",
                "Classes of Land Use and Land Cover",
                "classes ID",
                "tab20b",
            ),
            Self::LulcChange => D::base(
                "LULC Change",
                "LULCC",
                "Change of Land Use and Land Cover",
                "Change ID",
                "tab20b",
            )
            .preset(CategoryTable::lulc_change),
            Self::Lithology => D::base(
                "Litological Domains",
                "Lito",
                "Litological outcrop domains",
                "types ID",
                "tab20c",
            ),
            Self::Soils => D::base(
                "Soil Types",
                "Soils",
                "Types of Soils and Substrate",
                "types ID",
                "tab20c",
            ),
            Self::Aoi => D::base(
                "Area Of Interest",
                "AOI",
                "Boolean map an Area of Interest",
                "classes ID",
                "tab20",
            )
            .preset(CategoryTable::aoi),
            Self::Ldd => D::base(
                "Local Drain Direction",
                "LDD",
                "Direction of flux",
                "direction ID",
                "tab20",
            )
            .preset(CategoryTable::ldd),
            Self::Zones => D::base("Zone", "ZN", "Ids map of zones", "zones ID", "tab20"),
        }
    }
}

impl fmt::Display for RasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display settings of a grid. Non-semantic: nothing in the engine reads
/// them back except to hand them to renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    pub cmap: String,
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    pub nbins: usize,
    /// Colour steps of categorical grids as (last id, colour), ascending.
    /// Each step covers the ids above the previous step.
    pub colors: Vec<(u32, String)>,
}

/// Explicit partial update of a [`ViewSpec`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewOverrides {
    pub cmap: Option<String>,
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
    pub nbins: Option<usize>,
    pub colors: Option<Vec<(u32, String)>>,
}

impl ViewSpec {
    pub const DEFAULT_NBINS: usize = 100;

    /// Defaults of `kind`
    #[must_use]
    pub fn for_kind(kind: RasterKind) -> Self {
        let defaults = kind.defaults();
        Self {
            cmap: defaults.cmap.to_string(),
            vmin: defaults.vmin,
            vmax: defaults.vmax,
            nbins: Self::DEFAULT_NBINS,
            colors: Vec::new(),
        }
    }

    /// Copy with every field set in `overrides` replaced
    #[must_use]
    pub fn with_overrides(&self, overrides: &ViewOverrides) -> Self {
        Self {
            cmap: overrides.cmap.clone().unwrap_or_else(|| self.cmap.clone()),
            vmin: overrides.vmin.or(self.vmin),
            vmax: overrides.vmax.or(self.vmax),
            nbins: overrides.nbins.unwrap_or(self.nbins),
            colors: overrides.colors.clone().unwrap_or_else(|| self.colors.clone()),
        }
    }

    /// Colour of category `id` on the step ramp; `None` above the last step
    #[must_use]
    pub fn color_of(&self, id: u32) -> Option<&str> {
        let index = self.colors.partition_point(|(last, _)| *last < id);
        self.colors.get(index).map(|(_, color)| color.as_str())
    }
}

impl Default for ViewSpec {
    fn default() -> Self {
        Self::for_kind(RasterKind::Generic)
    }
}

/// Engine-wide numeric conventions
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Metres per degree used for cell areas of geographic grids; a flat,
    /// latitude-independent approximation
    pub degrees_to_meters: f64,
    /// Coordinate-system prefix identifying geographic (degree) grids
    pub geographic_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            degrees_to_meters: 111_111.0,
            geographic_prefix: "GEOGCS".to_string(),
        }
    }
}

impl EngineConfig {
    /// Whether `coordinate_system` describes a geographic grid. Grids
    /// without a coordinate system are treated as projected.
    #[must_use]
    pub fn is_geographic(&self, coordinate_system: Option<&str>) -> bool {
        coordinate_system.is_some_and(|cs| cs.starts_with(&self.geographic_prefix))
    }

    /// Side length of a cell in metres
    #[must_use]
    pub fn cell_side_meters(&self, cellsize: f64, coordinate_system: Option<&str>) -> f64 {
        if self.is_geographic(coordinate_system) {
            cellsize * self.degrees_to_meters
        } else {
            cellsize
        }
    }

    /// Area of one cell in square metres
    #[must_use]
    pub fn cell_area_m2(&self, cellsize: f64, coordinate_system: Option<&str>) -> f64 {
        self.cell_side_meters(cellsize, coordinate_system).powi(2)
    }
}
