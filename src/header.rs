//! Grid header: shape, lower-left origin, square cell size and NODATA value

/// Georeferencing header of a grid
///
/// Row 0 of the cell array is the northernmost row; `yllcorner` is the
/// southern edge of the last row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridHeader {
    pub ncols: usize,
    pub nrows: usize,
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata_value: f64,
}

/// Bounding box of a grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl GridHeader {
    /// Header keys in file order
    pub const KEYS: [&'static str; 6] = [
        "ncols",
        "nrows",
        "xllcorner",
        "yllcorner",
        "cellsize",
        "NODATA_value",
    ];

    #[must_use]
    pub fn new(
        ncols: usize,
        nrows: usize,
        xllcorner: f64,
        yllcorner: f64,
        cellsize: f64,
        nodata_value: f64,
    ) -> Self {
        Self {
            ncols,
            nrows,
            xllcorner,
            yllcorner,
            cellsize,
            nodata_value,
        }
    }

    /// Array shape as (rows, columns)
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Total number of cells, saturating at `usize::MAX`
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.nrows.saturating_mul(self.ncols)
    }

    /// Same header with a different NODATA value
    #[must_use]
    pub fn with_nodata(mut self, nodata_value: f64) -> Self {
        self.nodata_value = nodata_value;
        self
    }

    #[must_use]
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox {
            xmin: self.xllcorner,
            xmax: self.xllcorner + self.ncols as f64 * self.cellsize,
            ymin: self.yllcorner,
            ymax: self.yllcorner + self.nrows as f64 * self.cellsize,
        }
    }

    /// Coordinates (x, y) of the center of cell (row, col)
    #[must_use]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let height = self.nrows as f64 * self.cellsize;
        let x = self.xllcorner + col as f64 * self.cellsize + self.cellsize / 2.0;
        let y = self.yllcorner + (height - row as f64 * self.cellsize) - self.cellsize / 2.0;
        (x, y)
    }

    /// Fractional (row, col) position of a coordinate, measured so that
    /// integer values fall on cell centers.
    #[must_use]
    pub fn fractional_index(&self, x: f64, y: f64) -> (f64, f64) {
        let top = self.yllcorner + self.nrows as f64 * self.cellsize;
        let col = (x - self.xllcorner) / self.cellsize - 0.5;
        let row = (top - y) / self.cellsize - 0.5;
        (row, col)
    }

    /// Key/value pairs in file order, values rendered as written to disk
    #[must_use]
    pub fn entries(&self) -> [(&'static str, String); 6] {
        [
            (Self::KEYS[0], self.ncols.to_string()),
            (Self::KEYS[1], self.nrows.to_string()),
            (Self::KEYS[2], self.xllcorner.to_string()),
            (Self::KEYS[3], self.yllcorner.to_string()),
            (Self::KEYS[4], self.cellsize.to_string()),
            (Self::KEYS[5], self.nodata_value.to_string()),
        ]
    }
}
