//! Centralized error handling for gridstack
//!
//! Every fallible operation in the crate returns [`Result`], carrying a
//! [`GridError`]. Parse and I/O failures are fatal for the load that raised
//! them: no partially built grid or table is ever handed back.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gridstack operations
#[derive(Debug, Error)]
pub enum GridError {
    /// I/O operation errors (missing file, permissions)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed grid header, grid row or category table
    #[error("parse error in {} at line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Array shape disagrees with the grid header or with another grid
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// The same old id appears twice in a reclassification mapping
    #[error("category id {id} is mapped more than once")]
    IdCollision { id: u32 },

    /// The same id appears twice in a category table
    #[error("category id {id} appears more than once in the table")]
    DuplicateCategory { id: u32 },

    /// A second AOI was applied before the first one was released
    #[error("an AOI is already applied to grid '{name}'")]
    AoiAlreadyActive { name: String },

    /// Required column missing from a category table file
    #[error("category table is missing the '{column}' column")]
    MissingColumn { column: String },

    /// Named member not present in a collection
    #[error("member '{name}' not found in collection")]
    MemberNotFound { name: String },

    /// No series member carries the requested date
    #[error("no member dated {date} in series")]
    DateNotFound { date: String },

    /// Category id not present in a table
    #[error("category id {id} not found in table")]
    CategoryNotFound { id: u32 },

    /// Thread pool configuration error
    #[error("thread pool error: {0}")]
    ThreadPoolError(String),

    /// ndarray shape construction error
    #[error("array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// Generic error with a message
    #[error("{0}")]
    Generic(String),
}

impl GridError {
    /// Build a parse error for `path` at 1-based `line`.
    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

impl From<String> for GridError {
    fn from(error: String) -> Self {
        GridError::Generic(error)
    }
}

impl From<&str> for GridError {
    fn from(error: &str) -> Self {
        GridError::Generic(error.to_string())
    }
}

/// Result type alias for gridstack operations
pub type Result<T> = std::result::Result<T, GridError>;
