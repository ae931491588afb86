//! Error types for CartoMorph

use thiserror::Error;

/// Main error type for CartoMorph operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in grid of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    /// Unreadable or malformed input data (density raster, vector layer)
    #[error("Invalid input: {0}")]
    Input(String),

    /// Malformed morphing grid file
    #[error("Morph grid format error at line {line}: {message}")]
    Format { line: usize, message: String },

    /// The inverse bilinear solve found no admissible root on an axis
    #[error("Ambiguous inverse mapping for ({x}, {y}) in cell ({cell_x}, {cell_y}): {reason}")]
    AmbiguousInverseMapping {
        x: f64,
        y: f64,
        cell_x: usize,
        cell_y: usize,
        reason: String,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Format`] error
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        Error::Format {
            line,
            message: message.into(),
        }
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::Input(format!("GeoJSON: {}", e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Input(format!("JSON: {}", e))
    }
}

/// Result type alias for CartoMorph operations
pub type Result<T> = std::result::Result<T, Error>;
