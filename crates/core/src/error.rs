//! Error types for s2composite core

use thiserror::Error;

/// Main error type for core raster, region and encoding operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid time window: start {start} is after end {end}")]
    InvalidTimeWindow { start: String, end: String },

    #[error("Band not present in image: {0}")]
    MissingBand(String),

    #[error("Image stack is empty")]
    EmptyStack,

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
