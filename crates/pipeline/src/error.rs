//! Pipeline error taxonomy.

use s2composite_cloud::CloudError;
use thiserror::Error;

/// Failures of a pipeline run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid time window: start {start} is after end {end}")]
    InvalidTimeWindow { start: String, end: String },

    #[error("invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// No scene passed the spatial, temporal and cloud cover filters
    #[error("no Sentinel-2 imagery found for the region and time window")]
    EmptyCollection,

    /// Moving bytes failed: network, timeout, server-side status
    #[error("export transport error: {0}")]
    ExportTransport(String),

    /// The archive rejected a request or returned unusable data
    #[error("remote compute error: {0}")]
    RemoteCompute(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<s2composite_core::Error> for Error {
    fn from(e: s2composite_core::Error) -> Self {
        use s2composite_core::Error as Core;
        match e {
            Core::InvalidGeometry(msg) => Error::InvalidGeometry(msg),
            Core::InvalidTimeWindow { start, end } => Error::InvalidTimeWindow { start, end },
            Core::InvalidParameter {
                name,
                value,
                reason,
            } => Error::InvalidParameter {
                name,
                value,
                reason,
            },
            Core::Io(e) => Error::Io(e),
            other => Error::RemoteCompute(other.to_string()),
        }
    }
}

impl From<CloudError> for Error {
    fn from(e: CloudError) -> Self {
        match e {
            CloudError::Core(core) => core.into(),
            e if e.is_transport() => Error::ExportTransport(e.to_string()),
            e => Error::RemoteCompute(e.to_string()),
        }
    }
}
