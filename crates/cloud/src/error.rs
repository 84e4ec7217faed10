//! Error types for catalog search and COG reads.

use thiserror::Error;

/// Errors produced while searching the archive or reading scene bands.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("server does not support Range requests for {url}")]
    RangeNotSupported { url: String },

    #[error("{what} timed out after {secs} s")]
    Timeout { what: String, secs: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid STAC response: {0}")]
    Catalog(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("scene {item} has no asset '{asset}' for band {band}")]
    MissingBand {
        band: String,
        asset: String,
        item: String,
    },

    #[error("invalid TIFF: {reason}")]
    InvalidTiff { reason: String },

    #[error("unsupported compression: {0}")]
    UnsupportedCompression(u16),

    #[error("unsupported data type: bits_per_sample={bps}, sample_format={sf}")]
    UnsupportedDataType { bps: u16, sf: u16 },

    #[error("unsupported TIFF layout: {0}")]
    UnsupportedLayout(String),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("core error: {0}")]
    Core(#[from] s2composite_core::Error),
}

impl CloudError {
    /// Whether the failure happened while moving bytes: connection problems,
    /// timeouts, and server-side (5xx, 429) statuses. Everything else means
    /// the request itself or the returned data was rejected.
    pub fn is_transport(&self) -> bool {
        match self {
            CloudError::Http(e) => !e.is_decode() && !e.is_builder(),
            CloudError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            CloudError::Timeout { .. } | CloudError::Network(_) => true,
            _ => false,
        }
    }
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
