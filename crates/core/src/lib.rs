//! # s2composite core
//!
//! Shared types for the Sentinel-2 compositing pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: generic raster grid with georeferencing
//! - `GridLayout`: the working grid every scene is resampled onto
//! - `SpectralImage`: named bands plus a per-pixel validity mask
//! - `Region`: area of interest loaded from GeoJSON
//! - `TimeWindow`: half-open acquisition date range
//! - Native GeoTIFF encoding with EPSG geokeys

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod region;
pub mod window;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{Band, Encoding, GeoTransform, GridLayout, Raster, RasterElement, SpectralImage};
pub use region::Region;
pub use window::TimeWindow;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{
        Band, Encoding, GeoTransform, GridLayout, Raster, RasterElement, SpectralImage,
    };
    pub use crate::region::Region;
    pub use crate::window::TimeWindow;
}
