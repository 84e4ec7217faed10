//! # s2composite algorithms
//!
//! Raster algorithms for the Sentinel-2 compositing pipeline.
//!
//! - **imagery::cloud_mask**: QA60 cloud / cirrus masking and reflectance scaling
//! - **imagery::composite**: per-pixel median over a masked image stack
//! - **imagery::indices**: normalized-difference indices (NDVI, NDMI, NDWI) and true color
//! - **imagery::clip**: restricting rasters to a region polygon

pub mod imagery;
mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        clip_raster, mask_clouds, median_composite, normalized_difference, region_mask,
        true_color, Composite, MedianStack, SpectralIndex,
    };
    pub use s2composite_core::prelude::*;
}
