//! Sentinel-2 imagery algorithms
//!
//! - Cloud mask: QA60 bit test plus DN to reflectance scaling
//! - Median composite: per-pixel, per-band median of valid observations
//! - Spectral indices: NDVI, NDMI, NDWI over a composite
//! - Clip: pixel-center containment in a region polygon

mod clip;
mod cloud_mask;
mod composite;
mod indices;

pub use clip::{clip_raster, region_mask};
pub use cloud_mask::{
    clear_sky_mask, is_clear, mask_clouds, CIRRUS_BIT, CLOUD_BIT, REFLECTANCE_SCALE,
};
pub use composite::{median, median_composite, Composite, MedianStack, STACK_BYTES_PER_VALUE};
pub use indices::{normalized_difference, true_color, SpectralIndex};
