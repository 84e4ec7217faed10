//! # s2composite colormap
//!
//! Preview rendering for the exported products: hex palettes, multi-stop
//! color ramps, linear reflectance stretches, and nearest-neighbour
//! rendering of rasters to RGBA buffers with transparent no-data.

mod render;
mod scheme;
mod visualization;

pub use render::{render, RgbaBuffer, TRANSPARENT};
pub use scheme::{ColorRamp, ColorStop, Rgb, NDMI_PALETTE, NDVI_PALETTE, NDWI_PALETTE};
pub use visualization::Visualization;
