//! Raster data structures

mod element;
mod geotransform;
mod grid;
mod layout;
mod spectral;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use layout::GridLayout;
pub use spectral::{Band, Encoding, SpectralImage};
