//! GeoTIFF encoding and decoding

mod geotiff;

pub use geotiff::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer, GeoTiff,
};
