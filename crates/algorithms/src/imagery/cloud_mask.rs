//! QA60 cloud masking.
//!
//! The Sentinel-2 QA60 band is a bitfield: bit 10 flags opaque clouds and
//! bit 11 flags cirrus. A pixel is kept only when both bits are clear.

use ndarray::Array2;
use s2composite_core::raster::{Band, Encoding, Raster, SpectralImage};
use s2composite_core::Result;
use tracing::debug;

/// Opaque cloud flag in QA60
pub const CLOUD_BIT: u32 = 10;
/// Cirrus flag in QA60
pub const CIRRUS_BIT: u32 = 11;
/// Digital numbers per unit reflectance
pub const REFLECTANCE_SCALE: f64 = 10_000.0;

const CLOUDY: u64 = (1 << CLOUD_BIT) | (1 << CIRRUS_BIT);

/// Whether a QA60 value has neither the cloud nor the cirrus bit set.
///
/// Non-integral, negative or NaN values are treated as not clear.
pub fn is_clear(qa: f64) -> bool {
    if !(qa.is_finite() && qa >= 0.0 && qa.fract() == 0.0) {
        return false;
    }
    (qa as u64) & CLOUDY == 0
}

/// Per-pixel clear-sky flags of a QA60 raster
pub fn clear_sky_mask(qa: &Raster<f64>) -> Array2<bool> {
    qa.data().mapv(is_clear)
}

/// Mask cloudy and cirrus pixels, then rescale reflectance bands from
/// digital numbers to unit reflectance.
///
/// Masked pixels become invalid in every band. The QA band itself is never
/// rescaled. Applying this twice gives the same result as applying it once.
pub fn mask_clouds(mut image: SpectralImage) -> Result<SpectralImage> {
    let mask = clear_sky_mask(image.band(Band::Qa)?);
    let before = image.valid_count();
    image.restrict_mask(&mask)?;
    debug!(
        scene = image.id(),
        masked = before - image.valid_count(),
        "applied QA60 cloud mask"
    );

    if image.encoding() == Encoding::DigitalNumber {
        for band in Band::REFLECTANCE {
            if image.has_band(band) {
                image
                    .band_mut(band)?
                    .data_mut()
                    .mapv_inplace(|v| v / REFLECTANCE_SCALE);
            }
        }
        image.set_encoding(Encoding::Reflectance);
    }
    Ok(image)
}
