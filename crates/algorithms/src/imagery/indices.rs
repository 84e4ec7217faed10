//! Normalized-difference spectral indices
//!
//! Every index here has the form `(A - B) / (A + B)` over two reflectance
//! bands of the same grid. Pixels where either input is no-data, or where
//! `A + B` is zero, are no-data (NaN) in the result.

use crate::maybe_rayon::*;
use ndarray::Array2;
use s2composite_core::raster::{Band, Raster, SpectralImage};
use s2composite_core::{Error, Result};

/// Indices derived from a composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index, (NIR - Red) / (NIR + Red)
    Ndvi,
    /// Normalized Difference Moisture Index, (NIR - SWIR1) / (NIR + SWIR1)
    Ndmi,
    /// Normalized Difference Water Index (McFeeters), (Green - NIR) / (Green + NIR)
    Ndwi,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 3] =
        [SpectralIndex::Ndvi, SpectralIndex::Ndmi, SpectralIndex::Ndwi];

    /// The `(A, B)` band pair of `(A - B) / (A + B)`
    pub fn bands(&self) -> (Band, Band) {
        match self {
            SpectralIndex::Ndvi => (Band::Nir, Band::Red),
            SpectralIndex::Ndmi => (Band::Nir, Band::Swir1),
            SpectralIndex::Ndwi => (Band::Green, Band::Nir),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Ndmi => "NDMI",
            SpectralIndex::Ndwi => "NDWI",
        }
    }

    /// Compute this index from the bands of `image`
    pub fn compute(&self, image: &SpectralImage) -> Result<Raster<f64>> {
        let (a, b) = self.bands();
        normalized_difference(image.band(a)?, image.band(b)?)
    }
}

/// `(a - b) / (a + b)` per cell, on the georeferencing of `band_a`.
///
/// For non-negative inputs the result lies in [-1, 1].
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    if band_a.shape() != band_b.shape() {
        return Err(Error::SizeMismatch {
            er: band_a.rows(),
            ec: band_a.cols(),
            ar: band_b.rows(),
            ac: band_b.cols(),
        });
    }
    let (rows, cols) = band_a.shape();
    let cell = |row: usize, col: usize| -> f64 {
        let a = band_a.data()[(row, col)];
        let b = band_b.data()[(row, col)];
        let sum = a + b;
        if band_a.is_nodata(a) || band_b.is_nodata(b) || sum == 0.0 {
            f64::NAN
        } else {
            (a - b) / sum
        }
    };

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| (0..cols).map(|col| cell(row, col)).collect::<Vec<_>>())
        .collect();
    let array = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::Other(e.to_string()))?;
    band_a.with_data(array)
}

/// Red, green and blue bands of `image`, in that order
pub fn true_color(image: &SpectralImage) -> Result<[Raster<f64>; 3]> {
    Ok([
        image.band(Band::Red)?.clone(),
        image.band(Band::Green)?.clone(),
        image.band(Band::Blue)?.clone(),
    ])
}
