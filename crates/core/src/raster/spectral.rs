//! Multi-band scene images with a per-pixel validity mask

use crate::error::{Error, Result};
use crate::raster::{GridLayout, Raster};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Logical Sentinel-2 band names used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    /// B2
    Blue,
    /// B3
    Green,
    /// B4
    Red,
    /// B8
    Nir,
    /// B11
    Swir1,
    /// QA60 cloud bitmask
    Qa,
}

impl Band {
    pub const ALL: [Band; 6] = [
        Band::Blue,
        Band::Green,
        Band::Red,
        Band::Nir,
        Band::Swir1,
        Band::Qa,
    ];

    /// Bands carrying surface reflectance (everything but the QA bitmask)
    pub const REFLECTANCE: [Band; 5] = [Band::Blue, Band::Green, Band::Red, Band::Nir, Band::Swir1];

    pub fn name(&self) -> &'static str {
        match self {
            Band::Blue => "blue",
            Band::Green => "green",
            Band::Red => "red",
            Band::Nir => "nir",
            Band::Swir1 => "swir1",
            Band::Qa => "qa",
        }
    }

    pub fn is_reflectance(&self) -> bool {
        !matches!(self, Band::Qa)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Band {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Band::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::MissingBand(s.to_string()))
    }
}

/// Radiometric encoding of the reflectance bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// Integer digital numbers, reflectance × 10000
    DigitalNumber,
    /// Unit reflectance, nominally [0, 1]
    Reflectance,
}

/// One acquisition resampled onto a [`GridLayout`].
///
/// Every band lies on the image layout. Invalid pixels (no data, clouds,
/// outside the region) hold NaN in every band and `false` in the mask.
#[derive(Debug, Clone)]
pub struct SpectralImage {
    id: String,
    layout: GridLayout,
    bands: BTreeMap<Band, Raster<f64>>,
    mask: Array2<bool>,
    encoding: Encoding,
}

impl SpectralImage {
    /// Empty image with every pixel valid
    pub fn new(id: impl Into<String>, layout: GridLayout, encoding: Encoding) -> Self {
        Self {
            id: id.into(),
            layout,
            bands: BTreeMap::new(),
            mask: Array2::from_elem(layout.shape(), true),
            encoding,
        }
    }

    /// Builder-style [`insert_band`](Self::insert_band)
    pub fn with_band(mut self, band: Band, raster: Raster<f64>) -> Result<Self> {
        self.insert_band(band, raster)?;
        Ok(self)
    }

    /// Add or replace a band. No-data cells of `raster` invalidate the
    /// corresponding pixels across the whole image.
    pub fn insert_band(&mut self, band: Band, mut raster: Raster<f64>) -> Result<()> {
        if raster.shape() != self.layout.shape() {
            let (ar, ac) = raster.shape();
            return Err(Error::SizeMismatch {
                er: self.layout.rows,
                ec: self.layout.cols,
                ar,
                ac,
            });
        }
        raster.set_transform(self.layout.transform);
        raster.set_crs(Some(self.layout.crs));

        let nodata = raster.nodata();
        let mut newly_invalid = false;
        Zip::from(&mut self.mask)
            .and(raster.data())
            .for_each(|valid, &v| {
                if *valid && (v.is_nan() || nodata.is_some_and(|nd| v == nd)) {
                    *valid = false;
                    newly_invalid = true;
                }
            });
        raster.set_nodata(Some(f64::NAN));
        self.bands.insert(band, raster);

        if newly_invalid || self.bands.len() == 1 {
            self.blank_invalid();
        }
        Ok(())
    }

    /// AND `keep` into the validity mask, blanking dropped pixels
    pub fn restrict_mask(&mut self, keep: &Array2<bool>) -> Result<()> {
        if keep.dim() != self.layout.shape() {
            let (ar, ac) = keep.dim();
            return Err(Error::SizeMismatch {
                er: self.layout.rows,
                ec: self.layout.cols,
                ar,
                ac,
            });
        }
        Zip::from(&mut self.mask)
            .and(keep)
            .for_each(|valid, &k| *valid &= k);
        self.blank_invalid();
        Ok(())
    }

    fn blank_invalid(&mut self) {
        for raster in self.bands.values_mut() {
            Zip::from(raster.data_mut())
                .and(&self.mask)
                .for_each(|v, &valid| {
                    if !valid {
                        *v = f64::NAN;
                    }
                });
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.encoding = encoding;
    }

    pub fn band(&self, band: Band) -> Result<&Raster<f64>> {
        self.bands
            .get(&band)
            .ok_or_else(|| Error::MissingBand(format!("{band} in image {}", self.id)))
    }

    pub fn band_mut(&mut self, band: Band) -> Result<&mut Raster<f64>> {
        let id = &self.id;
        self.bands
            .get_mut(&band)
            .ok_or_else(|| Error::MissingBand(format!("{band} in image {id}")))
    }

    pub fn has_band(&self, band: Band) -> bool {
        self.bands.contains_key(&band)
    }

    /// Bands in logical order
    pub fn bands(&self) -> impl Iterator<Item = (Band, &Raster<f64>)> {
        self.bands.iter().map(|(b, r)| (*b, r))
    }

    /// Remove a band from the image
    pub fn remove_band(&mut self, band: Band) -> Option<Raster<f64>> {
        self.bands.remove(&band)
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.mask.get((row, col)).copied().unwrap_or(false)
    }

    /// Number of valid pixels
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|v| **v).count()
    }
}
