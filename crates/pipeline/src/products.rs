//! The four exported products, derived from a composite and clipped to the
//! region.

use geo::MultiPolygon;
use s2composite_algorithms::imagery::{
    clip_raster, region_mask, true_color, Composite, SpectralIndex,
};
use s2composite_colormap::Visualization;
use s2composite_core::Raster;
use serde::Serialize;

use crate::error::Result;

/// Exported product kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    Ndvi,
    Ndmi,
    Ndwi,
    Rgb,
}

impl Product {
    pub const ALL: [Product; 4] = [Product::Ndvi, Product::Ndmi, Product::Ndwi, Product::Rgb];

    /// Lowercase key stem, as in `ndvi_tif`
    pub fn key(&self) -> &'static str {
        match self {
            Product::Ndvi => "ndvi",
            Product::Ndmi => "ndmi",
            Product::Ndwi => "ndwi",
            Product::Rgb => "rgb",
        }
    }

    /// File name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            Product::Ndvi => "Sentinel2_NDVI_Image",
            Product::Ndmi => "Sentinel2_NDMI_Image",
            Product::Ndwi => "Sentinel2_NDWI_Image",
            Product::Rgb => "Sentinel2_RGB_Image",
        }
    }

    pub fn visualization(&self) -> Visualization {
        match self {
            Product::Ndvi => Visualization::ndvi(),
            Product::Ndmi => Visualization::ndmi(),
            Product::Ndwi => Visualization::ndwi(),
            Product::Rgb => Visualization::true_color(),
        }
    }
}

/// Index rasters and the true-color triple, all on the composite grid.
#[derive(Debug, Clone)]
pub struct Products {
    pub ndvi: Raster<f64>,
    pub ndmi: Raster<f64>,
    pub ndwi: Raster<f64>,
    /// Red, green, blue
    pub rgb: [Raster<f64>; 3],
}

impl Products {
    /// Compute every product from `composite` and clip it to `region`,
    /// given in the composite's CRS.
    pub fn compute(composite: &Composite, region: &MultiPolygon<f64>) -> Result<Self> {
        let image = composite.image();
        let mask = region_mask(composite.layout(), region);
        let clipped_index = |index: SpectralIndex| -> Result<Raster<f64>> {
            Ok(clip_raster(&index.compute(image)?, &mask)?)
        };
        let [red, green, blue] = true_color(image)?;

        Ok(Self {
            ndvi: clipped_index(SpectralIndex::Ndvi)?,
            ndmi: clipped_index(SpectralIndex::Ndmi)?,
            ndwi: clipped_index(SpectralIndex::Ndwi)?,
            rgb: [
                clip_raster(&red, &mask)?,
                clip_raster(&green, &mask)?,
                clip_raster(&blue, &mask)?,
            ],
        })
    }

    /// Bands of `product`, in export order
    pub fn bands(&self, product: Product) -> Vec<&Raster<f64>> {
        match product {
            Product::Ndvi => vec![&self.ndvi],
            Product::Ndmi => vec![&self.ndmi],
            Product::Ndwi => vec![&self.ndwi],
            Product::Rgb => self.rgb.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::polygon;
    use s2composite_algorithms::imagery::median_composite;
    use s2composite_core::{Band, Encoding, GeoTransform, GridLayout, SpectralImage, CRS};

    fn layout() -> GridLayout {
        GridLayout::new(
            GeoTransform::new(0.0, 40.0, 10.0, -10.0),
            CRS::utm(30, true).unwrap(),
            4,
            4,
        )
        .unwrap()
    }

    fn composite() -> Composite {
        let layout = layout();
        let fill = |v: f64| Raster::on_layout(&layout, v);
        let image = SpectralImage::new("scene", layout, Encoding::Reflectance)
            .with_band(Band::Blue, fill(0.05))
            .unwrap()
            .with_band(Band::Green, fill(0.1))
            .unwrap()
            .with_band(Band::Red, fill(0.1))
            .unwrap()
            .with_band(Band::Nir, fill(0.3))
            .unwrap()
            .with_band(Band::Swir1, fill(0.2))
            .unwrap();
        median_composite(&[image], &Band::REFLECTANCE).unwrap()
    }

    #[test]
    fn products_are_clipped_to_region() {
        // Left half of the grid
        let region = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 20.0, y: 0.0),
            (x: 20.0, y: 40.0),
            (x: 0.0, y: 40.0),
        ]]);
        let products = Products::compute(&composite(), &region).unwrap();

        assert_relative_eq!(products.ndvi.get(0, 0).unwrap(), 0.5, epsilon = 1e-6);
        assert_relative_eq!(products.ndmi.get(0, 1).unwrap(), 0.2, epsilon = 1e-6);
        assert_relative_eq!(products.ndwi.get(3, 0).unwrap(), -0.5, epsilon = 1e-6);
        assert_relative_eq!(products.rgb[2].get(1, 1).unwrap(), 0.05, epsilon = 1e-6);

        for product in Product::ALL {
            for band in products.bands(product) {
                assert!(band.get(0, 2).unwrap().is_nan());
                assert!(band.get(3, 3).unwrap().is_nan());
                assert_eq!(band.valid_count(), 8);
            }
        }
    }

    #[test]
    fn product_naming() {
        assert_eq!(Product::Rgb.prefix(), "Sentinel2_RGB_Image");
        assert_eq!(Product::Ndwi.key(), "ndwi");
        assert_eq!(Product::Rgb.visualization().band_count(), 3);
    }
}
