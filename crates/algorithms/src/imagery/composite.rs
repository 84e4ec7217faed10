//! Per-pixel median compositing
//!
//! Scenes are folded into a [`MedianStack`] one at a time. The stack keeps
//! only the stacked bands of each scene as `f32`, with masked pixels stored
//! as NaN, so a loaded image can be dropped as soon as it is pushed.

use crate::maybe_rayon::*;
use ndarray::Array2;
use s2composite_core::raster::{Band, Encoding, GridLayout, Raster, SpectralImage};
use s2composite_core::{Error, Result};
use tracing::debug;

/// Bytes a [`MedianStack`] holds per band, cell and scene
pub const STACK_BYTES_PER_VALUE: usize = std::mem::size_of::<f32>();

/// Median composite of a scene stack
#[derive(Debug, Clone)]
pub struct Composite {
    image: SpectralImage,
    scene_count: usize,
}

impl Composite {
    pub fn image(&self) -> &SpectralImage {
        &self.image
    }

    /// Number of scenes that entered the composite
    pub fn scene_count(&self) -> usize {
        self.scene_count
    }

    pub fn layout(&self) -> &GridLayout {
        self.image.layout()
    }
}

/// Median of the finite values in `values`, reordering the slice.
///
/// Even counts average the two middle values.
pub fn median(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = n / 2;
    if n % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Scenes awaiting the per-pixel median.
#[derive(Debug, Clone)]
pub struct MedianStack {
    layout: GridLayout,
    bands: Vec<Band>,
    encoding: Option<Encoding>,
    /// One plane per band: `layout.len()` cells per scene, scene after scene
    planes: Vec<Vec<f32>>,
    scenes: usize,
}

impl MedianStack {
    pub fn new(layout: GridLayout, bands: &[Band]) -> Self {
        Self {
            layout,
            bands: bands.to_vec(),
            encoding: None,
            planes: vec![Vec::new(); bands.len()],
            scenes: 0,
        }
    }

    /// Scenes pushed so far
    pub fn len(&self) -> usize {
        self.scenes
    }

    pub fn is_empty(&self) -> bool {
        self.scenes == 0
    }

    /// Bytes held by the stacked samples
    pub fn bytes(&self) -> usize {
        self.planes.iter().map(|p| p.len()).sum::<usize>() * STACK_BYTES_PER_VALUE
    }

    /// Copy the stacked bands of `image`. Invalid pixels do not contribute
    /// to the median.
    pub fn push(&mut self, image: &SpectralImage) -> Result<()> {
        let mismatch = |reason: &str| Error::InvalidParameter {
            name: "images",
            value: image.id().to_string(),
            reason: reason.into(),
        };
        if image.layout() != &self.layout {
            return Err(mismatch("all scenes must share one grid layout"));
        }
        if self.encoding.is_some_and(|e| e != image.encoding()) {
            return Err(mismatch("all scenes must share one radiometric encoding"));
        }
        let rasters = self
            .bands
            .iter()
            .map(|&band| image.band(band))
            .collect::<Result<Vec<_>>>()?;

        let mask = image.mask();
        for (plane, raster) in self.planes.iter_mut().zip(rasters) {
            plane.reserve_exact(self.layout.len());
            plane.extend(
                raster
                    .data()
                    .iter()
                    .zip(mask.iter())
                    .map(|(&v, &valid)| if valid { v as f32 } else { f32::NAN }),
            );
        }
        self.encoding = Some(image.encoding());
        self.scenes += 1;
        Ok(())
    }

    /// Per-pixel, per-band median of the valid samples. A pixel with no
    /// valid sample is invalid in the composite.
    pub fn finish(self) -> Result<Composite> {
        let Some(encoding) = self.encoding else {
            return Err(Error::EmptyStack);
        };
        let (rows, cols) = self.layout.shape();
        let cells = self.layout.len();
        let scenes = self.scenes;

        let mut composite = SpectralImage::new("median", self.layout, encoding);
        for (band, plane) in self.bands.into_iter().zip(self.planes) {
            let data: Vec<f64> = (0..rows)
                .into_par_iter()
                .flat_map(|row| {
                    let mut values = Vec::with_capacity(scenes);
                    (0..cols)
                        .map(|col| {
                            let cell = row * cols + col;
                            values.clear();
                            values.extend(
                                (0..scenes)
                                    .map(|scene| plane[scene * cells + cell])
                                    .filter(|v| !v.is_nan())
                                    .map(f64::from),
                            );
                            median(&mut values).unwrap_or(f64::NAN)
                        })
                        .collect::<Vec<_>>()
                })
                .collect();

            let array = Array2::from_shape_vec((rows, cols), data)
                .map_err(|e| Error::Other(e.to_string()))?;
            composite.insert_band(band, Raster::from_array(array))?;
        }

        debug!(
            scenes,
            valid = composite.valid_count(),
            "median composite built"
        );
        Ok(Composite {
            image: composite,
            scene_count: scenes,
        })
    }
}

/// Per-pixel, per-band median of the valid observations in `images`.
///
/// All images must share one layout and one encoding.
pub fn median_composite(images: &[SpectralImage], bands: &[Band]) -> Result<Composite> {
    let first = images.first().ok_or(Error::EmptyStack)?;
    let mut stack = MedianStack::new(*first.layout(), bands);
    for image in images {
        stack.push(image)?;
    }
    stack.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use s2composite_core::{GeoTransform, CRS};

    fn layout() -> GridLayout {
        GridLayout::new(
            GeoTransform::new(0.0, 10.0, 5.0, -5.0),
            CRS::from_epsg(32630),
            1,
            3,
        )
        .unwrap()
    }

    fn scene(id: &str, red: [f64; 3]) -> SpectralImage {
        SpectralImage::new(id, layout(), Encoding::Reflectance)
            .with_band(Band::Red, Raster::from_vec(red.to_vec(), 1, 3).unwrap())
            .unwrap()
    }

    #[test]
    fn test_median_helper() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0]), Some(3.0));
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }

    #[test]
    fn test_median_ignores_invalid_pixels() {
        let stack = vec![
            scene("a", [0.1, f64::NAN, f64::NAN]),
            scene("b", [0.3, 0.2, f64::NAN]),
            scene("c", [0.2, 0.4, f64::NAN]),
        ];
        let composite = median_composite(&stack, &[Band::Red]).unwrap();
        let red = composite.image().band(Band::Red).unwrap();

        assert_eq!(composite.scene_count(), 3);
        assert!((red.get(0, 0).unwrap() - 0.2).abs() < 1e-6);
        assert!((red.get(0, 1).unwrap() - 0.3).abs() < 1e-6);
        assert!(red.get(0, 2).unwrap().is_nan());
        assert!(!composite.image().is_valid(0, 2));
    }

    #[test]
    fn test_median_within_observed_range() {
        let stack: Vec<_> = (0..7)
            .map(|i| {
                let v = ((i * 37) % 11) as f64 / 10.0;
                scene(&format!("s{i}"), [v, 1.0 - v, v * v])
            })
            .collect();
        let composite = median_composite(&stack, &[Band::Red]).unwrap();
        let red = composite.image().band(Band::Red).unwrap();
        for col in 0..3 {
            let observed: Vec<f64> = stack
                .iter()
                .map(|s| s.band(Band::Red).unwrap().get(0, col).unwrap())
                .collect();
            let lo = observed.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = observed.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let m = red.get(0, col).unwrap();
            assert!(m >= lo - 1e-6 && m <= hi + 1e-6, "median {m} outside [{lo}, {hi}]");
        }
    }

    #[test]
    fn test_empty_stack() {
        assert!(matches!(
            median_composite(&[], &[Band::Red]),
            Err(Error::EmptyStack)
        ));
    }

    #[test]
    fn test_missing_band_and_mixed_layouts() {
        let stack = vec![scene("a", [0.1, 0.2, 0.3])];
        assert!(median_composite(&stack, &[Band::Nir]).is_err());

        let other = GridLayout::new(GeoTransform::default(), CRS::from_epsg(32631), 1, 3).unwrap();
        let stray = SpectralImage::new("x", other, Encoding::Reflectance);
        assert!(median_composite(&[scene("a", [0.1, 0.2, 0.3]), stray], &[Band::Red]).is_err());
    }

    #[test]
    fn test_stack_holds_only_requested_bands() {
        let image = scene("a", [0.1, f64::NAN, 0.3])
            .with_band(Band::Qa, Raster::from_vec(vec![0.0; 3], 1, 3).unwrap())
            .unwrap();
        let mut stack = MedianStack::new(layout(), &[Band::Red]);
        assert!(stack.is_empty());
        stack.push(&image).unwrap();
        stack.push(&scene("b", [0.3, 0.2, 0.1])).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.bytes(), 2 * 3 * STACK_BYTES_PER_VALUE);

        let composite = stack.finish().unwrap();
        assert!(!composite.image().has_band(Band::Qa));
        let red = composite.image().band(Band::Red).unwrap();
        assert!((red.get(0, 1).unwrap() - 0.2).abs() < 1e-6);
        assert!((red.get(0, 2).unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_stack_rejects_mixed_encodings() {
        let mut stack = MedianStack::new(layout(), &[Band::Red]);
        stack.push(&scene("a", [0.1, 0.2, 0.3])).unwrap();
        let mut dn = scene("b", [1000.0, 2000.0, 3000.0]);
        dn.set_encoding(Encoding::DigitalNumber);
        assert!(stack.push(&dn).is_err());
        assert_eq!(stack.len(), 1);
        assert!(matches!(
            MedianStack::new(layout(), &[Band::Red]).finish(),
            Err(Error::EmptyStack)
        ));
    }
}
