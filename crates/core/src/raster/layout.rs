//! Working grid shared by every scene of a run

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use serde::{Deserialize, Serialize};

/// Pixel grid in a projected CRS.
///
/// Scenes are resampled onto one layout before compositing, so compositing
/// and index math operate on identically shaped arrays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    pub transform: GeoTransform,
    pub crs: CRS,
    pub rows: usize,
    pub cols: usize,
}

impl GridLayout {
    pub fn new(transform: GeoTransform, crs: CRS, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self {
            transform,
            crs,
            rows,
            cols,
        })
    }

    /// Smallest north-up grid of `cell_size` cells covering `bounds`
    /// (min_x, min_y, max_x, max_y) in `crs` units. The origin snaps to a
    /// multiple of the cell size.
    pub fn covering(bounds: (f64, f64, f64, f64), crs: CRS, cell_size: f64) -> Result<Self> {
        let (min_x, min_y, max_x, max_y) = bounds;
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::InvalidParameter {
                name: "cell_size",
                value: cell_size.to_string(),
                reason: "must be a positive number".into(),
            });
        }
        if !(min_x <= max_x && min_y <= max_y) {
            return Err(Error::InvalidParameter {
                name: "bounds",
                value: format!("{bounds:?}"),
                reason: "min must not exceed max".into(),
            });
        }

        let transform = GeoTransform::snapped(min_x, max_y, cell_size);
        let cols = ((max_x - transform.origin_x) / cell_size).ceil().max(1.0) as usize;
        let rows = ((transform.origin_y - min_y) / cell_size).ceil().max(1.0) as usize;
        Self::new(transform, crs, rows, cols)
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Always false: layouts have at least one cell
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Center of cell (row, col)
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Bounds (min_x, min_y, max_x, max_y) in CRS units
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }

    /// Bounds of this layout expressed in `target`, the envelope of the
    /// transformed edge points.
    pub fn bounds_in(&self, target: &CRS) -> Result<(f64, f64, f64, f64)> {
        let (min_x, min_y, max_x, max_y) = self.bounds();
        if self.crs == *target {
            return Ok((min_x, min_y, max_x, max_y));
        }

        const STEPS: usize = 8;
        let mut env = (
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );
        for i in 0..=STEPS {
            let f = i as f64 / STEPS as f64;
            let x = min_x + f * (max_x - min_x);
            let y = min_y + f * (max_y - min_y);
            for (px, py) in [(x, min_y), (x, max_y), (min_x, y), (max_x, y)] {
                let (tx, ty) = self.crs.transform_point(target, px, py)?;
                env.0 = env.0.min(tx);
                env.1 = env.1.min(ty);
                env.2 = env.2.max(tx);
                env.3 = env.3.max(ty);
            }
        }
        Ok(env)
    }

    /// Layout of at most `max_dim` cells along the longer side covering the
    /// same extent, aspect preserved. Returns `self` when already small enough.
    pub fn downscaled(&self, max_dim: usize) -> Self {
        let longer = self.rows.max(self.cols);
        if max_dim == 0 || longer <= max_dim {
            return *self;
        }
        let factor = longer as f64 / max_dim as f64;
        let rows = ((self.rows as f64 / factor).round() as usize).clamp(1, max_dim);
        let cols = ((self.cols as f64 / factor).round() as usize).clamp(1, max_dim);
        let t = self.transform;
        let transform = GeoTransform::new(
            t.origin_x,
            t.origin_y,
            t.pixel_width * self.cols as f64 / cols as f64,
            t.pixel_height * self.rows as f64 / rows as f64,
        );
        Self {
            transform,
            crs: self.crs,
            rows,
            cols,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn covering_snaps_and_covers() {
        let layout = GridLayout::covering(
            (440_001.0, 4_470_002.0, 440_051.0, 4_470_031.0),
            CRS::from_epsg(32630),
            5.0,
        )
        .unwrap();
        assert_relative_eq!(layout.transform.origin_x, 440_000.0);
        assert_relative_eq!(layout.transform.origin_y, 4_470_035.0);
        assert_eq!(layout.cols, 11);
        assert_eq!(layout.rows, 7);
        let (min_x, min_y, max_x, max_y) = layout.bounds();
        assert!(min_x <= 440_001.0 && max_x >= 440_051.0);
        assert!(min_y <= 4_470_002.0 && max_y >= 4_470_031.0);
    }

    #[test]
    fn covering_degenerate_extent_has_one_cell() {
        let layout =
            GridLayout::covering((10.0, 10.0, 10.0, 10.0), CRS::from_epsg(32630), 5.0).unwrap();
        assert_eq!(layout.shape(), (1, 1));
    }

    #[test]
    fn covering_rejects_bad_cell_size() {
        let crs = CRS::from_epsg(32630);
        assert!(GridLayout::covering((0.0, 0.0, 1.0, 1.0), crs, 0.0).is_err());
        assert!(GridLayout::covering((0.0, 0.0, 1.0, 1.0), crs, f64::NAN).is_err());
    }

    #[test]
    fn downscaled_preserves_aspect() {
        let layout = GridLayout::new(
            GeoTransform::new(0.0, 4000.0, 1.0, -1.0),
            CRS::from_epsg(32630),
            2000,
            4000,
        )
        .unwrap();
        let small = layout.downscaled(2048);
        assert_eq!(small.cols, 2048);
        assert_eq!(small.rows, 1024);
        let (a, b, c, d) = small.bounds();
        let (e, f, g, h) = layout.bounds();
        assert_relative_eq!(a, e, epsilon = 1e-9);
        assert_relative_eq!(b, f, epsilon = 1e-9);
        assert_relative_eq!(c, g, epsilon = 1e-9);
        assert_relative_eq!(d, h, epsilon = 1e-9);

        assert_eq!(small.downscaled(2048), small);
    }

    #[test]
    fn bounds_in_wgs84_brackets_grid() {
        let layout = GridLayout::covering(
            (440_000.0, 4_474_000.0, 441_000.0, 4_475_000.0),
            CRS::from_epsg(32630),
            5.0,
        )
        .unwrap();
        let (min_lon, min_lat, max_lon, max_lat) = layout.bounds_in(&CRS::wgs84()).unwrap();
        assert!(min_lon < -3.70 && max_lon > -3.70);
        assert!(min_lat < 40.42 && max_lat > 40.42);
    }
}
