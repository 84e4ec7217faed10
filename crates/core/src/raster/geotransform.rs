//! Affine pixel/world mapping

use serde::{Deserialize, Serialize};

/// Affine mapping from pixel space to world coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width  + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `(col, row) = (0, 0)` is the outer corner of the upper-left cell. Grids
/// built by this crate are north-up: no rotation, negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up grids
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// North-up transform of `cell_size` squares whose origin is moved
    /// outward onto the cell lattice, so `(min_x, max_y)` stays covered.
    pub fn snapped(min_x: f64, max_y: f64, cell_size: f64) -> Self {
        Self::new(
            (min_x / cell_size).floor() * cell_size,
            (max_y / cell_size).ceil() * cell_size,
            cell_size,
            -cell_size,
        )
    }

    /// From GeoTIFF `ModelPixelScale` and the first `ModelTiepoint`.
    pub fn from_tiepoint(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        match (scale, tiepoint) {
            ([sx, sy, ..], [i, j, _, x, y, ..]) => {
                Some(Self::new(x - i * sx, y + j * sy, *sx, -sy))
            }
            _ => None,
        }
    }

    /// From a row-major 4x4 GeoTIFF `ModelTransformation` matrix.
    pub fn from_model_matrix(m: &[f64]) -> Option<Self> {
        (m.len() >= 8).then(|| Self {
            origin_x: m[3],
            origin_y: m[7],
            pixel_width: m[0],
            pixel_height: m[5],
            row_rotation: m[1],
            col_rotation: m[4],
        })
    }

    fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// World coordinates of the centre of cell `(col, row)`
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// World coordinates of the upper-left corner of cell `(col, row)`
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Fractional `(col, row)` of a world point; NaN for a degenerate
    /// transform. Cell `(c, r)` spans `[c, c + 1) x [r, r + 1)`.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        let (dx, dy) = (x - self.origin_x, y - self.origin_y);
        (
            (self.pixel_height * dx - self.row_rotation * dy) / det,
            (self.pixel_width * dy - self.col_rotation * dx) / det,
        )
    }

    /// Cell width in world units
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// `(min_x, min_y, max_x, max_y)` of a `width` x `height` grid
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(width, 0),
            self.pixel_to_geo_corner(0, height),
            self.pixel_to_geo_corner(width, height),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn centre_maps_back_inside_its_cell() {
        let gt = GeoTransform::new(350_000.0, 6_300_000.0, 5.0, -5.0);
        let (x, y) = gt.pixel_to_geo(7, 3);
        assert_eq!((x, y), (350_037.5, 6_299_982.5));
        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 7.5, epsilon = 1e-9);
        assert_relative_eq!(row, 3.5, epsilon = 1e-9);
    }

    #[test]
    fn snapping_moves_origin_outward() {
        let gt = GeoTransform::snapped(440_003.2, 4_474_257.3, 5.0);
        assert_relative_eq!(gt.origin_x, 440_000.0, epsilon = 1e-9);
        assert_relative_eq!(gt.origin_y, 4_474_260.0, epsilon = 1e-9);
        assert_relative_eq!(gt.pixel_height, -5.0);

        let aligned = GeoTransform::snapped(100.0, 200.0, 10.0);
        assert_eq!((aligned.origin_x, aligned.origin_y), (100.0, 200.0));
    }

    #[test]
    fn geotiff_tags() {
        let tiepoint = [0.0, 0.0, 0.0, 600_000.0, 7_300_020.0, 0.0];
        let gt = GeoTransform::from_tiepoint(&[10.0, 10.0, 0.0], &tiepoint).unwrap();
        assert_eq!(gt, GeoTransform::new(600_000.0, 7_300_020.0, 10.0, -10.0));

        // Tiepoint anchored at cell (2, 1)
        let tiepoint = [2.0, 1.0, 0.0, 600_020.0, 7_300_010.0, 0.0];
        let gt = GeoTransform::from_tiepoint(&[10.0, 10.0], &tiepoint).unwrap();
        assert_eq!((gt.origin_x, gt.origin_y), (600_000.0, 7_300_020.0));
        assert!(GeoTransform::from_tiepoint(&[10.0], &[0.0; 6]).is_none());

        let m = [
            20.0, 0.0, 0.0, 500_000.0, 0.0, -20.0, 0.0, 4_000_000.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0,
        ];
        let gt = GeoTransform::from_model_matrix(&m).unwrap();
        assert_eq!(gt, GeoTransform::new(500_000.0, 4_000_000.0, 20.0, -20.0));
    }

    #[test]
    fn bounds_of_grid() {
        let gt = GeoTransform::new(0.0, 100.0, 2.0, -2.0);
        assert_eq!(gt.bounds(30, 50), (0.0, 0.0, 60.0, 100.0));
    }

    #[test]
    fn degenerate_transform_gives_nan() {
        let gt = GeoTransform::new(0.0, 0.0, 0.0, -1.0);
        assert!(gt.geo_to_pixel(1.0, 1.0).0.is_nan());
    }
}
