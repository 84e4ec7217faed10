//! Clipping rasters to a region.
//!
//! A cell belongs to the region when its center lies inside the region
//! polygons (even-odd rule per polygon, holes excluded). Membership is
//! computed by scanline: each row's center line is intersected with every
//! ring edge and the crossings are paired into inside intervals.

use crate::maybe_rayon::*;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use ndarray::{Array2, Zip};
use s2composite_core::raster::{GridLayout, Raster};
use s2composite_core::{Error, Result};

/// Cell-center membership of `layout` cells in `region`.
///
/// `region` must already be expressed in the layout CRS.
pub fn region_mask(layout: &GridLayout, region: &MultiPolygon<f64>) -> Array2<bool> {
    let (rows, cols) = layout.shape();
    let t = layout.transform;

    let data: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut inside = vec![false; cols];
            let y = t.origin_y + (row as f64 + 0.5) * t.pixel_height;
            let mut crossings = Vec::new();
            for polygon in region {
                crossings.clear();
                polygon_crossings(polygon, y, &mut crossings);
                crossings.sort_unstable_by(f64::total_cmp);
                for pair in crossings.chunks_exact(2) {
                    let first = center_index_at_or_after(pair[0], t.origin_x, t.pixel_width);
                    let end = center_index_at_or_after(pair[1], t.origin_x, t.pixel_width);
                    let (first, end) = (first.clamp(0, cols as i64), end.clamp(0, cols as i64));
                    for cell in &mut inside[first as usize..end.max(first) as usize] {
                        *cell = true;
                    }
                }
            }
            inside
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data)
        .unwrap_or_else(|_| Array2::from_elem((rows, cols), false))
}

fn polygon_crossings(polygon: &Polygon<f64>, y: f64, out: &mut Vec<f64>) {
    ring_crossings(polygon.exterior(), y, out);
    for ring in polygon.interiors() {
        ring_crossings(ring, y, out);
    }
}

fn ring_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for line in ring.lines() {
        let (Coord { x: x1, y: y1 }, Coord { x: x2, y: y2 }) = (line.start, line.end);
        // half-open in y so shared vertices count once
        if (y1 <= y && y < y2) || (y2 <= y && y < y1) {
            out.push(x1 + (y - y1) * (x2 - x1) / (y2 - y1));
        }
    }
}

/// First column whose center x is >= `x`
fn center_index_at_or_after(x: f64, origin_x: f64, pixel_width: f64) -> i64 {
    ((x - origin_x) / pixel_width - 0.5).ceil() as i64
}

/// Set every cell outside `mask` to no-data (NaN).
///
/// Clipping an already clipped raster with the same mask changes nothing.
pub fn clip_raster(raster: &Raster<f64>, mask: &Array2<bool>) -> Result<Raster<f64>> {
    if raster.shape() != mask.dim() {
        let (ar, ac) = mask.dim();
        return Err(Error::SizeMismatch {
            er: raster.rows(),
            ec: raster.cols(),
            ar,
            ac,
        });
    }
    let mut out = raster.clone();
    Zip::from(out.data_mut()).and(mask).for_each(|v, &inside| {
        if !inside {
            *v = f64::NAN;
        }
    });
    out.set_nodata(Some(f64::NAN));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Contains, Point};
    use s2composite_core::{GeoTransform, CRS};

    fn layout(rows: usize, cols: usize) -> GridLayout {
        GridLayout::new(
            GeoTransform::new(0.0, rows as f64, 1.0, -1.0),
            CRS::from_epsg(32630),
            rows,
            cols,
        )
        .unwrap()
    }

    fn diamond() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 10.0, y: 0.3),
            (x: 19.7, y: 10.0),
            (x: 10.0, y: 19.7),
            (x: 0.3, y: 10.0),
            (x: 10.0, y: 0.3),
        ]])
    }

    #[test]
    fn test_mask_matches_point_in_polygon() {
        let layout = layout(20, 20);
        let region = diamond();
        let mask = region_mask(&layout, &region);
        for row in 0..20 {
            for col in 0..20 {
                let (x, y) = layout.cell_center(row, col);
                let expected = region.contains(&Point::new(x, y));
                assert_eq!(mask[(row, col)], expected, "cell ({row}, {col})");
            }
        }
        assert!(!mask[(0, 0)]);
        assert!(mask[(10, 10)]);
    }

    #[test]
    fn test_holes_are_excluded() {
        let outer =
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]);
        let hole =
            LineString::from(vec![(3.0, 3.0), (7.0, 3.0), (7.0, 7.0), (3.0, 7.0), (3.0, 3.0)]);
        let region = MultiPolygon::new(vec![Polygon::new(outer, vec![hole])]);
        let mask = region_mask(&layout(10, 10), &region);
        assert!(mask[(1, 1)]);
        assert!(!mask[(5, 5)]);
        assert_eq!(mask.iter().filter(|v| **v).count(), 100 - 16);
    }

    #[test]
    fn test_region_outside_grid() {
        let far = MultiPolygon::new(vec![polygon![
            (x: 100.0, y: 100.0),
            (x: 110.0, y: 100.0),
            (x: 110.0, y: 110.0),
            (x: 100.0, y: 100.0),
        ]]);
        let mask = region_mask(&layout(5, 5), &far);
        assert!(mask.iter().all(|v| !v));
    }

    #[test]
    fn test_clip_is_idempotent() {
        let layout = layout(20, 20);
        let mask = region_mask(&layout, &diamond());
        let raster = Raster::on_layout(&layout, 0.5);
        let once = clip_raster(&raster, &mask).unwrap();
        let twice = clip_raster(&once, &mask).unwrap();
        assert!(once.get(0, 0).unwrap().is_nan());
        assert_eq!(once.get(10, 10).unwrap(), 0.5);
        for (a, b) in once.data().iter().zip(twice.data().iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn test_clip_shape_mismatch() {
        let raster = Raster::<f64>::new(3, 3);
        assert!(clip_raster(&raster, &Array2::from_elem((2, 3), true)).is_err());
    }
}
