//! Nearest-neighbour resampling of scene bands onto the working grid.

use rayon::prelude::*;
use s2composite_core::{GridLayout, Raster};

use crate::error::{CloudError, Result};

/// Resample `src` onto `layout` by nearest neighbour.
///
/// Each target cell takes the source pixel containing its centre, after
/// transforming the centre into the source CRS. Cells falling outside the
/// source are NaN; the source no-data value is carried over.
pub fn resample_nearest(src: &Raster<f64>, layout: &GridLayout) -> Result<Raster<f64>> {
    let src_crs = *src
        .crs()
        .ok_or_else(|| CloudError::UnsupportedLayout("source raster has no CRS".into()))?;
    let (src_rows, src_cols) = src.shape();
    let src_data = src.data();

    let rows: Vec<Vec<f64>> = (0..layout.rows)
        .into_par_iter()
        .map(|row| {
            let mut out = vec![f64::NAN; layout.cols];
            for (col, cell) in out.iter_mut().enumerate() {
                let (x, y) = layout.cell_center(row, col);
                let (sx, sy) = layout.crs.transform_point(&src_crs, x, y)?;
                let (c, r) = src.geo_to_pixel(sx, sy);
                if c < 0.0 || r < 0.0 || !c.is_finite() || !r.is_finite() {
                    continue;
                }
                let (c, r) = (c.floor() as usize, r.floor() as usize);
                if r < src_rows && c < src_cols {
                    *cell = src_data[(r, c)];
                }
            }
            Ok(out)
        })
        .collect::<std::result::Result<_, s2composite_core::Error>>()?;

    let data = rows.into_iter().flatten().collect();
    let mut out = Raster::from_vec(data, layout.rows, layout.cols)?
        .georeferenced(layout.transform, layout.crs);
    out.set_nodata(src.nodata());
    Ok(out)
}
