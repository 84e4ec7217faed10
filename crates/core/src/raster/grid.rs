//! Georeferenced raster grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, GridLayout, RasterElement};
use ndarray::Array2;

/// A 2D grid of cells indexed `(row, col)`, with optional georeferencing
/// and a no-data marker.
///
/// Scene bands and exported products sit on a [`GridLayout`], so every
/// band of a scene shares one transform and CRS.
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled, ungeoreferenced
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Every cell of `layout` set to `value`, with the element type's
    /// default no-data (NaN for floats).
    pub fn on_layout(layout: &GridLayout, value: T) -> Self {
        Self {
            data: Array2::from_elem(layout.shape(), value),
            transform: layout.transform,
            crs: Some(layout.crs),
            nodata: T::default_nodata(),
        }
    }

    /// Row-major `data` of `rows * cols` cells
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        Array2::from_shape_vec((rows, cols), data)
            .map(Self::from_array)
            .map_err(|_| Error::InvalidDimensions {
                width: cols,
                height: rows,
            })
    }

    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// New cell values on this raster's georeferencing. The element type's
    /// default no-data is attached.
    pub fn with_data<U: RasterElement>(&self, data: Array2<U>) -> Result<Raster<U>> {
        if data.dim() != self.shape() {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar,
                ac,
            });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs,
            nodata: U::default_nodata(),
        })
    }

    pub fn georeferenced(mut self, transform: GeoTransform, crs: CRS) -> Self {
        self.transform = transform;
        self.crs = Some(crs);
        self
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or_else(|| self.out_of_bounds(row, col))
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(self.out_of_bounds(row, col));
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// `(min_x, min_y, max_x, max_y)` in CRS units
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// The grid this raster sits on; `None` without a CRS
    pub fn layout(&self) -> Option<GridLayout> {
        GridLayout::new(self.transform, self.crs?, self.rows(), self.cols()).ok()
    }

    pub fn is_on(&self, layout: &GridLayout) -> bool {
        self.shape() == layout.shape()
            && self.crs == Some(layout.crs)
            && self.transform == layout.transform
    }

    /// Fractional `(col, row)` of a CRS coordinate
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Cells holding data
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// Summary of the cells holding data
    pub fn statistics(&self) -> RasterStatistics {
        let values = self
            .data
            .iter()
            .filter(|&&v| !self.is_nodata(v))
            .filter_map(|v| v.to_f64());
        let (mut min, mut max, mut sum, mut count) = (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0);
        for v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            count += 1;
        }
        let any = count > 0;
        RasterStatistics {
            min: any.then_some(min),
            max: any.then_some(max),
            mean: any.then(|| sum / count as f64),
            valid_count: count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub valid_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> GridLayout {
        GridLayout::new(
            GeoTransform::new(440_000.0, 4_475_000.0, 5.0, -5.0),
            CRS::from_epsg(32630),
            4,
            6,
        )
        .unwrap()
    }

    #[test]
    fn bounds_checked_access() {
        let mut raster: Raster<f32> = Raster::new(3, 4);
        raster.set(2, 3, 7.5).unwrap();
        assert_eq!(raster.get(2, 3).unwrap(), 7.5);
        assert!(matches!(
            raster.set(3, 0, 1.0),
            Err(Error::IndexOutOfBounds { rows: 3, cols: 4, .. })
        ));
        assert!(raster.get(0, 4).is_err());
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(Raster::from_vec(vec![1.0_f64; 5], 2, 3).is_err());
        let r = Raster::from_vec(vec![1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        assert_eq!(r.get(1, 0).unwrap(), 4.0);
    }

    #[test]
    fn on_layout_carries_georeferencing() {
        let layout = layout();
        let raster: Raster<f64> = Raster::on_layout(&layout, f64::NAN);
        assert!(raster.is_on(&layout));
        assert_eq!(raster.layout().unwrap(), layout);
        assert_eq!(raster.valid_count(), 0);
        assert_eq!(raster.bounds(), (440_000.0, 4_474_980.0, 440_030.0, 4_475_000.0));
    }

    #[test]
    fn with_data_keeps_grid() {
        let raster: Raster<f64> = Raster::on_layout(&layout(), 0.0);
        assert!(raster.with_data(Array2::<f64>::zeros((3, 3))).is_err());
        let copy = raster.with_data(Array2::<f32>::ones((4, 6))).unwrap();
        assert_eq!(copy.crs(), raster.crs());
        assert!(Raster::<f64>::new(4, 6).layout().is_none());
    }

    #[test]
    fn statistics_skip_nodata() {
        let mut raster = Raster::from_vec(vec![0.0, 1.0, f64::NAN, 3.0], 2, 2).unwrap();
        raster.set_nodata(Some(f64::NAN));
        let stats = raster.statistics();
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(3.0));
        assert_eq!(stats.mean, Some(4.0 / 3.0));
        assert_eq!(stats.valid_count, 3);

        raster.set_nodata(Some(0.0));
        assert_eq!(raster.statistics().min, Some(1.0));
    }
}
