//! Block grid math for COG files.
//!
//! A block is a tile, or a full-width strip for stripped layouts. Maps a
//! bounding box in the image CRS to the pixel window it covers and the
//! blocks that must be fetched to fill it.

use s2composite_core::GeoTransform;

/// A bounding box in the image CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_bounds((min_x, min_y, max_x, max_y): (f64, f64, f64, f64)) -> Self {
        Self::new(min_x, min_y, max_x, max_y)
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }
}

/// Pixel window in the full image, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl PixelWindow {
    pub fn col_end(&self) -> usize {
        self.col_off + self.cols
    }

    pub fn row_end(&self) -> usize {
        self.row_off + self.rows
    }
}

/// Block layout of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGrid {
    pub image_width: usize,
    pub image_height: usize,
    pub block_width: usize,
    pub block_height: usize,
}

/// A block that contributes to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    /// Index into the offsets / byte counts arrays
    pub index: usize,
    pub block_col: usize,
    pub block_row: usize,
}

impl BlockGrid {
    pub fn blocks_across(&self) -> usize {
        self.image_width.div_ceil(self.block_width)
    }

    pub fn blocks_down(&self) -> usize {
        self.image_height.div_ceil(self.block_height)
    }

    pub fn block_count(&self) -> usize {
        self.blocks_across() * self.blocks_down()
    }

    /// Blocks overlapping `window`, row-major.
    pub fn blocks_for(&self, window: &PixelWindow) -> Vec<BlockRef> {
        let across = self.blocks_across();
        let col_range = window.col_off / self.block_width
            ..window.col_end().div_ceil(self.block_width).min(across);
        let row_range = window.row_off / self.block_height
            ..window.row_end().div_ceil(self.block_height).min(self.blocks_down());

        row_range
            .flat_map(|block_row| {
                col_range.clone().map(move |block_col| BlockRef {
                    index: block_row * across + block_col,
                    block_col,
                    block_row,
                })
            })
            .collect()
    }
}

/// Pixel window of an image covering `bbox`, clamped to the image.
///
/// Returns `None` when the bbox misses the image entirely.
pub fn window_for_bbox(
    bbox: &BBox,
    transform: &GeoTransform,
    image_width: usize,
    image_height: usize,
) -> Option<PixelWindow> {
    let (col_a, row_a) = transform.geo_to_pixel(bbox.min_x, bbox.max_y);
    let (col_b, row_b) = transform.geo_to_pixel(bbox.max_x, bbox.min_y);
    if !(col_a.is_finite() && col_b.is_finite() && row_a.is_finite() && row_b.is_finite()) {
        return None;
    }

    let clamp = |v: f64, max: usize| (v.max(0.0) as usize).min(max);
    let min_col = clamp(col_a.min(col_b).floor(), image_width);
    let max_col = clamp(col_a.max(col_b).ceil(), image_width);
    let min_row = clamp(row_a.min(row_b).floor(), image_height);
    let max_row = clamp(row_a.max(row_b).ceil(), image_height);

    if min_col >= max_col || min_row >= max_row {
        return None;
    }
    Some(PixelWindow {
        col_off: min_col,
        row_off: min_row,
        cols: max_col - min_col,
        rows: max_row - min_row,
    })
}
