//! Raster-to-RGBA rendering.

use s2composite_core::{Error, Raster, Result};

use crate::scheme::{ColorRamp, Rgb};
use crate::visualization::Visualization;

/// Fully transparent pixel, used for no-data.
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Row-major RGBA pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBuffer {
    pub fn pixel(&self, row: u32, col: u32) -> [u8; 4] {
        let i = ((row * self.width + col) * 4) as usize;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }
}

/// Render `bands` at `width` x `height` by nearest-neighbour sampling.
///
/// A ramp takes one band, a stretch takes red, green and blue. Pixels where
/// any input band is no-data come out transparent.
pub fn render(
    viz: &Visualization,
    bands: &[&Raster<f64>],
    width: u32,
    height: u32,
) -> Result<RgbaBuffer> {
    if bands.len() != viz.band_count() {
        return Err(Error::InvalidParameter {
            name: "bands",
            value: bands.len().to_string(),
            reason: format!("expected {} band(s)", viz.band_count()),
        });
    }
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions {
            width: width as usize,
            height: height as usize,
        });
    }
    let shape = bands[0].shape();
    if let Some(other) = bands.iter().find(|b| b.shape() != shape) {
        let (ar, ac) = other.shape();
        return Err(Error::SizeMismatch {
            er: shape.0,
            ec: shape.1,
            ar,
            ac,
        });
    }

    let sample = Sampler::new(shape, width, height);
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for row in 0..height {
        for col in 0..width {
            let (r, c) = sample.source(row, col);
            let px = match viz {
                Visualization::Ramp { min, max, ramp } => {
                    ramp_pixel(bands[0], r, c, *min, *max, ramp)
                }
                Visualization::Stretch { min, max } => stretch_pixel(bands, r, c, *min, *max),
            };
            pixels.extend_from_slice(&px);
        }
    }

    Ok(RgbaBuffer {
        width,
        height,
        pixels,
    })
}

/// Maps output pixels to the source cell containing their centre.
struct Sampler {
    rows: usize,
    cols: usize,
    row_scale: f64,
    col_scale: f64,
}

impl Sampler {
    fn new((rows, cols): (usize, usize), width: u32, height: u32) -> Self {
        Self {
            rows,
            cols,
            row_scale: rows as f64 / height as f64,
            col_scale: cols as f64 / width as f64,
        }
    }

    fn source(&self, row: u32, col: u32) -> (usize, usize) {
        let r = ((row as f64 + 0.5) * self.row_scale) as usize;
        let c = ((col as f64 + 0.5) * self.col_scale) as usize;
        (r.min(self.rows.saturating_sub(1)), c.min(self.cols.saturating_sub(1)))
    }
}

fn value_at(band: &Raster<f64>, r: usize, c: usize) -> Option<f64> {
    if band.rows() == 0 || band.cols() == 0 {
        return None;
    }
    let v = band.data()[(r, c)];
    (!band.is_nodata(v) && v.is_finite()).then_some(v)
}

fn ramp_pixel(
    band: &Raster<f64>,
    r: usize,
    c: usize,
    min: f64,
    max: f64,
    ramp: &ColorRamp,
) -> [u8; 4] {
    let Some(v) = value_at(band, r, c) else {
        return TRANSPARENT;
    };
    let span = max - min;
    let t = if span.abs() > f64::EPSILON { (v - min) / span } else { 0.0 };
    let Rgb { r, g, b } = ramp.evaluate(t);
    [r, g, b, 255]
}

fn stretch_pixel(bands: &[&Raster<f64>], r: usize, c: usize, min: f64, max: f64) -> [u8; 4] {
    let span = max - min;
    let mut px = [0u8, 0, 0, 255];
    for (channel, band) in px.iter_mut().zip(bands) {
        let Some(v) = value_at(band, r, c) else {
            return TRANSPARENT;
        };
        let t = if span.abs() > f64::EPSILON { (v - min) / span } else { 0.0 };
        *channel = (t.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    px
}
