//! Remote COG reader: open by URL, read the full-resolution pixels that
//! cover a bounding box.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use ndarray::Array2;
use s2composite_core::{GeoTransform, Raster, CRS};
use tracing::debug;

use crate::auth::{CloudAuth, NoAuth};
use crate::decompress::{self, PREDICTOR_HORIZONTAL, PREDICTOR_NONE};
use crate::error::{CloudError, Result};
use crate::http::HttpClient;
use crate::ifd::{self, tags, Directory, Endian, Entry};
use crate::tile_index::{window_for_bbox, BBox, BlockGrid, BlockRef, PixelWindow};

/// Options for configuring a [`CogReader`].
#[derive(Debug, Clone)]
pub struct CogReaderOptions {
    /// Maximum number of concurrent block fetches (default: 8).
    pub max_concurrent_fetches: usize,
    /// Size of the initial header read (default: 64 KiB).
    pub header_bytes: u64,
}

impl Default for CogReaderOptions {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 8,
            header_bytes: 64 * 1024,
        }
    }
}

/// Metadata of the full-resolution image.
#[derive(Debug, Clone)]
pub struct CogMetadata {
    pub url: String,
    pub width: usize,
    pub height: usize,
    pub block_width: usize,
    pub block_height: usize,
    pub tiled: bool,
    pub bits_per_sample: u16,
    pub sample_format: u16,
    pub compression: u16,
    pub predictor: u16,
    pub geo_transform: GeoTransform,
    pub crs: CRS,
    pub nodata: Option<f64>,
}

/// Cloud Optimized GeoTIFF reader over HTTP Range requests.
pub struct CogReader {
    http: HttpClient,
    auth: Arc<dyn CloudAuth>,
    endian: Endian,
    grid: BlockGrid,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    meta: CogMetadata,
    options: CogReaderOptions,
}

impl CogReader {
    /// Open a remote COG: fetch the header and parse the first IFD.
    pub async fn open(url: &str, http: HttpClient, options: CogReaderOptions) -> Result<Self> {
        Self::open_with_auth(url, http, Arc::new(NoAuth), options).await
    }

    pub async fn open_with_auth(
        url: &str,
        http: HttpClient,
        auth: Arc<dyn CloudAuth>,
        options: CogReaderOptions,
    ) -> Result<Self> {
        let head = http
            .fetch_range(url, 0, options.header_bytes, auth.as_ref())
            .await?;
        let (endian, first_ifd) = ifd::parse_header(&head)?;

        let source = Source {
            url,
            http: &http,
            auth: auth.as_ref(),
            head: &head,
        };
        let count_bytes = source.bytes_at(first_ifd as u64, 2).await?;
        let entry_count = endian.u16(&count_bytes);
        let dir_bytes = source
            .bytes_at(first_ifd as u64, ifd::directory_len(entry_count) as u64)
            .await?;
        let dir = ifd::parse_directory(endian, &dir_bytes)?;

        let width = source.required_u64(&dir, tags::IMAGE_WIDTH).await? as usize;
        let height = source.required_u64(&dir, tags::IMAGE_LENGTH).await? as usize;
        let samples = source.first_u64(&dir, tags::SAMPLES_PER_PIXEL).await?.unwrap_or(1);
        if samples != 1 {
            return Err(CloudError::UnsupportedLayout(format!(
                "{samples} samples per pixel"
            )));
        }
        let planar = source.first_u64(&dir, tags::PLANAR_CONFIG).await?.unwrap_or(1);
        if planar != 1 {
            return Err(CloudError::UnsupportedLayout(format!(
                "planar configuration {planar}"
            )));
        }

        let bits_per_sample =
            source.first_u64(&dir, tags::BITS_PER_SAMPLE).await?.unwrap_or(8) as u16;
        let sample_format = source.first_u64(&dir, tags::SAMPLE_FORMAT).await?.unwrap_or(1) as u16;
        let compression = source.first_u64(&dir, tags::COMPRESSION).await?.unwrap_or(1) as u16;
        let predictor = source
            .first_u64(&dir, tags::PREDICTOR)
            .await?
            .unwrap_or(PREDICTOR_NONE as u64) as u16;
        if predictor != PREDICTOR_NONE && predictor != PREDICTOR_HORIZONTAL {
            return Err(CloudError::UnsupportedLayout(format!("predictor {predictor}")));
        }

        let tiled = dir.get(tags::TILE_WIDTH).is_some();
        let (block_width, block_height, offsets, byte_counts) = if tiled {
            (
                source.required_u64(&dir, tags::TILE_WIDTH).await? as usize,
                source.required_u64(&dir, tags::TILE_LENGTH).await? as usize,
                source.required_array(&dir, tags::TILE_OFFSETS).await?,
                source.required_array(&dir, tags::TILE_BYTE_COUNTS).await?,
            )
        } else {
            let rows_per_strip = source
                .first_u64(&dir, tags::ROWS_PER_STRIP)
                .await?
                .map_or(height, |r| (r as usize).min(height));
            (
                width,
                rows_per_strip,
                source.required_array(&dir, tags::STRIP_OFFSETS).await?,
                source.required_array(&dir, tags::STRIP_BYTE_COUNTS).await?,
            )
        };
        if block_width == 0 || block_height == 0 {
            return Err(invalid("zero block dimensions"));
        }

        let grid = BlockGrid {
            image_width: width,
            image_height: height,
            block_width,
            block_height,
        };
        if offsets.len() < grid.block_count() || byte_counts.len() < grid.block_count() {
            return Err(invalid("block offset table shorter than block grid"));
        }

        let geo_transform = source.geo_transform(&dir).await?;
        let crs = source.crs(&dir).await?;
        let nodata = match dir.get(tags::GDAL_NODATA) {
            Some(e) => ifd::decode_ascii(&source.value(endian, e).await?).parse::<f64>().ok(),
            None => None,
        };

        let meta = CogMetadata {
            url: url.to_string(),
            width,
            height,
            block_width,
            block_height,
            tiled,
            bits_per_sample,
            sample_format,
            compression,
            predictor,
            geo_transform,
            crs,
            nodata,
        };
        debug!(url, width, height, block_width, block_height, %crs, "opened COG");

        Ok(Self {
            http,
            auth,
            endian,
            grid,
            offsets,
            byte_counts,
            meta,
            options,
        })
    }

    pub fn metadata(&self) -> &CogMetadata {
        &self.meta
    }

    /// Georeferenced bounds of the image
    pub fn bounds(&self) -> BBox {
        BBox::from_bounds(self.meta.geo_transform.bounds(self.meta.width, self.meta.height))
    }

    /// Read the pixels covering `bbox` (in the image CRS).
    ///
    /// Returns `None` when the bbox does not touch the image. Sparse blocks
    /// are filled with the no-data value (NaN when none is declared).
    pub async fn read_window(&self, bbox: &BBox) -> Result<Option<Raster<f64>>> {
        let Some(window) =
            window_for_bbox(bbox, &self.meta.geo_transform, self.meta.width, self.meta.height)
        else {
            return Ok(None);
        };

        let blocks = self.grid.blocks_for(&window);
        debug!(url = %self.meta.url, blocks = blocks.len(), ?window, "reading window");

        let fetched: Vec<(BlockRef, Option<Vec<f64>>)> = stream::iter(blocks)
            .map(|block| async move {
                Ok::<_, CloudError>((block, self.fetch_block(&block).await?))
            })
            .buffer_unordered(self.options.max_concurrent_fetches.max(1))
            .try_collect()
            .await?;

        let fill = self.meta.nodata.unwrap_or(f64::NAN);
        let mut data = Array2::from_elem((window.rows, window.cols), fill);
        for (block, samples) in &fetched {
            if let Some(samples) = samples {
                self.place_block(&mut data, &window, block, samples);
            }
        }

        let t = self.meta.geo_transform;
        let (origin_x, origin_y) = t.pixel_to_geo_corner(window.col_off, window.row_off);
        let transform = GeoTransform {
            origin_x,
            origin_y,
            ..t
        };
        let mut raster = Raster::from_array(data).georeferenced(transform, self.meta.crs);
        raster.set_nodata(self.meta.nodata);
        Ok(Some(raster))
    }

    async fn fetch_block(&self, block: &BlockRef) -> Result<Option<Vec<f64>>> {
        let offset = self.offsets[block.index];
        let length = self.byte_counts[block.index];
        if length == 0 {
            return Ok(None);
        }

        let compressed = self
            .http
            .fetch_range(&self.meta.url, offset, length, self.auth.as_ref())
            .await?;

        let rows = self.block_rows(block);
        let bytes_per_sample = (self.meta.bits_per_sample / 8).max(1) as usize;
        let expected = self.meta.block_width * rows * bytes_per_sample;
        let mut raw = decompress::decompress(&compressed, self.meta.compression, expected)?;
        if self.meta.predictor == PREDICTOR_HORIZONTAL {
            decompress::undo_horizontal_predictor(
                &mut raw,
                self.endian,
                self.meta.bits_per_sample,
                self.meta.block_width,
            )?;
        }
        let samples = decompress::decode_samples(
            &raw,
            self.endian,
            self.meta.bits_per_sample,
            self.meta.sample_format,
        )?;
        Ok(Some(samples))
    }

    /// Rows stored in `block`; the last strip may be short, tiles never are.
    fn block_rows(&self, block: &BlockRef) -> usize {
        if self.meta.tiled {
            self.meta.block_height
        } else {
            let start = block.block_row * self.meta.block_height;
            self.meta.block_height.min(self.meta.height - start)
        }
    }

    fn place_block(
        &self,
        data: &mut Array2<f64>,
        window: &PixelWindow,
        block: &BlockRef,
        samples: &[f64],
    ) {
        let bw = self.meta.block_width;
        let x0 = block.block_col * bw;
        let y0 = block.block_row * self.meta.block_height;
        let rows = self.block_rows(block);

        let col_start = window.col_off.max(x0);
        let col_end = window.col_end().min(x0 + bw);
        let row_start = window.row_off.max(y0);
        let row_end = window.row_end().min(y0 + rows);

        for r in row_start..row_end {
            for c in col_start..col_end {
                if let Some(&v) = samples.get((r - y0) * bw + (c - x0)) {
                    data[(r - window.row_off, c - window.col_off)] = v;
                }
            }
        }
    }
}

fn invalid(reason: &str) -> CloudError {
    CloudError::InvalidTiff {
        reason: reason.to_string(),
    }
}

/// Byte source for IFD values: slices of the header read, or extra range
/// requests for values past it.
struct Source<'a> {
    url: &'a str,
    http: &'a HttpClient,
    auth: &'a dyn CloudAuth,
    head: &'a [u8],
}

impl Source<'_> {
    async fn bytes_at(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let end = offset + len;
        if end as usize <= self.head.len() {
            return Ok(self.head[offset as usize..end as usize].to_vec());
        }
        let bytes = self.http.fetch_range(self.url, offset, len, self.auth).await?;
        if (bytes.len() as u64) < len {
            return Err(invalid("truncated tag value"));
        }
        Ok(bytes)
    }

    async fn value(&self, endian: Endian, entry: &Entry) -> Result<Vec<u8>> {
        let len = entry.value_len();
        if entry.is_inline() {
            Ok(entry.value_field[..len as usize].to_vec())
        } else {
            self.bytes_at(entry.value_offset(endian), len).await
        }
    }

    async fn array(&self, dir: &Directory, tag: u16) -> Result<Option<Vec<u64>>> {
        match dir.get(tag) {
            Some(entry) => {
                let bytes = self.value(dir.endian, entry).await?;
                Ok(Some(ifd::decode_unsigned(dir.endian, entry, &bytes)))
            }
            None => Ok(None),
        }
    }

    async fn first_u64(&self, dir: &Directory, tag: u16) -> Result<Option<u64>> {
        Ok(self.array(dir, tag).await?.and_then(|v| v.first().copied()))
    }

    async fn required_u64(&self, dir: &Directory, tag: u16) -> Result<u64> {
        self.first_u64(dir, tag)
            .await?
            .ok_or_else(|| invalid(&format!("missing tag {tag}")))
    }

    async fn required_array(&self, dir: &Directory, tag: u16) -> Result<Vec<u64>> {
        self.array(dir, tag)
            .await?
            .ok_or_else(|| invalid(&format!("missing tag {tag}")))
    }

    async fn floats(&self, dir: &Directory, tag: u16) -> Result<Option<Vec<f64>>> {
        match dir.get(tag) {
            Some(entry) => {
                let bytes = self.value(dir.endian, entry).await?;
                Ok(Some(ifd::decode_float(dir.endian, entry, &bytes)))
            }
            None => Ok(None),
        }
    }

    async fn geo_transform(&self, dir: &Directory) -> Result<GeoTransform> {
        let matrix = self.floats(dir, tags::MODEL_TRANSFORMATION).await?;
        if let Some(gt) = matrix.as_deref().and_then(GeoTransform::from_model_matrix) {
            return Ok(gt);
        }
        let scale = self.floats(dir, tags::MODEL_PIXEL_SCALE).await?;
        let tie = self.floats(dir, tags::MODEL_TIEPOINT).await?;
        scale
            .zip(tie)
            .and_then(|(s, t)| GeoTransform::from_tiepoint(&s, &t))
            .ok_or_else(|| invalid("no georeferencing tags"))
    }

    async fn crs(&self, dir: &Directory) -> Result<CRS> {
        let keys = self
            .array(dir, tags::GEO_KEY_DIRECTORY)
            .await?
            .ok_or_else(|| invalid("missing GeoKeyDirectory"))?;
        epsg_from_geokeys(&keys)
            .map(CRS::from_epsg)
            .ok_or_else(|| invalid("no EPSG code in GeoKeyDirectory"))
    }
}

/// EPSG code from a GeoKeyDirectory: the projected CRS key if set, else
/// the geographic one. Only inline (location 0) key values are read.
fn epsg_from_geokeys(keys: &[u64]) -> Option<u32> {
    const PROJECTED: u64 = 3072;
    const GEOGRAPHIC: u64 = 2048;
    const USER_DEFINED: u64 = 32767;

    let count = *keys.get(3)? as usize;
    let lookup = |wanted: u64| {
        keys.get(4..4 + count * 4)?
            .chunks_exact(4)
            .find(|k| k[0] == wanted && k[1] == 0)
            .map(|k| k[3])
            .filter(|&v| v != 0 && v != USER_DEFINED)
    };
    lookup(PROJECTED).or_else(|| lookup(GEOGRAPHIC)).map(|v| v as u32)
}
