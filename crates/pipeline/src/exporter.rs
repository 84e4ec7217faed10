//! Writes planned artifacts to disk.
//!
//! Each artifact is encoded in memory, streamed in fixed-size chunks into a
//! temporary file in the output directory, and renamed into place. A failed
//! export never leaves a file under its final name.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use image::{ImageFormat, RgbaImage};
use s2composite_colormap::render;
use s2composite_core::io::write_geotiff_to_buffer;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::planner::{ArtifactFormat, ExportPlan, PlannedArtifact};
use crate::products::Products;

/// Bytes per write call when streaming an encoded artifact to disk.
pub const WRITE_CHUNK_SIZE: usize = 8192;

/// Runs the exports of a plan with bounded concurrency.
#[derive(Debug, Clone, Copy)]
pub struct RasterExporter {
    max_concurrent: usize,
}

impl RasterExporter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Export every artifact of `plan`, returning key to path.
    ///
    /// Stops at the first failure; artifacts already written stay on disk.
    pub async fn export_all(
        &self,
        plan: &ExportPlan,
        products: Arc<Products>,
    ) -> Result<BTreeMap<String, PathBuf>> {
        let preview_size = plan.preview_size;
        stream::iter(plan.artifacts().iter().cloned())
            .map(|artifact| {
                let products = Arc::clone(&products);
                async move {
                    let key = artifact.key.clone();
                    let path = tokio::task::spawn_blocking(move || {
                        export_artifact(&artifact, &products, preview_size)
                    })
                    .await
                    .map_err(|e| Error::Pipeline(format!("export task for {key} failed: {e}")))??;
                    info!(artifact = %key, path = %path.display(), "artifact written");
                    Ok::<_, Error>((key, path))
                }
            })
            .buffer_unordered(self.max_concurrent)
            .try_collect()
            .await
    }
}

impl Default for RasterExporter {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Encode and write one artifact. Blocking.
pub fn export_artifact(
    artifact: &PlannedArtifact,
    products: &Products,
    preview_size: (u32, u32),
) -> Result<PathBuf> {
    let bands = products.bands(artifact.product);
    let bytes = match artifact.format {
        ArtifactFormat::Tif => write_geotiff_to_buffer(&bands)?,
        ArtifactFormat::Png => {
            let (width, height) = preview_size;
            encode_png(&artifact.product.visualization(), &bands, width, height)?
        }
    };
    debug!(artifact = %artifact.key, bytes = bytes.len(), "encoded");
    write_atomic(&artifact.path, &bytes)?;
    Ok(artifact.path.clone())
}

fn encode_png(
    viz: &s2composite_colormap::Visualization,
    bands: &[&s2composite_core::Raster<f64>],
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let rgba = render(viz, bands, width, height)?;
    let img = RgbaImage::from_raw(rgba.width, rgba.height, rgba.into_raw())
        .ok_or_else(|| Error::Pipeline("RGBA buffer does not match preview size".into()))?;
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Error::Pipeline(format!("PNG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Write `bytes` to `path` through a temporary sibling file in
/// [`WRITE_CHUNK_SIZE`] chunks, then rename. Fails if `path` already exists.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    for chunk in bytes.chunks(WRITE_CHUNK_SIZE) {
        tmp.write_all(chunk)?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
