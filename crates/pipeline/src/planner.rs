//! Output naming, export scale and preview sizing.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use s2composite_core::GridLayout;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::products::Product;

/// Timestamp format of output names, second resolution
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    /// Full-resolution Float32 GeoTIFF
    Tif,
    /// Color-mapped RGBA preview
    Png,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Tif => "tif",
            ArtifactFormat::Png => "png",
        }
    }
}

/// One file the run will produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedArtifact {
    pub product: Product,
    pub format: ArtifactFormat,
    /// Logical key such as `ndvi_tif`
    pub key: String,
    pub path: PathBuf,
}

/// All eight artifacts of a run plus the export parameters.
#[derive(Debug, Clone, Serialize)]
pub struct ExportPlan {
    pub run_id: String,
    pub timestamp: String,
    /// GeoTIFF cell size in metres
    pub scale: f64,
    /// PNG preview size (width, height)
    pub preview_size: (u32, u32),
    artifacts: Vec<PlannedArtifact>,
}

impl ExportPlan {
    /// Plan the outputs of one run over `layout`.
    ///
    /// Every name shares `generated_at` (at second resolution) and
    /// `run_id`, so names are distinct within a run and across runs.
    pub fn new(
        output_dir: &Path,
        layout: &GridLayout,
        preview_max_dimension: u32,
        generated_at: DateTime<Local>,
        run_id: &str,
    ) -> Result<Self> {
        let timestamp = generated_at.format(TIMESTAMP_FORMAT).to_string();
        let mut artifacts = Vec::with_capacity(8);
        for format in [ArtifactFormat::Tif, ArtifactFormat::Png] {
            for product in Product::ALL {
                let file_name = format!(
                    "{}_{}_{}.{}",
                    product.prefix(),
                    timestamp,
                    run_id,
                    format.extension()
                );
                artifacts.push(PlannedArtifact {
                    product,
                    format,
                    key: format!("{}_{}", product.key(), format.extension()),
                    path: output_dir.join(file_name),
                });
            }
        }

        Ok(Self {
            run_id: run_id.to_string(),
            timestamp,
            scale: layout.cell_size(),
            preview_size: preview_size(layout, preview_max_dimension)?,
            artifacts,
        })
    }

    pub fn artifacts(&self) -> &[PlannedArtifact] {
        &self.artifacts
    }

    pub fn artifact(&self, key: &str) -> Option<&PlannedArtifact> {
        self.artifacts.iter().find(|a| a.key == key)
    }
}

/// Preview (width, height): the layout's aspect ratio, with the longer side
/// shrunk to `max_dimension` when it is larger.
pub fn preview_size(layout: &GridLayout, max_dimension: u32) -> Result<(u32, u32)> {
    if max_dimension == 0 {
        return Err(Error::Config("preview dimension must be positive".into()));
    }
    let small = layout.downscaled(max_dimension as usize);
    Ok((small.cols as u32, small.rows as u32))
}

/// A fresh 8 hex character run id.
pub fn new_run_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// Absolute path of an existing output directory.
pub fn output_directory(dir: &Path) -> Result<PathBuf> {
    let absolute = std::fs::canonicalize(dir)
        .map_err(|e| Error::Config(format!("output directory {}: {e}", dir.display())))?;
    if !absolute.is_dir() {
        return Err(Error::Config(format!(
            "output path {} is not a directory",
            absolute.display()
        )));
    }
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use s2composite_core::{GeoTransform, CRS};
    use std::collections::HashSet;

    fn layout(rows: usize, cols: usize) -> GridLayout {
        GridLayout::new(
            GeoTransform::new(440000.0, 4475000.0, 5.0, -5.0),
            CRS::utm(30, true).unwrap(),
            rows,
            cols,
        )
        .unwrap()
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 15, 9, 30, 5).unwrap()
    }

    #[test]
    fn eight_distinct_names() {
        let plan =
            ExportPlan::new(Path::new("/out"), &layout(10, 10), 2048, at(), "1a2b3c4d").unwrap();
        assert_eq!(plan.artifacts().len(), 8);

        let paths: HashSet<_> = plan.artifacts().iter().map(|a| &a.path).collect();
        assert_eq!(paths.len(), 8);
        let keys: Vec<_> = plan.artifacts().iter().map(|a| a.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "ndvi_tif", "ndmi_tif", "ndwi_tif", "rgb_tif", "ndvi_png", "ndmi_png", "ndwi_png",
                "rgb_png"
            ]
        );
    }

    #[test]
    fn name_format() {
        let plan =
            ExportPlan::new(Path::new("/out"), &layout(10, 10), 2048, at(), "1a2b3c4d").unwrap();
        assert_eq!(plan.timestamp, "20240615093005");
        assert_eq!(
            plan.artifact("ndvi_tif").unwrap().path,
            PathBuf::from("/out/Sentinel2_NDVI_Image_20240615093005_1a2b3c4d.tif")
        );
        assert_eq!(
            plan.artifact("rgb_png").unwrap().path,
            PathBuf::from("/out/Sentinel2_RGB_Image_20240615093005_1a2b3c4d.png")
        );
        assert_eq!(plan.scale, 5.0);
    }

    #[test]
    fn runs_in_the_same_second_do_not_collide() {
        let a =
            ExportPlan::new(Path::new("/out"), &layout(4, 4), 2048, at(), &new_run_id()).unwrap();
        let b =
            ExportPlan::new(Path::new("/out"), &layout(4, 4), 2048, at(), &new_run_id()).unwrap();
        assert_ne!(a.artifacts()[0].path, b.artifacts()[0].path);
    }

    #[test]
    fn run_ids_are_short_hex() {
        let id = new_run_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn preview_sizes() {
        assert_eq!(preview_size(&layout(300, 500), 2048).unwrap(), (500, 300));
        assert_eq!(preview_size(&layout(3000, 6000), 2048).unwrap(), (2048, 1024));
        assert_eq!(preview_size(&layout(5000, 1000), 2048).unwrap(), (410, 2048));
        assert!(preview_size(&layout(10, 10), 0).is_err());
    }

    #[test]
    fn output_directory_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let abs = output_directory(dir.path()).unwrap();
        assert!(abs.is_absolute());

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(output_directory(&file), Err(Error::Config(_))));
        assert!(output_directory(&dir.path().join("missing")).is_err());
    }
}
