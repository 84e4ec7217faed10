//! Pipeline configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use s2composite_cloud::{
    BandMapping, HttpClient, StacArchive, StacCatalog, StacClient, StacClientOptions,
};

use crate::builder::DEFAULT_MAX_STACK_CELLS;
use crate::error::{Error, Result};

/// Largest preview side the renderer accepts.
pub const PREVIEW_DIMENSION_CAP: u32 = 2048;

/// Options for a [`Pipeline`](crate::Pipeline). Missing JSON fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `earth-search`, `planetary-computer`, or a STAC API root URL
    pub catalog: String,
    pub collection: String,
    /// Asset keys per band; the catalog's defaults when absent
    pub bands: Option<BandMapping>,
    /// Working grid and GeoTIFF cell size in metres
    pub scale: f64,
    /// Longer side of the PNG previews
    pub preview_max_dimension: u32,
    pub max_concurrent_exports: usize,
    pub scene_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Cap on catalog items collected across result pages
    pub max_items: usize,
    /// Cap on working grid cells
    pub max_grid_pixels: usize,
    /// Cap on working grid cells times selected scenes
    pub max_stack_cells: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            catalog: "earth-search".into(),
            collection: "sentinel-2-l2a".into(),
            bands: None,
            scale: 5.0,
            preview_max_dimension: PREVIEW_DIMENSION_CAP,
            max_concurrent_exports: 4,
            scene_timeout_secs: 120,
            request_timeout_secs: 30,
            max_items: 100,
            max_grid_pixels: 64_000_000,
            max_stack_cells: DEFAULT_MAX_STACK_CELLS,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return fail(format!("scale must be positive, got {}", self.scale));
        }
        if self.preview_max_dimension == 0 || self.preview_max_dimension > PREVIEW_DIMENSION_CAP {
            return fail(format!(
                "preview_max_dimension must be in 1..={PREVIEW_DIMENSION_CAP}, got {}",
                self.preview_max_dimension
            ));
        }
        if self.max_concurrent_exports == 0 {
            return fail("max_concurrent_exports must be at least 1".into());
        }
        if self.scene_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return fail("timeouts must be at least 1 second".into());
        }
        if self.max_items == 0 || self.max_grid_pixels == 0 || self.max_stack_cells == 0 {
            return fail("max_items, max_grid_pixels and max_stack_cells must be positive".into());
        }
        if self.collection.trim().is_empty() {
            return fail("collection must not be empty".into());
        }
        Ok(())
    }

    pub fn stac_catalog(&self) -> StacCatalog {
        StacCatalog::from_str_or_url(&self.catalog)
    }

    pub fn band_mapping(&self) -> BandMapping {
        self.bands
            .clone()
            .unwrap_or_else(|| BandMapping::for_catalog(&self.stac_catalog()))
    }

    pub fn scene_timeout(&self) -> Duration {
        Duration::from_secs(self.scene_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stac_options(&self) -> StacClientOptions {
        StacClientOptions {
            request_timeout: self.request_timeout(),
            max_items: self.max_items,
            ..StacClientOptions::default()
        }
    }

    /// Build the network archive this configuration describes
    pub fn stac_archive(&self) -> Result<StacArchive> {
        let client = StacClient::new(self.stac_catalog(), self.stac_options())?;
        let http = HttpClient::new(self.request_timeout())?;
        Ok(StacArchive::new(client, http, self.band_mapping()))
    }
}
