//! Scene selection, cloud masking and median compositing.

use std::time::Duration;

use s2composite_algorithms::imagery::{mask_clouds, Composite, MedianStack};
use s2composite_cloud::{ArchiveQuery, ImageArchive, SceneRef};
use s2composite_core::{Band, GridLayout, Region, TimeWindow};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Scenes reporting this much cloud cover (percent) or more are skipped.
pub const MAX_CLOUD_COVER: f64 = 80.0;

/// Default cap on working grid cells times selected scenes. The stack holds
/// five `f32` bands per cell and scene, so this bounds it near 2.4 GiB.
pub const DEFAULT_MAX_STACK_CELLS: usize = 128_000_000;

/// Result of [`CompositeBuilder::build`].
#[derive(Debug)]
pub enum CompositeOutcome {
    Built(Composite),
    /// No scene survived the filters
    Empty,
}

/// Builds the median composite of every usable scene over a region.
pub struct CompositeBuilder<'a, A> {
    archive: &'a A,
    collection: &'a str,
    scene_timeout: Duration,
    max_stack_cells: usize,
}

impl<'a, A: ImageArchive> CompositeBuilder<'a, A> {
    pub fn new(archive: &'a A, collection: &'a str, scene_timeout: Duration) -> Self {
        Self {
            archive,
            collection,
            scene_timeout,
            max_stack_cells: DEFAULT_MAX_STACK_CELLS,
        }
    }

    /// Refuse stacks of more than `cells` grid cells times scenes.
    pub fn with_stack_limit(mut self, cells: usize) -> Self {
        self.max_stack_cells = cells;
        self
    }

    /// Scenes intersecting `region`, acquired in `window`, below the cloud
    /// cover threshold.
    pub async fn search(&self, region: &Region, window: &TimeWindow) -> Result<Vec<SceneRef>> {
        let query = ArchiveQuery {
            collection: self.collection,
            region,
            window,
            max_cloud_cover: MAX_CLOUD_COVER,
        };
        Ok(self.archive.search(&query).await?)
    }

    /// Load, mask and reduce every matching scene onto `layout`.
    ///
    /// Scenes are loaded one at a time and folded into the median stack, so
    /// only one full scene is held at once. A stack over the cell limit is
    /// rejected before any scene is loaded.
    pub async fn build(
        &self,
        region: &Region,
        window: &TimeWindow,
        layout: &GridLayout,
    ) -> Result<CompositeOutcome> {
        let scenes = self.search(region, window).await?;
        if scenes.is_empty() {
            return Ok(CompositeOutcome::Empty);
        }
        let stack_cells = layout.len().saturating_mul(scenes.len());
        if stack_cells > self.max_stack_cells {
            return Err(Error::InvalidParameter {
                name: "region",
                value: format!("{} scenes x {} cells", scenes.len(), layout.len()),
                reason: format!(
                    "scene stack exceeds {} cells; narrow the region or the date range",
                    self.max_stack_cells
                ),
            });
        }
        info!(scenes = scenes.len(), "compositing");

        let mut stack = MedianStack::new(*layout, &Band::REFLECTANCE);
        for scene in &scenes {
            let image = mask_clouds(self.load(scene, layout).await?)?;
            debug!(
                scene = %scene.id,
                cloud_cover = scene.cloud_cover,
                valid = image.valid_count(),
                "scene masked"
            );
            stack.push(&image)?;
        }
        debug!(bytes = stack.bytes(), "scene stack filled");

        Ok(CompositeOutcome::Built(stack.finish()?))
    }

    async fn load(
        &self,
        scene: &SceneRef,
        layout: &GridLayout,
    ) -> Result<s2composite_core::SpectralImage> {
        let load = self.archive.load_scene(scene, &Band::ALL, layout);
        match tokio::time::timeout(self.scene_timeout, load).await {
            Ok(image) => Ok(image?),
            Err(_) => Err(Error::ExportTransport(format!(
                "loading scene {} timed out after {} s",
                scene.id,
                self.scene_timeout.as_secs()
            ))),
        }
    }
}
