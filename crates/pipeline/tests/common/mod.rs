//! In-memory scene archive for pipeline tests.

#![allow(dead_code)]

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use s2composite_cloud::{
    remove_boa_offset, ArchiveQuery, CloudError, ImageArchive, Result, SceneRef,
};
use s2composite_core::{Band, Encoding, GridLayout, Raster, SpectralImage};
use serde_json::{json, Value};

/// A synthetic acquisition: constant digital numbers per band, with the
/// QA60 cloud bit set over `cloudy_rows`. With a `boa_offset` the served
/// pixels carry that offset on top of `dn`, as baseline 04.00+ products do.
#[derive(Debug, Clone)]
pub struct FakeScene {
    pub id: String,
    pub acquired: DateTime<Utc>,
    pub cloud_cover: f64,
    /// Blue, green, red, NIR, SWIR1
    pub dn: [f64; 5],
    pub cloudy_rows: Range<usize>,
    pub missing: Option<Band>,
    pub delay: Option<Duration>,
    pub boa_offset: f64,
}

impl FakeScene {
    pub fn new(id: &str, day: u32, dn: [f64; 5]) -> Self {
        Self {
            id: id.to_string(),
            acquired: Utc.with_ymd_and_hms(2024, 1, day, 14, 30, 0).unwrap(),
            cloud_cover: 10.0,
            dn,
            cloudy_rows: 0..0,
            missing: None,
            delay: None,
            boa_offset: 0.0,
        }
    }

    pub fn cloudy_rows(mut self, rows: Range<usize>) -> Self {
        self.cloudy_rows = rows;
        self
    }

    pub fn cloud_cover(mut self, cover: f64) -> Self {
        self.cloud_cover = cover;
        self
    }

    pub fn without(mut self, band: Band) -> Self {
        self.missing = Some(band);
        self
    }

    pub fn offset(mut self, boa_offset: f64) -> Self {
        self.boa_offset = boa_offset;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn dn_for(&self, band: Band) -> f64 {
        match band {
            Band::Blue => self.dn[0],
            Band::Green => self.dn[1],
            Band::Red => self.dn[2],
            Band::Nir => self.dn[3],
            Band::Swir1 => self.dn[4],
            Band::Qa => 0.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeArchive {
    scenes: Vec<FakeScene>,
    searches: AtomicUsize,
    loads: AtomicUsize,
}

impl FakeArchive {
    pub fn new(scenes: Vec<FakeScene>) -> Self {
        Self {
            scenes,
            ..Self::default()
        }
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn scene(&self, id: &str) -> Option<&FakeScene> {
        self.scenes.iter().find(|s| s.id == id)
    }
}

impl ImageArchive for FakeArchive {
    async fn search(&self, query: &ArchiveQuery<'_>) -> Result<Vec<SceneRef>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let mut found: Vec<SceneRef> = self
            .scenes
            .iter()
            .filter(|s| query.window.contains(&s.acquired) && s.cloud_cover < query.max_cloud_cover)
            .map(|s| SceneRef {
                id: s.id.clone(),
                collection: query.collection.to_string(),
                acquired: s.acquired,
                cloud_cover: s.cloud_cover,
                epsg: None,
                boa_offset: s.boa_offset,
                assets: Default::default(),
            })
            .collect();
        found.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn load_scene(
        &self,
        scene: &SceneRef,
        bands: &[Band],
        layout: &GridLayout,
    ) -> Result<SpectralImage> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let fake = self
            .scene(&scene.id)
            .ok_or_else(|| CloudError::Catalog(format!("unknown scene {}", scene.id)))?;
        if let Some(delay) = fake.delay {
            tokio::time::sleep(delay).await;
        }

        let mut image = SpectralImage::new(&scene.id, *layout, Encoding::DigitalNumber);
        for &band in bands {
            if fake.missing == Some(band) {
                return Err(CloudError::MissingBand {
                    band: band.to_string(),
                    asset: band.name().to_lowercase(),
                    item: scene.id.clone(),
                });
            }
            let mut raster = Raster::on_layout(layout, fake.dn_for(band));
            if band.is_reflectance() {
                raster.data_mut().mapv_inplace(|v| v + fake.boa_offset);
                remove_boa_offset(&mut raster, scene.boa_offset);
            } else {
                raster.set_nodata(None);
                for row in fake.cloudy_rows.clone().filter(|&r| r < layout.rows) {
                    for col in 0..layout.cols {
                        raster.set(row, col, 1024.0)?;
                    }
                }
            }
            image.insert_band(band, raster)?;
        }
        Ok(image)
    }
}

/// Vegetated surface: NDVI 0.6, NDMI 0.2, NDWI -0.6
pub const VEGETATION: [f64; 5] = [500.0, 1000.0, 1000.0, 4000.0, 2666.666_666_666_667];

/// A small diamond near Santiago, ~700 m across.
pub fn diamond() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "plot"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-70.550, -33.447],
                    [-70.547, -33.450],
                    [-70.550, -33.453],
                    [-70.553, -33.450],
                    [-70.550, -33.447]
                ]]
            }
        }]
    })
}
