//! Sentinel-2 scene archive: catalog search plus per-scene band loading
//! onto the working grid.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use s2composite_core::{Band, Encoding, GridLayout, Raster, Region, SpectralImage, TimeWindow};
use tracing::{debug, info};

use crate::cog_reader::{CogReader, CogReaderOptions};
use crate::error::{CloudError, Result};
use crate::http::HttpClient;
use crate::resample::resample_nearest;
use crate::stac_client::{StacCatalog, StacClient};
use crate::stac_models::{StacItem, StacSearchParams};
use crate::tile_index::BBox;

/// What to search for.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveQuery<'a> {
    pub collection: &'a str,
    pub region: &'a Region,
    pub window: &'a TimeWindow,
    /// Scenes must report cloud cover strictly below this percentage
    pub max_cloud_cover: f64,
}

/// A scene selected from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneRef {
    pub id: String,
    pub collection: String,
    pub acquired: DateTime<Utc>,
    pub cloud_cover: f64,
    pub epsg: Option<u32>,
    /// Digital numbers to subtract from the reflectance bands
    pub boa_offset: f64,
    /// Asset key to href
    pub assets: BTreeMap<String, String>,
}

impl SceneRef {
    fn from_item(
        item: &StacItem,
        acquired: DateTime<Utc>,
        cloud_cover: f64,
        collection: &str,
    ) -> Self {
        Self {
            id: item.id.clone(),
            collection: item.collection.clone().unwrap_or_else(|| collection.to_string()),
            acquired,
            cloud_cover,
            epsg: item.epsg(),
            boa_offset: item.boa_offset(),
            assets: item
                .assets
                .iter()
                .map(|(k, a)| (k.clone(), a.href.clone()))
                .collect(),
        }
    }
}

/// How the quality band encodes clouds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaKind {
    /// Bitmask with bit 10 opaque cloud, bit 11 cirrus
    Qa60,
    /// L2A scene classification layer, translated to the QA60 bits on load
    Scl,
}

/// Translate an SCL class into the equivalent QA60 value.
///
/// Cloud medium/high probability (8, 9) set the cloud bit, thin cirrus (10)
/// sets the cirrus bit, no-data (0) becomes NaN.
pub fn scl_to_qa60(class: f64) -> f64 {
    if class.is_nan() {
        return f64::NAN;
    }
    match class as i64 {
        0 => f64::NAN,
        8 | 9 => 1024.0,
        10 => 2048.0,
        _ => 0.0,
    }
}

/// Remove the L2A radiometric `offset` from a band of digital numbers.
///
/// No-data cells become NaN first. Values below the offset clamp to 0, so
/// reflectance stays non-negative.
pub fn remove_boa_offset(raster: &mut Raster<f64>, offset: f64) {
    if offset == 0.0 {
        return;
    }
    let nodata = raster.nodata();
    raster.data_mut().mapv_inplace(|v| {
        if v.is_nan() || nodata.is_some_and(|nd| v == nd) {
            f64::NAN
        } else {
            (v - offset).max(0.0)
        }
    });
    raster.set_nodata(Some(f64::NAN));
}

/// Catalog asset keys for each band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandMapping {
    pub blue: String,
    pub green: String,
    pub red: String,
    pub nir: String,
    pub swir1: String,
    pub qa: String,
    pub qa_kind: QaKind,
}

impl BandMapping {
    /// Earth Search `sentinel-2-l2a` asset keys
    pub fn earth_search() -> Self {
        Self {
            blue: "blue".into(),
            green: "green".into(),
            red: "red".into(),
            nir: "nir".into(),
            swir1: "swir16".into(),
            qa: "scl".into(),
            qa_kind: QaKind::Scl,
        }
    }

    /// Planetary Computer `sentinel-2-l2a` asset keys
    pub fn planetary_computer() -> Self {
        Self {
            blue: "B02".into(),
            green: "B03".into(),
            red: "B04".into(),
            nir: "B08".into(),
            swir1: "B11".into(),
            qa: "SCL".into(),
            qa_kind: QaKind::Scl,
        }
    }

    pub fn for_catalog(catalog: &StacCatalog) -> Self {
        match catalog {
            StacCatalog::PlanetaryComputer => Self::planetary_computer(),
            StacCatalog::EarthSearch | StacCatalog::Custom(_) => Self::earth_search(),
        }
    }

    pub fn asset_for(&self, band: Band) -> &str {
        match band {
            Band::Blue => &self.blue,
            Band::Green => &self.green,
            Band::Red => &self.red,
            Band::Nir => &self.nir,
            Band::Swir1 => &self.swir1,
            Band::Qa => &self.qa,
        }
    }
}

impl Default for BandMapping {
    fn default() -> Self {
        Self::earth_search()
    }
}

/// Source of Sentinel-2 scenes.
pub trait ImageArchive: Send + Sync {
    /// Scenes matching `query`, oldest first.
    fn search(
        &self,
        query: &ArchiveQuery<'_>,
    ) -> impl Future<Output = Result<Vec<SceneRef>>> + Send;

    /// Load `bands` of `scene` resampled onto `layout`, as digital numbers
    /// of reflectance × 10000 with the scene's offset removed.
    fn load_scene(
        &self,
        scene: &SceneRef,
        bands: &[Band],
        layout: &GridLayout,
    ) -> impl Future<Output = Result<SpectralImage>> + Send;
}

/// Apply the client-side acquisition filters and order by acquisition time.
///
/// Items need an acquisition time inside the half-open window, a reported
/// cloud cover below the threshold, and a footprint touching the region.
pub fn select_scenes(items: &[StacItem], query: &ArchiveQuery<'_>) -> Vec<SceneRef> {
    let mut scenes: Vec<SceneRef> = items
        .iter()
        .filter_map(|item| {
            let acquired = item.acquired_at().filter(|t| query.window.contains(t))?;
            let cloud_cover = item.cloud_cover().filter(|&c| c < query.max_cloud_cover)?;
            let footprint = item.footprint()?;
            if !query.region.intersects(&footprint) {
                return None;
            }
            Some(SceneRef::from_item(item, acquired, cloud_cover, query.collection))
        })
        .collect();
    scenes.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));
    scenes
}

/// STAC catalog plus COG reads.
pub struct StacArchive {
    client: StacClient,
    http: HttpClient,
    bands: BandMapping,
    cog_options: CogReaderOptions,
}

impl StacArchive {
    pub fn new(client: StacClient, http: HttpClient, bands: BandMapping) -> Self {
        Self {
            client,
            http,
            bands,
            cog_options: CogReaderOptions::default(),
        }
    }

    pub fn with_cog_options(mut self, options: CogReaderOptions) -> Self {
        self.cog_options = options;
        self
    }

    pub fn catalog(&self) -> &StacCatalog {
        self.client.catalog()
    }

    pub fn bands(&self) -> &BandMapping {
        &self.bands
    }

    async fn load_band(
        &self,
        scene: &SceneRef,
        band: Band,
        layout: &GridLayout,
    ) -> Result<Raster<f64>> {
        let asset = self.bands.asset_for(band);
        let href = scene.assets.get(asset).ok_or_else(|| CloudError::MissingBand {
            band: band.name().to_string(),
            asset: asset.to_string(),
            item: scene.id.clone(),
        })?;
        let href = self.client.sign_asset_href(href).await?;

        let reader = CogReader::open(&href, self.http.clone(), self.cog_options.clone()).await?;
        let bbox = BBox::from_bounds(layout.bounds_in(&reader.metadata().crs)?);

        let mut raster = match reader.read_window(&bbox).await? {
            Some(window) => {
                let target = *layout;
                tokio::task::spawn_blocking(move || resample_nearest(&window, &target))
                    .await
                    .map_err(|e| {
                        CloudError::Core(s2composite_core::Error::Other(format!(
                            "resampling task failed: {e}"
                        )))
                    })??
            }
            None => Raster::on_layout(layout, f64::NAN),
        };

        if band == Band::Qa {
            if self.bands.qa_kind == QaKind::Scl {
                raster.data_mut().mapv_inplace(scl_to_qa60);
            }
            // QA values of 0 mean clear sky, never no-data
            raster.set_nodata(None);
        } else {
            remove_boa_offset(&mut raster, scene.boa_offset);
        }
        debug!(scene = %scene.id, band = %band, "band loaded");
        Ok(raster)
    }
}

impl ImageArchive for StacArchive {
    async fn search(&self, query: &ArchiveQuery<'_>) -> Result<Vec<SceneRef>> {
        if query.window.is_empty() {
            return Ok(Vec::new());
        }
        let params = StacSearchParams::new()
            .collections(&[query.collection])
            .intersects(query.region.to_geojson())
            .datetime(&query.window.to_interval())
            .max_cloud_cover(query.max_cloud_cover);

        let items = self.client.search_all(&params).await?;
        let scenes = select_scenes(&items, query);
        info!(
            matched = items.len(),
            selected = scenes.len(),
            window = %query.window,
            "catalog search"
        );
        Ok(scenes)
    }

    async fn load_scene(
        &self,
        scene: &SceneRef,
        bands: &[Band],
        layout: &GridLayout,
    ) -> Result<SpectralImage> {
        let rasters = try_join_all(bands.iter().map(|&b| self.load_band(scene, b, layout))).await?;
        let mut image = SpectralImage::new(scene.id.clone(), *layout, Encoding::DigitalNumber);
        for (&band, raster) in bands.iter().zip(rasters) {
            image.insert_band(band, raster)?;
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stac_models::StacItemCollection;
    use chrono::NaiveDate;
    use serde_json::json;

    fn item(id: &str, datetime: &str, cloud: Option<f64>, lon: f64) -> serde_json::Value {
        let mut props = json!({ "datetime": datetime });
        if let Some(c) = cloud {
            props["eo:cloud_cover"] = json!(c);
        }
        json!({
            "type": "Feature",
            "id": id,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[lon, 40.0], [lon + 1.0, 40.0], [lon + 1.0, 41.0], [lon, 41.0], [lon, 40.0]]]
            },
            "properties": props,
            "assets": { "red": { "href": format!("https://example.com/{id}/B04.tif") } }
        })
    }

    fn items(features: Vec<serde_json::Value>) -> Vec<StacItem> {
        let col: StacItemCollection =
            serde_json::from_value(json!({ "type": "FeatureCollection", "features": features }))
                .unwrap();
        col.features
    }

    fn region() -> Region {
        Region::from_geojson_value(json!({
            "type": "Polygon",
            "coordinates": [[[-3.8, 40.3], [-3.6, 40.3], [-3.6, 40.5], [-3.8, 40.5], [-3.8, 40.3]]]
        }))
        .unwrap()
    }

    fn window(start: (i32, u32, u32), end: (i32, u32, u32)) -> TimeWindow {
        TimeWindow::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn filters_and_orders_scenes() {
        let region = region();
        let window = window((2024, 6, 1), (2024, 7, 1));
        let query = ArchiveQuery {
            collection: "sentinel-2-l2a",
            region: &region,
            window: &window,
            max_cloud_cover: 80.0,
        };
        let found = items(vec![
            item("late", "2024-06-20T10:56:21Z", Some(10.0), -4.0),
            item("early", "2024-06-05T10:56:21Z", Some(79.9), -4.0),
            item("cloudy", "2024-06-10T10:56:21Z", Some(80.0), -4.0),
            item("unknown-cover", "2024-06-11T10:56:21Z", None, -4.0),
            item("elsewhere", "2024-06-12T10:56:21Z", Some(1.0), 10.0),
            item("on-end", "2024-07-01T00:00:00Z", Some(1.0), -4.0),
            item("on-start", "2024-06-01T00:00:00Z", Some(1.0), -4.0),
        ]);

        let scenes = select_scenes(&found, &query);
        let ids: Vec<&str> = scenes.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["on-start", "early", "late"]);
        assert_eq!(scenes[0].collection, "sentinel-2-l2a");
        assert_eq!(
            scenes[1].assets.get("red").map(String::as_str),
            Some("https://example.com/early/B04.tif")
        );
    }

    #[test]
    fn empty_window_selects_nothing() {
        let region = region();
        let window = window((2024, 6, 1), (2024, 6, 1));
        let query = ArchiveQuery {
            collection: "sentinel-2-l2a",
            region: &region,
            window: &window,
            max_cloud_cover: 80.0,
        };
        let found = items(vec![item("a", "2024-06-01T00:00:00Z", Some(1.0), -4.0)]);
        assert!(select_scenes(&found, &query).is_empty());
    }

    #[test]
    fn baseline_05_scene_carries_offset() {
        let region = region();
        let window = window((2024, 6, 1), (2024, 7, 1));
        let query = ArchiveQuery {
            collection: "sentinel-2-l2a",
            region: &region,
            window: &window,
            max_cloud_cover: 80.0,
        };
        let mut current = item("current", "2024-06-05T10:56:21Z", Some(5.0), -4.0);
        current["properties"]["s2:processing_baseline"] = json!("05.00");
        let mut legacy = item("legacy", "2024-06-06T10:56:21Z", Some(5.0), -4.0);
        legacy["properties"]["s2:processing_baseline"] = json!("03.01");

        let scenes = select_scenes(&items(vec![current, legacy]), &query);
        assert_eq!(scenes[0].boa_offset, 1000.0);
        assert_eq!(scenes[1].boa_offset, 0.0);
    }

    #[test]
    fn offset_removed_from_digital_numbers() {
        let mut red = Raster::from_vec(vec![1500.0, 4000.0, 0.0, 800.0], 2, 2).unwrap();
        red.set_nodata(Some(0.0));
        remove_boa_offset(&mut red, 1000.0);
        assert_eq!(red.get(0, 0).unwrap(), 500.0);
        assert_eq!(red.get(0, 1).unwrap(), 3000.0);
        assert!(red.get(1, 0).unwrap().is_nan());
        // Darker than the offset: clamped, still valid
        assert_eq!(red.get(1, 1).unwrap(), 0.0);
        assert_eq!(red.valid_count(), 3);

        let mut untouched = Raster::from_vec(vec![1500.0], 1, 1).unwrap();
        remove_boa_offset(&mut untouched, 0.0);
        assert_eq!(untouched.get(0, 0).unwrap(), 1500.0);
    }

    #[test]
    fn scl_translation() {
        assert_eq!(scl_to_qa60(4.0), 0.0);
        assert_eq!(scl_to_qa60(8.0), 1024.0);
        assert_eq!(scl_to_qa60(9.0), 1024.0);
        assert_eq!(scl_to_qa60(10.0), 2048.0);
        assert!(scl_to_qa60(0.0).is_nan());
        assert!(scl_to_qa60(f64::NAN).is_nan());
    }

    #[test]
    fn band_mappings() {
        let es = BandMapping::for_catalog(&StacCatalog::EarthSearch);
        assert_eq!(es.asset_for(Band::Swir1), "swir16");
        assert_eq!(es.asset_for(Band::Qa), "scl");

        let pc = BandMapping::for_catalog(&StacCatalog::PlanetaryComputer);
        assert_eq!(pc.asset_for(Band::Nir), "B08");
        assert_eq!(pc.qa_kind, QaKind::Scl);

        let parsed: BandMapping = serde_json::from_value(json!({
            "blue": "B2", "green": "B3", "red": "B4", "nir": "B8", "swir1": "B11",
            "qa": "QA60", "qa_kind": "qa60"
        }))
        .unwrap();
        assert_eq!(parsed.qa_kind, QaKind::Qa60);
    }
}
