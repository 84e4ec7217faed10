//! Serde models for STAC Item Search.
//!
//! Only the parts of a Sentinel-2 item the archive reads are modelled:
//! acquisition time, `eo:cloud_cover`, the projection code, the footprint,
//! asset hrefs and the L2A radiometric offset. Everything else in
//! `properties` lands in `extra`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geo::{MultiPolygon, Rect};
use s2composite_core::Region;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CloudError, Result};

/// Digital-number offset added to L2A reflectance from processing baseline
/// 04.00 on (`BOA_ADD_OFFSET` in the product metadata)
pub const BOA_ADD_OFFSET: f64 = 1000.0;

const DN_PER_REFLECTANCE: f64 = 10_000.0;

/// `POST /search` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StacSearchParams {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,

    /// GeoJSON geometry items must intersect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<Value>,

    /// RFC 3339 instant or `start/end` interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Query extension filters, e.g. `{"eo:cloud_cover": {"lt": 80}}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Paging state some catalogs hand back in `next` links
    #[serde(flatten)]
    pub paging: Map<String, Value>,
}

impl StacSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collections(mut self, ids: &[&str]) -> Self {
        self.collections = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    /// `[west, south, east, north]` in WGS84
    pub fn bbox(mut self, west: f64, south: f64, east: f64, north: f64) -> Self {
        self.bbox = Some([west, south, east, north]);
        self
    }

    pub fn intersects(mut self, geometry: Value) -> Self {
        self.intersects = Some(geometry);
        self
    }

    pub fn datetime(mut self, interval: &str) -> Self {
        self.datetime = Some(interval.to_string());
        self
    }

    /// Keep items whose `eo:cloud_cover` is strictly below `max`.
    pub fn max_cloud_cover(mut self, max: f64) -> Self {
        self.query = Some(serde_json::json!({ "eo:cloud_cover": { "lt": max } }));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }
}

/// One page of search results.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl StacItemCollection {
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A catalog item: one Sentinel-2 granule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: BTreeMap<String, StacAsset>,
}

impl StacItem {
    pub fn asset(&self, key: &str) -> Option<&StacAsset> {
        self.assets.get(key)
    }

    /// EPSG code of the item's native grid, from `proj:epsg` or a
    /// `proj:code` of the form `EPSG:32630`.
    pub fn epsg(&self) -> Option<u32> {
        let extra = &self.properties.extra;
        if let Some(code) = extra.get("proj:epsg").and_then(Value::as_u64) {
            return u32::try_from(code).ok();
        }
        extra
            .get("proj:code")
            .and_then(Value::as_str)
            .and_then(|s| s.strip_prefix("EPSG:"))
            .and_then(|s| s.parse().ok())
    }

    pub fn acquired_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.properties.datetime.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn cloud_cover(&self) -> Option<f64> {
        self.properties.cloud_cover
    }

    /// Offset, in digital numbers, to subtract from the reflectance assets.
    ///
    /// `raster:bands` offsets on the assets take precedence. Otherwise an
    /// `earthsearch:boa_offset_applied` flag means the data is already
    /// harmonized, and an `s2:processing_baseline` of 04.00 or later means
    /// [`BOA_ADD_OFFSET`] is still in the pixels.
    pub fn boa_offset(&self) -> f64 {
        let declared = self
            .assets
            .values()
            .flat_map(|a| &a.raster_bands)
            .filter_map(RasterBand::dn_offset)
            .reduce(f64::max);
        if let Some(offset) = declared {
            return offset.max(0.0);
        }

        let extra = &self.properties.extra;
        let harmonized = extra
            .get("earthsearch:boa_offset_applied")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let baseline = extra
            .get("s2:processing_baseline")
            .and_then(Value::as_str)
            .and_then(|b| b.trim().parse::<f64>().ok());
        match baseline {
            Some(b) if b >= 4.0 && !harmonized => BOA_ADD_OFFSET,
            _ => 0.0,
        }
    }

    /// WGS84 footprint: the item geometry when it parses, else its bbox.
    pub fn footprint(&self) -> Option<MultiPolygon<f64>> {
        let from_geometry = self
            .geometry
            .clone()
            .and_then(|g| Region::from_geojson_value(g).ok())
            .map(|r| r.geometry().clone());
        if from_geometry.is_some() {
            return from_geometry;
        }
        match self.bbox.as_deref()? {
            [w, s, e, n] | [w, s, _, e, n, _] => {
                let rect = Rect::new((*w, *s), (*e, *n));
                Some(MultiPolygon::new(vec![rect.to_polygon()]))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StacItemProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(
        rename = "eo:cloud_cover",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cloud_cover: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    pub href: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(rename = "raster:bands", default, skip_serializing_if = "Vec::is_empty")]
    pub raster_bands: Vec<RasterBand>,
}

/// Raster extension band: `value = pixel * scale + offset`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RasterBand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

impl RasterBand {
    /// The offset expressed in digital numbers; `None` when none is declared
    pub fn dn_offset(&self) -> Option<f64> {
        let offset = self.offset?;
        let scale = self
            .scale
            .filter(|s| *s > 0.0)
            .unwrap_or(1.0 / DN_PER_REFLECTANCE);
        Some((-offset / scale).round())
    }
}

/// A related resource; `rel = "next"` links drive pagination.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,

    /// `GET` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Overlay `body` onto the previous request instead of replacing it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,
}

impl StacLink {
    pub fn is_post(&self) -> bool {
        self.method
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("POST"))
    }

    /// Body of the POST request this link asks for, given the request that
    /// produced the current page.
    pub fn next_request(&self, previous: &StacSearchParams) -> Result<StacSearchParams> {
        let encode = |p: &StacSearchParams| {
            serde_json::to_value(p)
                .map_err(|e| CloudError::Catalog(format!("encoding search body: {e}")))
        };
        let body = match (&self.body, self.merge.unwrap_or(false)) {
            (Some(Value::Object(overlay)), true) => {
                let mut base = encode(previous)?;
                if let Value::Object(fields) = &mut base {
                    fields.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                base
            }
            (Some(body), _) => body.clone(),
            (None, _) => encode(previous)?,
        };
        serde_json::from_value(body)
            .map_err(|e| CloudError::Catalog(format!("invalid next-page body: {e}")))
    }
}
