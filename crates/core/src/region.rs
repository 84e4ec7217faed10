//! Area of interest loaded from a GeoJSON boundary document.
//!
//! Accepts a `FeatureCollection`, a single `Feature`, or a bare `Polygon` /
//! `MultiPolygon` geometry in WGS84 longitude/latitude. All polygonal parts
//! are merged into one multipolygon; point and line geometries are ignored.
//! The attribute keys in [`STRIPPED_PROPERTIES`] are removed from every
//! feature.

use crate::crs::CRS;
use crate::error::{Error, Result};
use geo::{BoundingRect, Coord, Intersects, LineString, MapCoords, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Attribute keys dropped from every region feature.
pub const STRIPPED_PROPERTIES: [&str; 2] = ["system:index", "fid"];

// ── GeoJSON document model ───────────────────────────────────────────────

type Position = Vec<f64>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Document {
    FeatureCollection { features: Vec<FeatureDoc> },
    Feature(FeatureDoc),
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

#[derive(Debug, Deserialize)]
struct FeatureDoc {
    geometry: Option<GeometryDoc>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeometryDoc {
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<GeometryDoc> },
    #[serde(other)]
    Unsupported,
}

impl GeometryDoc {
    fn collect_polygons(&self, out: &mut Vec<Polygon<f64>>) -> Result<()> {
        match self {
            GeometryDoc::Polygon { coordinates } => out.push(to_polygon(coordinates)?),
            GeometryDoc::MultiPolygon { coordinates } => {
                for rings in coordinates {
                    out.push(to_polygon(rings)?);
                }
            }
            GeometryDoc::GeometryCollection { geometries } => {
                for g in geometries {
                    g.collect_polygons(out)?;
                }
            }
            GeometryDoc::Unsupported => {}
        }
        Ok(())
    }
}

fn to_coord(position: &[f64]) -> Result<Coord<f64>> {
    let [lon, lat, ..] = position else {
        return Err(Error::InvalidGeometry(format!(
            "position needs at least 2 values, got {}",
            position.len()
        )));
    };
    if !lon.is_finite() || !lat.is_finite() {
        return Err(Error::InvalidGeometry("non-finite coordinate".into()));
    }
    if !(-180.0..=180.0).contains(lon) || !(-90.0..=90.0).contains(lat) {
        return Err(Error::InvalidGeometry(format!(
            "coordinate ({lon}, {lat}) outside WGS84 range"
        )));
    }
    Ok(Coord { x: *lon, y: *lat })
}

fn to_ring(positions: &[Position]) -> Result<LineString<f64>> {
    if positions.len() < 4 {
        return Err(Error::InvalidGeometry(format!(
            "linear ring needs at least 4 positions, got {}",
            positions.len()
        )));
    }
    let coords = positions
        .iter()
        .map(|p| to_coord(p))
        .collect::<Result<Vec<_>>>()?;
    if coords.first() != coords.last() {
        return Err(Error::InvalidGeometry(
            "linear ring is not closed: first and last positions differ".into(),
        ));
    }
    Ok(LineString::new(coords))
}

fn to_polygon(rings: &[Vec<Position>]) -> Result<Polygon<f64>> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Err(Error::InvalidGeometry("polygon without rings".into()));
    };
    let exterior = to_ring(exterior)?;
    let interiors = interiors
        .iter()
        .map(|r| to_ring(r))
        .collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

// ── Region ───────────────────────────────────────────────────────────────

/// One input feature: its polygons and remaining attributes
#[derive(Debug, Clone)]
pub struct RegionFeature {
    pub geometry: MultiPolygon<f64>,
    pub properties: Map<String, Value>,
}

/// The area of interest, in WGS84.
#[derive(Debug, Clone)]
pub struct Region {
    geometry: MultiPolygon<f64>,
    features: Vec<RegionFeature>,
}

impl Region {
    /// Parse a GeoJSON document from a string
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::InvalidGeometry(format!("not valid JSON: {e}")))?;
        Self::from_geojson_value(value)
    }

    /// Read and parse a GeoJSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_geojson_str(&text)
    }

    /// Build a region from an already parsed GeoJSON value
    pub fn from_geojson_value(value: Value) -> Result<Self> {
        let document: Document = serde_json::from_value(value)
            .map_err(|e| Error::InvalidGeometry(format!("unrecognized GeoJSON: {e}")))?;

        let docs = match document {
            Document::FeatureCollection { features } => features,
            Document::Feature(feature) => vec![feature],
            Document::Polygon { coordinates } => vec![FeatureDoc {
                geometry: Some(GeometryDoc::Polygon { coordinates }),
                properties: None,
            }],
            Document::MultiPolygon { coordinates } => vec![FeatureDoc {
                geometry: Some(GeometryDoc::MultiPolygon { coordinates }),
                properties: None,
            }],
        };
        if docs.is_empty() {
            return Err(Error::InvalidGeometry("feature collection is empty".into()));
        }

        let mut features = Vec::with_capacity(docs.len());
        let mut all = Vec::new();
        for doc in docs {
            let mut polygons = Vec::new();
            if let Some(geometry) = &doc.geometry {
                geometry.collect_polygons(&mut polygons)?;
            }
            let mut properties = doc.properties.unwrap_or_default();
            for key in STRIPPED_PROPERTIES {
                properties.remove(key);
            }
            all.extend(polygons.iter().cloned());
            features.push(RegionFeature {
                geometry: MultiPolygon::new(polygons),
                properties,
            });
        }
        if all.is_empty() {
            return Err(Error::InvalidGeometry(
                "boundary contains no polygon geometry".into(),
            ));
        }

        Ok(Self {
            geometry: MultiPolygon::new(all),
            features,
        })
    }

    /// Union of all feature polygons, as a multipolygon
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn features(&self) -> &[RegionFeature] {
        &self.features
    }

    /// Always WGS84
    pub fn crs(&self) -> CRS {
        CRS::wgs84()
    }

    /// Bounding box (min_lon, min_lat, max_lon, max_lat)
    pub fn bbox(&self) -> Result<(f64, f64, f64, f64)> {
        let rect = self
            .geometry
            .bounding_rect()
            .ok_or_else(|| Error::InvalidGeometry("region has no extent".into()))?;
        Ok((rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Center of the bounding box
    pub fn center(&self) -> Result<(f64, f64)> {
        let (a, b, c, d) = self.bbox()?;
        Ok(((a + c) / 2.0, (b + d) / 2.0))
    }

    /// Region polygons projected into `crs`
    pub fn projected(&self, crs: &CRS) -> Result<MultiPolygon<f64>> {
        let source = self.crs();
        self.geometry.try_map_coords(|c| {
            let (x, y) = source.transform_point(crs, c.x, c.y)?;
            Ok::<_, Error>(Coord { x, y })
        })
    }

    /// Whether a WGS84 footprint touches the region
    pub fn intersects<G>(&self, footprint: &G) -> bool
    where
        MultiPolygon<f64>: Intersects<G>,
    {
        self.geometry.intersects(footprint)
    }

    /// The region geometry as a GeoJSON `MultiPolygon` value
    pub fn to_geojson(&self) -> Value {
        let ring = |ls: &LineString<f64>| -> Value {
            Value::Array(
                ls.coords()
                    .map(|c| serde_json::json!([c.x, c.y]))
                    .collect(),
            )
        };
        let polygons: Vec<Value> = self
            .geometry
            .iter()
            .map(|p| {
                let mut rings = vec![ring(p.exterior())];
                rings.extend(p.interiors().iter().map(ring));
                Value::Array(rings)
            })
            .collect();
        serde_json::json!({ "type": "MultiPolygon", "coordinates": polygons })
    }
}
