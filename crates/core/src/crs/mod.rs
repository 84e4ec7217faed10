//! Coordinate Reference System handling
//!
//! The pipeline only ever works in two families of reference systems:
//! WGS84 geographic coordinates (regions, STAC footprints) and WGS84 / UTM
//! projections (Sentinel-2 tiles and the working grid). Both are identified
//! by EPSG code.

mod utm;

pub use utm::{utm_to_wgs84, utm_zone_for, wgs84_to_utm};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG code of WGS84 geographic coordinates.
pub const WGS84_EPSG: u32 = 4326;

/// Coordinate Reference System identified by EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(WGS84_EPSG)
    }

    /// WGS84 / UTM zone `zone` in the given hemisphere (EPSG 326xx / 327xx)
    pub fn utm(zone: u32, north: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(Error::InvalidParameter {
                name: "zone",
                value: zone.to_string(),
                reason: "UTM zones run from 1 to 60".into(),
            });
        }
        let base = if north { 32600 } else { 32700 };
        Ok(Self::from_epsg(base + zone))
    }

    /// UTM projection whose zone contains the given WGS84 point
    pub fn utm_for_lon_lat(lon: f64, lat: f64) -> Result<Self> {
        let zone = utm_zone_for(lon);
        Self::utm(zone, lat >= 0.0)
    }

    /// EPSG code
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    pub fn is_wgs84(&self) -> bool {
        self.epsg == WGS84_EPSG
    }

    /// Parse into UTM zone info: `Some((zone, is_north))`.
    ///
    /// - EPSG 326xx → zone xx, North hemisphere
    /// - EPSG 327xx → zone xx, South hemisphere
    pub fn utm_zone(&self) -> Option<(u32, bool)> {
        match self.epsg {
            32601..=32660 => Some((self.epsg - 32600, true)),
            32701..=32760 => Some((self.epsg - 32700, false)),
            _ => None,
        }
    }

    /// Whether coordinates in this CRS are metres on a projected plane
    pub fn is_projected(&self) -> bool {
        self.utm_zone().is_some()
    }

    /// Whether points can be converted to and from this CRS
    pub fn is_supported(&self) -> bool {
        self.is_wgs84() || self.is_projected()
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }

    /// Transform a point from `self` into `target`.
    pub fn transform_point(&self, target: &CRS, x: f64, y: f64) -> Result<(f64, f64)> {
        if self == target {
            return Ok((x, y));
        }
        let (lon, lat) = self.to_wgs84(x, y)?;
        target.from_wgs84(lon, lat)
    }

    fn to_wgs84(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.is_wgs84() {
            return Ok((x, y));
        }
        match self.utm_zone() {
            Some((zone, north)) => Ok(utm_to_wgs84(x, y, zone, north)),
            None => Err(Error::UnsupportedCrs(self.identifier())),
        }
    }

    fn from_wgs84(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        if self.is_wgs84() {
            return Ok((lon, lat));
        }
        match self.utm_zone() {
            Some((zone, north)) => Ok(wgs84_to_utm(lon, lat, zone, north)),
            None => Err(Error::UnsupportedCrs(self.identifier())),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), 4326);
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_wgs84());
    }

    #[test]
    fn test_utm_zone_parsing() {
        assert_eq!(CRS::from_epsg(32630).utm_zone(), Some((30, true)));
        assert_eq!(CRS::from_epsg(32721).utm_zone(), Some((21, false)));
        assert_eq!(CRS::from_epsg(32600).utm_zone(), None);
        assert_eq!(CRS::from_epsg(32661).utm_zone(), None);
        assert_eq!(CRS::from_epsg(3857).utm_zone(), None);
    }

    #[test]
    fn test_utm_constructor_rejects_bad_zone() {
        assert!(CRS::utm(0, true).is_err());
        assert!(CRS::utm(61, false).is_err());
        assert_eq!(CRS::utm(33, false).unwrap().epsg(), 32733);
    }

    #[test]
    fn test_utm_for_lon_lat() {
        assert_eq!(CRS::utm_for_lon_lat(-3.7, 40.4).unwrap().epsg(), 32630);
        assert_eq!(CRS::utm_for_lon_lat(-58.4, -34.6).unwrap().epsg(), 32721);
    }

    #[test]
    fn test_transform_between_adjacent_zones() {
        let z30 = CRS::from_epsg(32630);
        let z31 = CRS::from_epsg(32631);
        let (e, n) = CRS::wgs84().transform_point(&z30, 0.5, 41.0).unwrap();
        let (e31, n31) = z30.transform_point(&z31, e, n).unwrap();
        let (lon, lat) = z31.transform_point(&CRS::wgs84(), e31, n31).unwrap();
        assert_relative_eq!(lon, 0.5, epsilon = 1e-7);
        assert_relative_eq!(lat, 41.0, epsilon = 1e-7);
    }

    #[test]
    fn test_unsupported_transform() {
        let mercator = CRS::from_epsg(3857);
        assert!(mercator.transform_point(&CRS::wgs84(), 0.0, 0.0).is_err());
        assert!(!mercator.is_supported());
    }
}
