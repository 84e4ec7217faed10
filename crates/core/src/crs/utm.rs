//! WGS84 ↔ UTM conversion (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64).

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// UTM zone number (1..=60) containing longitude `lon_deg`.
pub fn utm_zone_for(lon_deg: f64) -> u32 {
    let zone = ((lon_deg + 180.0) / 6.0).floor() as i64 + 1;
    zone.clamp(1, 60) as u32
}

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Convert WGS84 (longitude, latitude) in degrees to UTM (easting, northing)
/// in metres for the given zone and hemisphere.
pub fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = central_meridian(zone);

    let (sin_lat, cos_lat) = lat.sin_cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - lon0);
    let m = meridional_arc(lat);

    let a2 = a * a;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let mut northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));
    if !north {
        northing += FALSE_NORTHING_SOUTH;
    }

    (easting, northing)
}

/// Convert UTM (easting, northing) in metres back to WGS84 (longitude,
/// latitude) in degrees.
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    // Footpoint latitude, Snyder eq. 3-26 and 3-24
    let sqrt_1e2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1e2) / (1.0 + sqrt_1e2);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let (sin_phi1, cos_phi1) = phi1.sin_cos();
    let tan_phi1 = phi1.tan();
    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let denom = 1.0 - E2 * sin_phi1 * sin_phi1;
    let n1 = A / denom.sqrt();
    let r1 = A * (1.0 - E2) / denom.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    // Snyder eq. 8-17 and 8-18
    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);
    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians), Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    // pyproj: Transformer.from_crs(4326, 32630, always_xy=True)
    //   .transform(-3.7037, 40.4168) → (440298.94, 4474257.31)
    #[test]
    fn madrid_to_utm30n() {
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    // pyproj: Transformer.from_crs(4326, 32721, always_xy=True)
    //   .transform(-58.3816, -34.6037) → (373317.50, 6170036.17)
    #[test]
    fn buenos_aires_to_utm21s() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, 21, false);
        assert_close(e, 373_317.50, 1.0, "easting");
        assert_close(n, 6_170_036.17, 1.0, "northing");
    }

    #[test]
    fn inverse_recovers_madrid() {
        let (lon, lat) = utm_to_wgs84(440_298.94, 4_474_257.31, 30, true);
        assert_close(lon, -3.7037, 1e-5, "longitude");
        assert_close(lat, 40.4168, 1e-5, "latitude");
    }

    #[test]
    fn inverse_recovers_buenos_aires() {
        let (lon, lat) = utm_to_wgs84(373_317.50, 6_170_036.17, 21, false);
        assert_close(lon, -58.3816, 1e-5, "longitude");
        assert_close(lat, -34.6037, 1e-5, "latitude");
    }

    #[test]
    fn equator_central_meridian() {
        let (e, n) = wgs84_to_utm(-3.0, 0.0, 30, true);
        assert_close(e, 500_000.0, 0.01, "easting at CM");
        assert_close(n, 0.0, 0.01, "northing at equator");
        let (lon, lat) = utm_to_wgs84(500_000.0, 0.0, 30, true);
        assert_close(lon, -3.0, 1e-9, "lon at CM");
        assert_close(lat, 0.0, 1e-9, "lat at equator");
    }

    #[test]
    fn zone_lookup() {
        assert_eq!(utm_zone_for(-180.0), 1);
        assert_eq!(utm_zone_for(-3.7), 30);
        assert_eq!(utm_zone_for(0.0), 31);
        assert_eq!(utm_zone_for(179.99), 60);
        assert_eq!(utm_zone_for(180.0), 60);
    }
}
