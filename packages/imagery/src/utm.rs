//! WGS84 to UTM projection.
//!
//! Forward transverse Mercator using the Krüger series to third order, which
//! is accurate to well under a millimeter inside a zone. Only the forward
//! direction is needed: raster sizing measures ground extents and never maps
//! back.

#![allow(clippy::many_single_char_names)]

/// WGS84 semi-major axis in meters.
const A: f64 = 6_378_137.0;
/// WGS84 flattening.
const F: f64 = 1.0 / 298.257_223_563;
/// UTM central meridian scale factor.
const K0: f64 = 0.9996;
/// False easting in meters.
const FALSE_EASTING: f64 = 500_000.0;
/// False northing for southern hemisphere zones, in meters.
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A UTM zone (1-60) and hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    /// Zone number, 1-60.
    pub zone: u8,
    /// `true` for the northern hemisphere.
    pub north: bool,
}

impl UtmZone {
    /// The zone containing the given point.
    ///
    /// Zones are 6° longitude bands, widened over southwest Norway (zone 32
    /// covers 3°E to 12°E between 56°N and 64°N) and over Svalbard (zones 31,
    /// 33, 35 and 37 between 72°N and 84°N).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_point(lon: f64, lat: f64) -> Self {
        let zone = exception_zone(lon, lat).unwrap_or_else(|| {
            let band = ((lon + 180.0) / 6.0).floor().rem_euclid(60.0) as u8;
            band + 1
        });

        Self {
            zone,
            north: lat >= 0.0,
        }
    }

    /// Longitude of the zone's central meridian, in degrees.
    #[must_use]
    pub fn central_meridian(self) -> f64 {
        f64::from(self.zone) * 6.0 - 183.0
    }

    /// EPSG code of the zone (`326xx` north, `327xx` south).
    #[must_use]
    pub fn epsg(self) -> u32 {
        (if self.north { 32_600 } else { 32_700 }) + u32::from(self.zone)
    }
}

fn exception_zone(lon: f64, lat: f64) -> Option<u8> {
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return Some(32);
    }

    if (72.0..=84.0).contains(&lat) && lon >= 0.0 {
        return match lon {
            x if x < 9.0 => Some(31),
            x if x < 21.0 => Some(33),
            x if x < 33.0 => Some(35),
            x if x < 42.0 => Some(37),
            _ => None,
        };
    }

    None
}

/// A projected UTM coordinate in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Utm {
    /// Meters east, including the false easting.
    pub easting: f64,
    /// Meters north, including the false northing in the south.
    pub northing: f64,
}

/// Projects a WGS84 point into the given zone.
#[must_use]
pub fn project(lon: f64, lat: f64, zone: UtmZone) -> Utm {
    let n = F / (2.0 - F);
    let n2 = n * n;
    let n3 = n2 * n;
    // Rectifying radius.
    let rect_a = A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);
    let alpha = [
        n / 2.0 - 2.0 / 3.0 * n2 + 5.0 / 16.0 * n3,
        13.0 / 48.0 * n2 - 3.0 / 5.0 * n3,
        61.0 / 240.0 * n3,
    ];
    let e = 2.0 * n.sqrt() / (1.0 + n);

    let phi = lat.to_radians();
    let dlambda = (lon - zone.central_meridian()).to_radians();

    let sin_phi = phi.sin();
    let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();
    let xi = (t / dlambda.cos()).atan();
    let eta = (dlambda.sin() / t.mul_add(t, 1.0).sqrt()).atanh();

    let mut xi_sum = xi;
    let mut eta_sum = eta;
    for (j, a) in (1..=3_i32).zip(alpha) {
        let k = f64::from(2 * j);
        xi_sum += a * (k * xi).sin() * (k * eta).cosh();
        eta_sum += a * (k * xi).cos() * (k * eta).sinh();
    }

    let false_northing = if zone.north { 0.0 } else { FALSE_NORTHING_SOUTH };

    Utm {
        easting: K0.mul_add(rect_a * eta_sum, FALSE_EASTING),
        northing: K0.mul_add(rect_a * xi_sum, false_northing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_selection() {
        assert_eq!(UtmZone::for_point(-82.5, 27.8).zone, 17);
        assert_eq!(UtmZone::for_point(-180.0, 0.0).zone, 1);
        assert_eq!(UtmZone::for_point(179.9, 0.0).zone, 60);
        assert_eq!(UtmZone::for_point(180.0, 0.0).zone, 1);
        assert_eq!(UtmZone::for_point(3.0, -10.0).epsg(), 32_731);
        assert_eq!(UtmZone::for_point(3.0, 10.0).epsg(), 32_631);
    }

    #[test]
    fn norway_and_svalbard_use_widened_zones() {
        // Bergen sits in the 31 band but belongs to 32.
        assert_eq!(UtmZone::for_point(5.32, 60.39).zone, 32);
        assert_eq!(UtmZone::for_point(2.9, 60.0).zone, 31);
        assert_eq!(UtmZone::for_point(5.0, 64.0).zone, 31);

        assert_eq!(UtmZone::for_point(8.0, 78.0).zone, 31);
        assert_eq!(UtmZone::for_point(10.0, 78.0).zone, 33);
        assert_eq!(UtmZone::for_point(30.0, 80.0).zone, 35);
        assert_eq!(UtmZone::for_point(36.0, 84.0).zone, 37);
        assert_eq!(UtmZone::for_point(45.0, 80.0).zone, 38);
        assert_eq!(UtmZone::for_point(10.0, 71.9).zone, 32);
    }

    #[test]
    fn central_meridian_projects_to_false_easting() {
        let zone = UtmZone::for_point(-81.0, 27.0);
        assert!((zone.central_meridian() - -81.0).abs() < 1e-12);
        let utm = project(-81.0, 0.0, zone);
        assert!((utm.easting - 500_000.0).abs() < 1e-6, "{utm:?}");
        assert!(utm.northing.abs() < 1e-6, "{utm:?}");
    }

    #[test]
    fn known_point_matches_reference_projection() {
        // Tampa International Airport in EPSG:32617.
        let zone = UtmZone::for_point(-82.533, 27.9755);
        let utm = project(-82.533, 27.9755, zone);
        assert!((utm.easting - 349_227.35).abs() < 0.01, "{utm:?}");
        assert!((utm.northing - 3_095_434.71).abs() < 0.01, "{utm:?}");
    }

    #[test]
    fn southern_hemisphere_uses_false_northing() {
        let zone = UtmZone::for_point(3.0, -0.000_001);
        let utm = project(3.0, -0.000_001, zone);
        assert!(!zone.north);
        assert!((utm.northing - FALSE_NORTHING_SOUTH).abs() < 1.0, "{utm:?}");
    }
}
