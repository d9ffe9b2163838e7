//! Zoned transverse Mercator (UTM-style) coordinates on WGS84.
//!
//! Zones are 6° wide and numbered from the antimeridian; the Norway and
//! Svalbard zone exceptions are not applied. Latitude band letters come from
//! an 8° table starting at 80°S. Latitudes south of 80°S map to `C` and
//! latitudes north of 84°N map to `X`.

use crate::ellipsoid::Ellipsoid;
use crate::error::CoordinateError;
use crate::models::{wrap_longitude, GeoPoint, PlanarCoord};

/// Latitude band letters from 80°S northward, `I` and `O` omitted.
pub const BAND_LETTERS: &[u8; 20] = b"CDEFGHJKLMNPQRSTUVWX";

const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

const MIN_EASTING: f64 = 100_000.0;
const MAX_EASTING: f64 = 900_000.0;

/// Zone number for a longitude: ⌊(lon+180)/6⌋+1, with 180° folded into zone 60.
pub fn zone_number(lon: f64) -> u8 {
    let lon = wrap_longitude(lon);
    let zone = ((lon + 180.0) / 6.0).floor() as i32 + 1;
    zone.clamp(1, 60) as u8
}

/// Latitude band letter for a latitude.
pub fn band_letter(lat: f64) -> char {
    if lat < -80.0 {
        return 'C';
    }
    if lat > 84.0 {
        return 'X';
    }
    let idx = ((lat + 80.0) / 8.0).floor() as usize;
    BAND_LETTERS[idx.min(BAND_LETTERS.len() - 1)] as char
}

/// Central meridian of a zone in degrees.
pub fn central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

fn meridian_arc(ell: &Ellipsoid, phi: f64) -> f64 {
    let e2 = ell.e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    ell.a
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Project a point into its natural zone.
pub fn to_planar(point: GeoPoint) -> PlanarCoord {
    let zone = zone_number(point.lon);
    project_in_zone(point, zone)
}

/// Project a point into a given zone; used when a neighbouring zone is forced.
pub fn project_in_zone(point: GeoPoint, zone: u8) -> PlanarCoord {
    let ell = Ellipsoid::WGS84;
    let e2 = ell.e2();
    let ep2 = ell.ep2();

    let phi = point.lat.to_radians();
    let lambda0 = central_meridian(zone).to_radians();
    let mut dlon = point.lon.to_radians() - lambda0;
    // Keep the longitude difference continuous across the antimeridian.
    if dlon > std::f64::consts::PI {
        dlon -= 2.0 * std::f64::consts::PI;
    } else if dlon < -std::f64::consts::PI {
        dlon += 2.0 * std::f64::consts::PI;
    }

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let tan_phi = phi.tan();

    let n = ell.a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * dlon;
    let m = meridian_arc(&ell, phi);

    let easting = K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    if point.lat < 0.0 {
        northing += FALSE_NORTHING_SOUTH;
    }

    PlanarCoord {
        zone,
        letter: band_letter(point.lat),
        easting,
        northing,
    }
}

/// Inverse projection back to geographic coordinates.
pub fn from_planar(coord: &PlanarCoord) -> Result<GeoPoint, CoordinateError> {
    validate_planar(coord)?;

    let ell = Ellipsoid::WGS84;
    let e2 = ell.e2();
    let ep2 = ell.ep2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    let x = coord.easting - FALSE_EASTING;
    let y = if coord.is_northern() {
        coord.northing
    } else {
        coord.northing - FALSE_NORTHING_SOUTH
    };

    let m = y / K0;
    let mu = m / (ell.a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let sqrt_1me2 = (1.0 - e2).sqrt();
    let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();
    let n1 = ell.a / (1.0 - e2 * sin1 * sin1).sqrt();
    let t1 = tan1 * tan1;
    let c1 = ep2 * cos1 * cos1;
    let r1 = ell.a * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * K0);

    let phi = phi1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lambda = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
            / 120.0)
        / cos1;

    let lat = phi.to_degrees();
    let lon = central_meridian(coord.zone) + lambda.to_degrees();
    Ok(GeoPoint::new(lat, lon))
}

fn validate_planar(coord: &PlanarCoord) -> Result<(), CoordinateError> {
    if !(1..=60).contains(&coord.zone) {
        return Err(CoordinateError::OutOfRange(format!(
            "zone {} not in 1..=60",
            coord.zone
        )));
    }
    if !BAND_LETTERS.contains(&(coord.letter as u8)) {
        return Err(CoordinateError::OutOfRange(format!(
            "band letter {:?}",
            coord.letter
        )));
    }
    if !coord.easting.is_finite() || !(MIN_EASTING..=MAX_EASTING).contains(&coord.easting) {
        return Err(CoordinateError::OutOfRange(format!(
            "easting {}",
            coord.easting
        )));
    }
    if !coord.northing.is_finite() || !(0.0..=FALSE_NORTHING_SOUTH).contains(&coord.northing) {
        return Err(CoordinateError::OutOfRange(format!(
            "northing {}",
            coord.northing
        )));
    }
    Ok(())
}

/// Parse the display format `"<zone><letter> <easting> <northing>"`.
pub fn parse_planar(input: &str) -> Result<PlanarCoord, CoordinateError> {
    let mut parts = input.split_whitespace();
    let zone_part = parts
        .next()
        .ok_or_else(|| CoordinateError::malformed(input, "empty input"))?;
    let easting = parts
        .next()
        .ok_or_else(|| CoordinateError::malformed(input, "missing easting"))?;
    let northing = parts
        .next()
        .ok_or_else(|| CoordinateError::malformed(input, "missing northing"))?;
    if parts.next().is_some() {
        return Err(CoordinateError::malformed(input, "trailing text"));
    }

    let letter = zone_part
        .chars()
        .last()
        .filter(|c| c.is_ascii_alphabetic())
        .ok_or_else(|| CoordinateError::malformed(input, "missing band letter"))?
        .to_ascii_uppercase();
    let zone: u8 = zone_part[..zone_part.len() - 1]
        .parse()
        .map_err(|_| CoordinateError::malformed(input, "zone is not a number"))?;
    let easting: f64 = easting
        .parse()
        .map_err(|_| CoordinateError::malformed(input, "easting is not a number"))?;
    let northing: f64 = northing
        .parse()
        .map_err(|_| CoordinateError::malformed(input, "northing is not a number"))?;

    let coord = PlanarCoord {
        zone,
        letter,
        easting,
        northing,
    };
    validate_planar(&coord)?;
    Ok(coord)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_number_examples() {
        assert_eq!(zone_number(-177.0), 1);
        assert_eq!(zone_number(3.0), 31);
        assert_eq!(zone_number(24.75), 35);
        assert_eq!(zone_number(180.0), 60);
        assert_eq!(zone_number(-180.0), 1);
    }

    #[test]
    fn test_band_letters() {
        assert_eq!(band_letter(-80.0), 'C');
        assert_eq!(band_letter(-0.1), 'M');
        assert_eq!(band_letter(0.0), 'N');
        assert_eq!(band_letter(59.4), 'V');
        assert_eq!(band_letter(83.9), 'X');
        // Degenerate endpoints
        assert_eq!(band_letter(-85.0), 'C');
        assert_eq!(band_letter(89.0), 'X');
    }

    #[test]
    fn test_equator_central_meridian() {
        let p = to_planar(GeoPoint::new(0.0, 3.0));
        assert_eq!(p.zone, 31);
        assert!((p.easting - 500_000.0).abs() < 1e-6);
        assert!(p.northing.abs() < 1e-6);
    }

    #[test]
    fn test_known_tallinn_coordinate() {
        // Tallinn, zone 35V
        let p = to_planar(GeoPoint::new(59.437, 24.7536));
        assert_eq!(p.zone, 35);
        assert_eq!(p.letter, 'V');
        assert!((p.easting - 372_594.0).abs() < 50.0, "{}", p.easting);
        assert!((p.northing - 6_590_865.0).abs() < 50.0, "{}", p.northing);
    }

    #[test]
    fn test_southern_hemisphere_false_northing() {
        let p = to_planar(GeoPoint::new(-33.86, 151.21));
        assert_eq!(p.zone, 56);
        assert_eq!(p.letter, 'H');
        assert!(p.northing > 6_000_000.0 && p.northing < 6_500_000.0);
        assert!(!p.is_northern());
    }

    #[test]
    fn test_planar_roundtrip() {
        for &(lat, lon) in &[
            (59.437, 24.7536),
            (-33.86, 151.21),
            (0.5, -0.5),
            (-79.5, -70.2),
            (83.5, 10.1),
            (45.0, -177.0),
        ] {
            let planar = to_planar(GeoPoint::new(lat, lon));
            let back = from_planar(&planar).unwrap();
            assert!((back.lat - lat).abs() < 1e-7, "lat {} vs {}", back.lat, lat);
            assert!((back.lon - lon).abs() < 1e-7, "lon {} vs {}", back.lon, lon);
        }
    }

    #[test]
    fn test_display_format() {
        let p = PlanarCoord {
            zone: 35,
            letter: 'V',
            easting: 371_234.4,
            northing: 6_590_123.6,
        };
        assert_eq!(p.to_string(), "35V 371234 6590124");
    }

    #[test]
    fn test_parse_planar() {
        let p = parse_planar("35V 371234 6590124").unwrap();
        assert_eq!(p.zone, 35);
        assert_eq!(p.letter, 'V');
        assert!((p.easting - 371_234.0).abs() < 1e-9);

        let lower = parse_planar("  35v   371234  6590124 ").unwrap();
        assert_eq!(lower.letter, 'V');
    }

    #[test]
    fn test_parse_planar_rejects_garbage() {
        assert!(parse_planar("").is_err());
        assert!(parse_planar("35V 371234").is_err());
        assert!(parse_planar("61V 371234 6590124").is_err());
        assert!(parse_planar("35I 371234 6590124").is_err());
        assert!(parse_planar("35V abc 6590124").is_err());
        assert!(parse_planar("35V 10 6590124").is_err());
        assert!(parse_planar("35V 371234 6590124 extra").is_err());
    }

    #[test]
    fn test_from_planar_rejects_out_of_range() {
        let bad = PlanarCoord {
            zone: 0,
            letter: 'V',
            easting: 500_000.0,
            northing: 6_000_000.0,
        };
        assert!(matches!(
            from_planar(&bad),
            Err(CoordinateError::OutOfRange(_))
        ));
    }
}
