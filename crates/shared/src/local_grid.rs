//! Fixed local projected grid (L-EST97) used by the map renderer.
//!
//! Lambert conformal conic with two standard parallels on GRS80,
//! plus the discrete resolution pyramid of the national tile service.
//! Tiles are 256 px; level 0 is 4000 m/px and each level halves it.

use crate::ellipsoid::Ellipsoid;
use crate::error::CoordinateError;
use crate::models::GeoPoint;

/// Parameters of a two-parallel Lambert conformal conic projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LccParams {
    pub ellipsoid: Ellipsoid,
    pub standard_parallel_1: f64,
    pub standard_parallel_2: f64,
    pub origin_lat: f64,
    pub origin_lon: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl LccParams {
    pub const LEST97: LccParams = LccParams {
        ellipsoid: Ellipsoid::GRS80,
        standard_parallel_1: 59.333_333_333_333_33,
        standard_parallel_2: 58.0,
        origin_lat: 57.517_553_930_555_56,
        origin_lon: 24.0,
        false_easting: 500_000.0,
        false_northing: 6_375_000.0,
    };
}

/// A constructed projection; the cone constants are derived once.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    params: LccParams,
    e: f64,
    n: f64,
    big_f: f64,
    rho0: f64,
}

impl LambertConformal {
    pub fn new(params: LccParams) -> Self {
        let e = params.ellipsoid.e();
        let phi1 = params.standard_parallel_1.to_radians();
        let phi2 = params.standard_parallel_2.to_radians();
        let phi0 = params.origin_lat.to_radians();

        let m1 = m(e, phi1);
        let m2 = m(e, phi2);
        let t1 = t(e, phi1);
        let t2 = t(e, phi2);
        let t0 = t(e, phi0);

        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let big_f = m1 / (n * t1.powf(n));
        let rho0 = params.ellipsoid.a * big_f * t0.powf(n);

        LambertConformal {
            params,
            e,
            n,
            big_f,
            rho0,
        }
    }

    pub fn lest97() -> Self {
        Self::new(LccParams::LEST97)
    }

    pub fn params(&self) -> &LccParams {
        &self.params
    }

    /// Geographic point to grid (x = easting, y = northing) in meters.
    pub fn forward(&self, point: GeoPoint) -> Result<(f64, f64), CoordinateError> {
        if !point.is_valid() || point.lat.abs() >= 90.0 {
            return Err(CoordinateError::OutOfRange(format!(
                "point {} cannot be projected",
                point
            )));
        }
        let phi = point.lat.to_radians();
        let rho = self.params.ellipsoid.a * self.big_f * t(self.e, phi).powf(self.n);
        let theta = self.n * (point.lon - self.params.origin_lon).to_radians();
        let x = self.params.false_easting + rho * theta.sin();
        let y = self.params.false_northing + self.rho0 - rho * theta.cos();
        Ok((x, y))
    }

    /// Grid (x, y) back to a geographic point.
    pub fn inverse(&self, x: f64, y: f64) -> Result<GeoPoint, CoordinateError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(CoordinateError::OutOfRange(format!("grid ({}, {})", x, y)));
        }
        let dx = x - self.params.false_easting;
        let dy = self.rho0 - (y - self.params.false_northing);
        let rho = self.n.signum() * (dx * dx + dy * dy).sqrt();
        if rho == 0.0 {
            return Err(CoordinateError::OutOfRange(format!(
                "grid ({}, {}) is the cone apex",
                x, y
            )));
        }
        let t_prime = (rho / (self.params.ellipsoid.a * self.big_f)).powf(1.0 / self.n);
        let theta = if self.n > 0.0 {
            dx.atan2(dy)
        } else {
            (-dx).atan2(-dy)
        };

        let half_pi = std::f64::consts::FRAC_PI_2;
        let mut phi = half_pi - 2.0 * t_prime.atan();
        for _ in 0..15 {
            let es = self.e * phi.sin();
            let next =
                half_pi - 2.0 * (t_prime * ((1.0 - es) / (1.0 + es)).powf(self.e / 2.0)).atan();
            let done = (next - phi).abs() < 1e-12;
            phi = next;
            if done {
                break;
            }
        }
        let lon = theta / self.n + self.params.origin_lon.to_radians();
        Ok(GeoPoint::new(phi.to_degrees(), lon.to_degrees()))
    }
}

fn m(e: f64, phi: f64) -> f64 {
    let es = e * phi.sin();
    phi.cos() / (1.0 - es * es).sqrt()
}

fn t(e: f64, phi: f64) -> f64 {
    let es = e * phi.sin();
    (std::f64::consts::FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

pub const TILE_SIZE_PX: f64 = 256.0;
pub const PYRAMID_LEVELS: usize = 18;

/// Discrete zoom levels for the local grid tile service.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePyramid {
    pub origin_x: f64,
    pub origin_y: f64,
    pub tile_size: f64,
    pub resolutions: Vec<f64>,
}

impl TilePyramid {
    pub fn lest97() -> Self {
        TilePyramid {
            origin_x: 40_500.0,
            origin_y: 5_993_000.0,
            tile_size: TILE_SIZE_PX,
            resolutions: (0..PYRAMID_LEVELS)
                .map(|z| 4000.0 / 2f64.powi(z as i32))
                .collect(),
        }
    }

    /// Meters per pixel at a zoom level.
    pub fn resolution(&self, zoom: usize) -> Option<f64> {
        self.resolutions.get(zoom).copied()
    }

    /// The coarsest level that is at least as detailed as `meters_per_px`.
    pub fn zoom_for_resolution(&self, meters_per_px: f64) -> usize {
        self.resolutions
            .iter()
            .position(|&r| r <= meters_per_px)
            .unwrap_or(self.resolutions.len() - 1)
    }

    /// Tile column and row (counted up from the origin) containing a grid point.
    pub fn tile_at(&self, x: f64, y: f64, zoom: usize) -> Option<(i64, i64)> {
        let res = self.resolution(zoom)?;
        let span = res * self.tile_size;
        let col = ((x - self.origin_x) / span).floor() as i64;
        let row = ((y - self.origin_y) / span).floor() as i64;
        Some((col, row))
    }
}

/// Geographic point to L-EST97 (x, y).
pub fn to_local_grid(point: GeoPoint) -> Result<(f64, f64), CoordinateError> {
    LambertConformal::lest97().forward(point)
}

/// L-EST97 (x, y) to geographic point.
pub fn from_local_grid(x: f64, y: f64) -> Result<GeoPoint, CoordinateError> {
    LambertConformal::lest97().inverse(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_maps_to_false_origin() {
        let (x, y) = to_local_grid(GeoPoint::new(
            LccParams::LEST97.origin_lat,
            LccParams::LEST97.origin_lon,
        ))
        .unwrap();
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!((y - 6_375_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_tallinn_in_expected_range() {
        let (x, y) = to_local_grid(GeoPoint::new(59.437, 24.7536)).unwrap();
        assert!((x - 542_763.0).abs() < 5.0, "x = {}", x);
        assert!((y - 6_589_036.0).abs() < 5.0, "y = {}", y);
    }

    #[test]
    fn test_roundtrip() {
        let proj = LambertConformal::lest97();
        for &(lat, lon) in &[(59.437, 24.7536), (58.38, 26.72), (57.8, 22.0), (59.9, 28.2)] {
            let (x, y) = proj.forward(GeoPoint::new(lat, lon)).unwrap();
            let back = proj.inverse(x, y).unwrap();
            assert!((back.lat - lat).abs() < 1e-9);
            assert!((back.lon - lon).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pole_rejected() {
        assert!(to_local_grid(GeoPoint::new(90.0, 0.0)).is_err());
    }

    #[test]
    fn test_pyramid_resolutions() {
        let pyramid = TilePyramid::lest97();
        assert_eq!(pyramid.resolutions.len(), PYRAMID_LEVELS);
        assert_eq!(pyramid.resolution(0), Some(4000.0));
        assert_eq!(pyramid.resolution(1), Some(2000.0));
        assert_eq!(pyramid.resolution(17), Some(0.030_517_578_125));
        assert_eq!(pyramid.resolution(18), None);
    }

    #[test]
    fn test_zoom_for_resolution() {
        let pyramid = TilePyramid::lest97();
        assert_eq!(pyramid.zoom_for_resolution(4000.0), 0);
        assert_eq!(pyramid.zoom_for_resolution(3000.0), 1);
        assert_eq!(pyramid.zoom_for_resolution(1.0), 12);
        assert_eq!(pyramid.zoom_for_resolution(0.0001), 17);
    }

    #[test]
    fn test_tile_at_origin_and_offset() {
        let pyramid = TilePyramid::lest97();
        assert_eq!(pyramid.tile_at(40_500.0, 5_993_000.0, 0), Some((0, 0)));
        // One tile at zoom 0 spans 1 024 000 m.
        assert_eq!(
            pyramid.tile_at(40_500.0 + 1_024_000.0, 5_993_000.0 + 10.0, 0),
            Some((1, 0))
        );
        assert_eq!(pyramid.tile_at(0.0, 0.0, 99), None);
    }
}
