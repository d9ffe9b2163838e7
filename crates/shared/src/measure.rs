use crate::models::{GeoPoint, Measurement};

/// Mean Earth radius used for all spherical measurements.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Spherical polygon areas above this value are treated as numerically
/// unstable (antimeridian crossings, degenerate rings) and recomputed with
/// the planar fallback.
pub const AREA_FALLBACK_THRESHOLD_M2: f64 = 1.0e12;

pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;
pub const SQUARE_METERS_PER_SQUARE_KM: f64 = 1_000_000.0;

/// Great-circle distance in meters (haversine).
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Sum of consecutive distances; zero for fewer than two points.
pub fn path_length(points: &[GeoPoint]) -> f64 {
    points.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Initial great-circle bearing from `from` to `to` in degrees [0, 360).
/// Coincident points give 0.
pub fn bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    if from == to {
        return 0.0;
    }
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let deg = y.atan2(x).to_degrees();
    let deg = if deg < 0.0 { deg + 360.0 } else { deg };
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

/// Point reached by travelling `dist` meters from `origin` along `bearing_deg`.
pub fn destination(origin: GeoPoint, bearing_deg: f64, dist: f64) -> GeoPoint {
    let delta = dist / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());
    GeoPoint::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Point at `fraction` (0..=1) of the way along the great circle from `a` to `b`.
pub fn intermediate(a: GeoPoint, b: GeoPoint, fraction: f64) -> GeoPoint {
    let delta = distance(a, b) / EARTH_RADIUS_M;
    if delta == 0.0 {
        return a;
    }
    let lat1 = a.lat.to_radians();
    let lon1 = a.lon.to_radians();
    let lat2 = b.lat.to_radians();
    let lon2 = b.lon.to_radians();

    let wa = ((1.0 - fraction) * delta).sin() / delta.sin();
    let wb = (fraction * delta).sin() / delta.sin();
    let x = wa * lat1.cos() * lon1.cos() + wb * lat2.cos() * lon2.cos();
    let y = wa * lat1.cos() * lon1.sin() + wb * lat2.cos() * lon2.sin();
    let z = wa * lat1.sin() + wb * lat2.sin();

    let lat = z.atan2((x * x + y * y).sqrt());
    let lon = y.atan2(x);
    GeoPoint::new(lat.to_degrees(), lon.to_degrees())
}

/// `n` points spaced equally by cumulative distance along a path,
/// paired with their distance from the start. Includes both endpoints
/// when `n >= 2`.
pub fn points_along_path(points: &[GeoPoint], n: usize) -> Vec<(f64, GeoPoint)> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![(0.0, first)];
    }

    let legs: Vec<f64> = points.windows(2).map(|w| distance(w[0], w[1])).collect();
    let total: f64 = legs.iter().sum();
    if total == 0.0 {
        return (0..n).map(|_| (0.0, first)).collect();
    }

    let mut out = Vec::with_capacity(n);
    let mut leg = 0;
    let mut leg_start = 0.0;
    for i in 0..n {
        let target = total * i as f64 / (n - 1) as f64;
        while leg < legs.len() - 1 && leg_start + legs[leg] < target {
            leg_start += legs[leg];
            leg += 1;
        }
        let point = if legs[leg] == 0.0 {
            points[leg]
        } else {
            let fraction = ((target - leg_start) / legs[leg]).clamp(0.0, 1.0);
            intermediate(points[leg], points[leg + 1], fraction)
        };
        out.push((target, point));
    }
    out
}

/// Drop an explicit closing vertex so the ring is stored open.
fn open_ring(points: &[GeoPoint]) -> &[GeoPoint] {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() > 1 && first == last => {
            &points[..points.len() - 1]
        }
        _ => points,
    }
}

/// Polygon area in square meters, with the default fallback threshold.
pub fn polygon_area(points: &[GeoPoint]) -> f64 {
    polygon_area_with_threshold(points, AREA_FALLBACK_THRESHOLD_M2)
}

/// Polygon area in square meters. Rings are closed automatically; fewer than
/// three distinct vertices give zero. When the spherical result exceeds
/// `threshold`, a planar shoelace area scaled at the mean latitude is used.
pub fn polygon_area_with_threshold(points: &[GeoPoint], threshold: f64) -> f64 {
    let ring = open_ring(points);
    if ring.len() < 3 {
        return 0.0;
    }

    let spherical = spherical_ring_area(ring);
    if spherical > threshold {
        tracing::debug!(
            spherical,
            threshold,
            "spherical area above threshold, using planar fallback"
        );
        planar_ring_area(ring)
    } else {
        spherical
    }
}

fn spherical_ring_area(ring: &[GeoPoint]) -> f64 {
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let p1 = ring[i];
        let p2 = ring[(i + 1) % ring.len()];
        sum += (p2.lon - p1.lon).to_radians()
            * (2.0 + p1.lat.to_radians().sin() + p2.lat.to_radians().sin());
    }
    (sum * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}

fn planar_ring_area(ring: &[GeoPoint]) -> f64 {
    let mean_lat = ring.iter().map(|p| p.lat).sum::<f64>() / ring.len() as f64;
    let meters_per_deg_lat = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
    let meters_per_deg_lon = meters_per_deg_lat * mean_lat.to_radians().cos();

    let mut sum = 0.0;
    for i in 0..ring.len() {
        let p1 = ring[i];
        let p2 = ring[(i + 1) % ring.len()];
        sum += p1.lon * p2.lat - p2.lon * p1.lat;
    }
    (sum / 2.0).abs() * meters_per_deg_lat * meters_per_deg_lon
}

/// Ring perimeter in meters including the closing edge; zero for fewer than two points.
pub fn polygon_perimeter(points: &[GeoPoint]) -> f64 {
    let ring = open_ring(points);
    if points.len() < 2 || ring.is_empty() {
        return 0.0;
    }
    let open = path_length(ring);
    let closing = distance(ring[ring.len() - 1], ring[0]);
    open + closing
}

pub fn circle_area(radius: f64) -> f64 {
    std::f64::consts::PI * radius * radius
}

pub fn hectares(area_m2: f64) -> f64 {
    area_m2 / SQUARE_METERS_PER_HECTARE
}

/// Length and area summary for a drawn shape. Open paths get area zero.
pub fn measure(points: &[GeoPoint], closed: bool) -> Measurement {
    let length = path_length(points);
    let (perimeter, area_m2) = if closed {
        (polygon_perimeter(points), polygon_area(points))
    } else {
        (0.0, 0.0)
    };
    Measurement {
        length,
        perimeter,
        area_m2,
        hectares: hectares(area_m2),
        square_km: area_m2 / SQUARE_METERS_PER_SQUARE_KM,
    }
}

/// Human readable distance: meters below 1 km, kilometers above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.0} m", meters)
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

/// Human readable area: m² below one hectare, ha below 1 km², km² above.
pub fn format_area(area_m2: f64) -> String {
    if area_m2 < SQUARE_METERS_PER_HECTARE {
        format!("{:.0} m²", area_m2)
    } else if area_m2 < SQUARE_METERS_PER_SQUARE_KM {
        format!("{:.2} ha", hectares(area_m2))
    } else {
        format!("{:.2} km²", area_m2 / SQUARE_METERS_PER_SQUARE_KM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    /// Square of roughly `side_m` meters with its south-west corner at (lat, lon).
    fn square(lat: f64, lon: f64, side_m: f64) -> Vec<GeoPoint> {
        let dlat = side_m / (EARTH_RADIUS_M * std::f64::consts::PI / 180.0);
        let dlon = dlat / lat.to_radians().cos();
        vec![
            p(lat, lon),
            p(lat, lon + dlon),
            p(lat + dlat, lon + dlon),
            p(lat + dlat, lon),
        ]
    }

    #[test]
    fn test_distance_one_degree_longitude_at_equator() {
        let d = distance(p(0.0, 0.0), p(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 111_195.0 * 0.01, "{}", d);
    }

    #[test]
    fn test_distance_symmetric_and_zero() {
        let a = p(59.437, 24.7536);
        let b = p(58.38, 26.72);
        assert!((distance(a, b) - distance(b, a)).abs() < 1e-9);
        assert_eq!(distance(a, a), 0.0);
        assert!(distance(a, b) > 0.0);
    }

    #[test]
    fn test_distance_across_antimeridian() {
        let d = distance(p(0.0, 179.5), p(0.0, -179.5));
        assert!((d - 111_195.0).abs() < 200.0, "{}", d);
    }

    #[test]
    fn test_path_length() {
        assert_eq!(path_length(&[]), 0.0);
        assert_eq!(path_length(&[p(1.0, 1.0)]), 0.0);
        let path = [p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0)];
        let expected = distance(path[0], path[1]) + distance(path[1], path[2]);
        assert!((path_length(&path) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_cardinal() {
        assert!((bearing(p(0.0, 0.0), p(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((bearing(p(0.0, 0.0), p(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing(p(1.0, 0.0), p(0.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing(p(0.0, 1.0), p(0.0, 0.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_coincident_is_zero() {
        assert_eq!(bearing(p(10.0, 10.0), p(10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_destination_inverts_distance_and_bearing() {
        let origin = p(59.0, 25.0);
        for &b in &[0.0, 45.0, 135.0, 225.0, 315.0] {
            let dest = destination(origin, b, 5_000.0);
            assert!((distance(origin, dest) - 5_000.0).abs() < 1e-6);
            let back = bearing(origin, dest);
            let diff = (back - b).abs();
            assert!(diff < 1e-6 || (diff - 360.0).abs() < 1e-6, "{} vs {}", back, b);
        }
    }

    #[test]
    fn test_intermediate_midpoint() {
        let a = p(0.0, 0.0);
        let b = p(0.0, 2.0);
        let mid = intermediate(a, b, 0.5);
        assert!(mid.lat.abs() < 1e-9);
        assert!((mid.lon - 1.0).abs() < 1e-9);
        assert_eq!(intermediate(a, a, 0.3), a);
    }

    #[test]
    fn test_points_along_path_spacing() {
        let path = [p(0.0, 0.0), p(0.0, 1.0), p(0.0, 3.0)];
        let samples = points_along_path(&path, 4);
        assert_eq!(samples.len(), 4);
        let total = path_length(&path);
        assert_eq!(samples[0].1, path[0]);
        assert!((samples[3].0 - total).abs() < 1e-6);
        assert!((samples[3].1.lon - 3.0).abs() < 1e-9);
        // Second sample sits one third of the way, i.e. at longitude 1.
        assert!((samples[1].1.lon - 1.0).abs() < 1e-6);
        assert!((samples[2].1.lon - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_points_along_path_degenerate() {
        assert!(points_along_path(&[], 5).is_empty());
        let single = points_along_path(&[p(1.0, 2.0)], 3);
        assert_eq!(single.len(), 3);
        assert!(single.iter().all(|(d, pt)| *d == 0.0 && *pt == p(1.0, 2.0)));
        assert_eq!(points_along_path(&[p(1.0, 2.0), p(3.0, 4.0)], 1).len(), 1);
    }

    #[test]
    fn test_area_degenerate() {
        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(polygon_area(&[p(0.0, 0.0), p(0.0, 1.0)]), 0.0);
        // Closed two-vertex ring
        assert_eq!(polygon_area(&[p(0.0, 0.0), p(0.0, 1.0), p(0.0, 0.0)]), 0.0);
    }

    #[test]
    fn test_area_one_km_square_near_equator() {
        let sq = square(0.5, 10.0, 1_000.0);
        let area = polygon_area(&sq);
        assert!((area - 1_000_000.0).abs() < 30_000.0, "{}", area);
        assert!((hectares(area) - 100.0).abs() < 3.0);
    }

    #[test]
    fn test_area_auto_closes() {
        let open = square(0.5, 10.0, 1_000.0);
        let mut closed = open.clone();
        closed.push(open[0]);
        assert!((polygon_area(&open) - polygon_area(&closed)).abs() < 1e-6);
    }

    #[test]
    fn test_area_fallback_above_threshold() {
        let sq = square(0.5, 10.0, 1_000.0);
        let spherical = polygon_area(&sq);
        // Force the planar path by lowering the threshold below the result.
        let planar = polygon_area_with_threshold(&sq, 1.0);
        assert!((planar - spherical).abs() / spherical < 0.02);
        // Equal to the threshold keeps the spherical value.
        assert_eq!(polygon_area_with_threshold(&sq, spherical), spherical);
    }

    #[test]
    fn test_area_antimeridian_ring_uses_fallback() {
        let ring = [p(0.0, 179.9), p(0.0, -179.9), p(1.0, -179.9), p(1.0, 179.9)];
        let area = polygon_area(&ring);
        let expected = planar_ring_area(&ring);
        assert!(spherical_ring_area(&ring) > AREA_FALLBACK_THRESHOLD_M2);
        assert_eq!(area, expected);
    }

    #[test]
    fn test_perimeter() {
        assert_eq!(polygon_perimeter(&[]), 0.0);
        assert_eq!(polygon_perimeter(&[p(0.0, 0.0)]), 0.0);
        let sq = square(0.5, 10.0, 1_000.0);
        let per = polygon_perimeter(&sq);
        assert!((per - 4_000.0).abs() < 40.0, "{}", per);

        let mut closed = sq.clone();
        closed.push(sq[0]);
        assert!((polygon_perimeter(&closed) - per).abs() < 1e-6);
    }

    #[test]
    fn test_measure_summary() {
        let sq = square(0.5, 10.0, 1_000.0);
        let m = measure(&sq, true);
        assert!((m.hectares - m.area_m2 / 10_000.0).abs() < 1e-9);
        assert!((m.square_km - m.area_m2 / 1_000_000.0).abs() < 1e-12);
        let open = measure(&sq, false);
        assert_eq!(open.area_m2, 0.0);
        assert_eq!(open.perimeter, 0.0);
        assert!((open.length - 3_000.0).abs() < 30.0);
    }

    #[test]
    fn test_circle_area() {
        assert!((circle_area(100.0) - 31_415.926).abs() < 0.01);
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(999.4), "999 m");
        assert_eq!(format_distance(1_113.2), "1.11 km");
    }

    #[test]
    fn test_format_area() {
        assert_eq!(format_area(500.0), "500 m²");
        assert_eq!(format_area(25_000.0), "2.50 ha");
        assert_eq!(format_area(3_500_000.0), "3.50 km²");
    }
}
