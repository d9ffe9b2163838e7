use serde::{Deserialize, Serialize};

/// A geographic position in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Build a point, clamping latitude to [-90, 90] and wrapping longitude
    /// across the antimeridian into [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint {
            lat: lat.clamp(-90.0, 90.0),
            lon: wrap_longitude(lon),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lon)
    }
}

/// Wrap a longitude into [-180, 180].
pub fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Military grid reference split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilitaryGridRef {
    /// Zone number followed by the latitude band letter, e.g. "35V".
    pub zone_band: String,
    /// Two-letter 100 km square identifier, e.g. "MF".
    pub square_id: String,
    /// Offset within the square, truncated to `precision` digits.
    pub easting: u32,
    pub northing: u32,
    /// Number of digits per axis, 0 to 5.
    pub precision: u8,
}

impl std::fmt::Display for MilitaryGridRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.precision == 0 {
            return write!(f, "{} {}", self.zone_band, self.square_id);
        }
        let width = self.precision as usize;
        write!(
            f,
            "{} {} {:0width$} {:0width$}",
            self.zone_band,
            self.square_id,
            self.easting,
            self.northing,
            width = width
        )
    }
}

/// Zoned transverse Mercator coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarCoord {
    pub zone: u8,
    /// Latitude band letter; `N` and later letters are in the northern hemisphere.
    pub letter: char,
    pub easting: f64,
    pub northing: f64,
}

impl PlanarCoord {
    pub fn is_northern(&self) -> bool {
        self.letter >= 'N'
    }
}

impl std::fmt::Display for PlanarCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{} {:.0} {:.0}",
            self.zone, self.letter, self.easting, self.northing
        )
    }
}

/// One sample along an elevation profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSample {
    pub distance: f64,
    pub elevation: Option<f64>,
    pub point: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationProfile {
    pub samples: Vec<PathSample>,
    pub total_distance: f64,
    pub min_elevation: Option<f64>,
    pub max_elevation: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstruction {
    pub distance: f64,
    pub elevation: f64,
    pub point: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityResult {
    pub visible: bool,
    pub obstruction: Option<Obstruction>,
    pub profile: Vec<PathSample>,
    pub observer_elevation: f64,
    pub target_elevation: f64,
    pub total_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaySample {
    pub distance: f64,
    pub point: GeoPoint,
    pub elevation: Option<f64>,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub bearing: f64,
    pub samples: Vec<RaySample>,
    pub first_obstruction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialVisibilityMap {
    pub observer: GeoPoint,
    pub observer_elevation: f64,
    pub radius: f64,
    pub rays: Vec<Ray>,
}

/// Approximate shading of the wedge between two adjacent rays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorShade {
    pub start_bearing: f64,
    pub end_bearing: f64,
    pub mean_obstruction_distance: f64,
    pub visible: bool,
}

/// Length and area figures for a drawn feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub length: f64,
    pub perimeter: f64,
    pub area_m2: f64,
    pub hectares: f64,
    pub square_km: f64,
}
