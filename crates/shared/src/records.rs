//! Persisted map annotations: tactical markers and drawn features.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::measure::{circle_area, hectares, measure, SQUARE_METERS_PER_SQUARE_KM};
use crate::models::{GeoPoint, Measurement};

/// Symbol code used when a marker is created without one.
pub const DEFAULT_SIDC: &str = "SUGP------";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Affiliation {
    #[serde(rename = "F")]
    Friendly,
    #[serde(rename = "H")]
    Hostile,
    #[serde(rename = "N")]
    Neutral,
    #[default]
    #[serde(rename = "U")]
    Unknown,
}

impl Affiliation {
    pub fn code(&self) -> char {
        match self {
            Affiliation::Friendly => 'F',
            Affiliation::Hostile => 'H',
            Affiliation::Neutral => 'N',
            Affiliation::Unknown => 'U',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "F" => Some(Affiliation::Friendly),
            "H" => Some(Affiliation::Hostile),
            "N" => Some(Affiliation::Neutral),
            "U" => Some(Affiliation::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for Affiliation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Affiliation::Friendly => write!(f, "Friendly"),
            Affiliation::Hostile => write!(f, "Hostile"),
            Affiliation::Neutral => write!(f, "Neutral"),
            Affiliation::Unknown => write!(f, "Unknown"),
        }
    }
}

fn default_sidc() -> String {
    DEFAULT_SIDC.to_string()
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// MIL-STD-2525 tactical marker placed on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_sidc")]
    pub sidc: String,
    #[serde(default)]
    pub affiliation: Affiliation,
    pub lat: f64,
    pub lon: f64,
    /// Unit size, designator and other symbol modifiers.
    #[serde(default = "empty_object")]
    pub properties: Value,
    pub created_at: String,
    pub updated_at: String,
}

impl Marker {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    /// Fill fields that older records may have stored empty.
    pub fn migrate(&mut self) {
        if self.sidc.is_empty() {
            self.sidc = default_sidc();
        }
        if self.properties.is_null() {
            self.properties = empty_object();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureType {
    Line,
    Polygon,
    Circle,
    Rectangle,
    Arrow,
    ElevationProfile,
    LineOfSight,
}

impl std::fmt::Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureType::Line => write!(f, "Line/Route"),
            FeatureType::Polygon => write!(f, "Polygon/Zone"),
            FeatureType::Circle => write!(f, "Circle"),
            FeatureType::Rectangle => write!(f, "Rectangle"),
            FeatureType::Arrow => write!(f, "Arrow/Direction"),
            FeatureType::ElevationProfile => write!(f, "Elevation Profile"),
            FeatureType::LineOfSight => write!(f, "Line of Sight"),
        }
    }
}

/// A drawn shape or saved analysis. `geometry` is GeoJSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: Uuid,
    pub name: String,
    pub feature_type: FeatureType,
    pub geometry: Value,
    /// Color, weight, opacity.
    #[serde(default = "empty_object")]
    pub style: Value,
    #[serde(default = "empty_object")]
    pub properties: Value,
    pub created_at: String,
    pub updated_at: String,
}

impl Feature {
    pub fn migrate(&mut self) {
        if self.style.is_null() {
            self.style = empty_object();
        }
        if self.properties.is_null() {
            self.properties = empty_object();
        }
    }

    /// Length and area of the shape.
    ///
    /// Circles are stored as a GeoJSON point with `properties.radius` in
    /// meters. Geometry that cannot be read measures as zero.
    pub fn measurement(&self) -> Measurement {
        match self.feature_type {
            FeatureType::Circle => {
                let radius = self
                    .properties
                    .get("radius")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                let area_m2 = circle_area(radius);
                Measurement {
                    length: 0.0,
                    perimeter: 2.0 * std::f64::consts::PI * radius,
                    area_m2,
                    hectares: hectares(area_m2),
                    square_km: area_m2 / SQUARE_METERS_PER_SQUARE_KM,
                }
            }
            FeatureType::Polygon | FeatureType::Rectangle => {
                measure(&geometry_points(&self.geometry), true)
            }
            _ => measure(&geometry_points(&self.geometry), false),
        }
    }
}

/// Vertices of a GeoJSON geometry, `[lon, lat]` pairs in order.
///
/// Polygons yield their outer ring only.
pub fn geometry_points(geometry: &Value) -> Vec<GeoPoint> {
    let coords = match geometry.get("coordinates") {
        Some(c) => c,
        None => return Vec::new(),
    };
    let ring = match geometry.get("type").and_then(Value::as_str) {
        Some("Polygon") => coords.get(0),
        Some("LineString") => Some(coords),
        Some("Point") => return position(coords).into_iter().collect(),
        _ => None,
    };
    ring.and_then(Value::as_array)
        .map(|positions| positions.iter().filter_map(position).collect())
        .unwrap_or_default()
}

fn position(value: &Value) -> Option<GeoPoint> {
    let pair = value.as_array()?;
    let lon = pair.first()?.as_f64()?;
    let lat = pair.get(1)?.as_f64()?;
    Some(GeoPoint::new(lat, lon))
}
