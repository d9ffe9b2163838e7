//! JSON bodies of the elevation endpoints, shared by the backend and client.

use serde::{Deserialize, Serialize};

use crate::error::VisibilityError;
use crate::models::{
    ElevationProfile, GeoPoint, Obstruction, PathSample, RadialVisibilityMap, RaySample,
    SectorShade, VisibilityResult,
};
use crate::visibility::sector_shading;

pub const DEFAULT_OBSERVER_HEIGHT_M: f64 = 2.0;

fn default_observer_height() -> f64 {
    DEFAULT_OBSERVER_HEIGHT_M
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub points: Vec<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile: Vec<PathSample>,
    pub total_distance: f64,
    pub min_elevation: Option<f64>,
    pub max_elevation: Option<f64>,
}

impl From<ElevationProfile> for ProfileResponse {
    fn from(p: ElevationProfile) -> Self {
        ProfileResponse {
            profile: p.samples,
            total_distance: p.total_distance,
            min_elevation: p.min_elevation,
            max_elevation: p.max_elevation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOfSightRequest {
    pub observer: GeoPoint,
    pub target: GeoPoint,
    #[serde(default = "default_observer_height")]
    pub observer_height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOfSightResponse {
    pub visible: bool,
    pub profile: Vec<PathSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obstruction: Option<Obstruction>,
    pub observer_elevation: f64,
    pub target_elevation: f64,
    pub total_distance: f64,
}

impl From<VisibilityResult> for LineOfSightResponse {
    fn from(r: VisibilityResult) -> Self {
        LineOfSightResponse {
            visible: r.visible,
            profile: r.profile,
            obstruction: r.obstruction,
            observer_elevation: r.observer_elevation,
            target_elevation: r.target_elevation,
            total_distance: r.total_distance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaytraceRequest {
    pub observer: GeoPoint,
    pub radius: f64,
    #[serde(default = "default_observer_height")]
    pub observer_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayBody {
    pub bearing: f64,
    pub points: Vec<RaySample>,
    pub first_obstruction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaytraceResponse {
    pub visibility_map: Vec<RayBody>,
    pub observer_elevation: f64,
    #[serde(default)]
    pub sectors: Vec<SectorShade>,
}

impl From<RadialVisibilityMap> for RaytraceResponse {
    fn from(map: RadialVisibilityMap) -> Self {
        let sectors = sector_shading(&map);
        RaytraceResponse {
            observer_elevation: map.observer_elevation,
            visibility_map: map
                .rays
                .into_iter()
                .map(|ray| RayBody {
                    bearing: ray.bearing,
                    points: ray.samples,
                    first_obstruction: ray.first_obstruction,
                })
                .collect(),
            sectors,
        }
    }
}

/// Error body returned with every non-2xx elevation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: String,
}

impl From<&VisibilityError> for ApiErrorBody {
    fn from(err: &VisibilityError) -> Self {
        ApiErrorBody {
            error: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ElevationUnavailable;
    use crate::models::Ray;

    #[test]
    fn test_request_defaults() {
        let req: LineOfSightRequest = serde_json::from_str(
            r#"{"observer":{"lat":59.0,"lon":25.0},"target":{"lat":59.01,"lon":25.0}}"#,
        )
        .unwrap();
        assert_eq!(req.observer_height, DEFAULT_OBSERVER_HEIGHT_M);
        assert_eq!(req.samples, None);

        let req: ProfileRequest =
            serde_json::from_str(r#"{"points":[{"lat":0,"lon":0}],"samples":20}"#).unwrap();
        assert_eq!(req.samples, Some(20));
    }

    #[test]
    fn test_line_of_sight_response_omits_missing_obstruction() {
        let body = LineOfSightResponse {
            visible: true,
            profile: vec![],
            obstruction: None,
            observer_elevation: 50.0,
            target_elevation: 40.0,
            total_distance: 1111.9,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("obstruction").is_none());
        assert_eq!(json["observer_elevation"], 50.0);
    }

    #[test]
    fn test_raytrace_response_shape() {
        let map = RadialVisibilityMap {
            observer: GeoPoint::new(0.0, 0.0),
            observer_elevation: 12.0,
            radius: 1000.0,
            rays: vec![
                Ray {
                    bearing: 0.0,
                    samples: vec![],
                    first_obstruction: None,
                },
                Ray {
                    bearing: 180.0,
                    samples: vec![],
                    first_obstruction: Some(100.0),
                },
            ],
        };
        let body = RaytraceResponse::from(map);
        assert_eq!(body.visibility_map.len(), 2);
        assert_eq!(body.sectors.len(), 2);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["visibility_map"][1]["first_obstruction"], 100.0);
        assert!(json["visibility_map"][0]["first_obstruction"].is_null());
        assert_eq!(json["observer_elevation"], 12.0);
    }

    #[test]
    fn test_error_body_code() {
        let err = VisibilityError::from(ElevationUnavailable("timeout".to_string()));
        let body = ApiErrorBody::from(&err);
        assert_eq!(body.code, "ELEVATION_UNAVAILABLE");
        assert_eq!(body.error, "elevation unavailable: timeout");
    }
}
