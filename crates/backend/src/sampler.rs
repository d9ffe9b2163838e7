use std::time::Duration;

use serde::{Deserialize, Serialize};
use tacmap_shared::dem::ElevationGrid;
use tacmap_shared::{ElevationSampler, ElevationUnavailable, GeoPoint};

#[derive(Serialize)]
struct LookupRequest {
    locations: Vec<Location>,
}

#[derive(Serialize)]
struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Deserialize)]
struct LookupResult {
    elevation: Option<f64>,
}

/// Elevation service speaking the Open-Elevation batch lookup protocol:
/// `POST {"locations":[{"latitude","longitude"}]}` answered by
/// `{"results":[{"elevation"}]}` in request order.
#[derive(Debug, Clone)]
pub struct HttpElevationSampler {
    client: reqwest::Client,
    url: String,
}

impl HttpElevationSampler {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(HttpElevationSampler {
            client,
            url: url.into(),
        })
    }
}

fn unavailable(err: reqwest::Error) -> ElevationUnavailable {
    if err.is_timeout() {
        ElevationUnavailable("elevation service timed out".to_string())
    } else {
        ElevationUnavailable(err.to_string())
    }
}

impl ElevationSampler for HttpElevationSampler {
    async fn lookup_batch(
        &self,
        points: &[GeoPoint],
    ) -> Result<Vec<Option<f64>>, ElevationUnavailable> {
        let body = LookupRequest {
            locations: points
                .iter()
                .map(|p| Location {
                    latitude: p.lat,
                    longitude: p.lon,
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?;
        let parsed: LookupResponse = response.json().await.map_err(unavailable)?;

        if parsed.results.len() != points.len() {
            return Err(ElevationUnavailable(format!(
                "elevation service returned {} results for {} points",
                parsed.results.len(),
                points.len()
            )));
        }
        Ok(parsed.results.into_iter().map(|r| r.elevation).collect())
    }
}

/// The sampler chosen at startup.
#[derive(Debug, Clone)]
pub enum Sampler {
    Remote(HttpElevationSampler),
    Grid(ElevationGrid),
}

impl ElevationSampler for Sampler {
    async fn lookup_batch(
        &self,
        points: &[GeoPoint],
    ) -> Result<Vec<Option<f64>>, ElevationUnavailable> {
        match self {
            Sampler::Remote(remote) => remote.lookup_batch(points).await,
            Sampler::Grid(grid) => grid.lookup_batch(points).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Serve `app` on an ephemeral local port and return its base URL.
    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/lookup", addr)
    }

    /// Answers with the latitude as the elevation, null south of the equator.
    async fn echo_lat(Json(body): Json<Value>) -> Json<Value> {
        let results: Vec<Value> = body["locations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|loc| {
                let lat = loc["latitude"].as_f64().unwrap();
                if lat < 0.0 {
                    json!({ "latitude": lat, "elevation": null })
                } else {
                    json!({ "latitude": lat, "elevation": lat })
                }
            })
            .collect();
        Json(json!({ "results": results }))
    }

    #[tokio::test]
    async fn test_remote_lookup_is_aligned() {
        let url = spawn(Router::new().route("/lookup", post(echo_lat))).await;
        let sampler = HttpElevationSampler::new(url, Duration::from_secs(5)).unwrap();

        let values = sampler
            .lookup_batch(&[
                GeoPoint::new(10.0, 0.0),
                GeoPoint::new(-5.0, 0.0),
                GeoPoint::new(20.0, 0.0),
            ])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(10.0), None, Some(20.0)]);
    }

    #[tokio::test]
    async fn test_remote_server_error_is_unavailable() {
        let app = Router::new().route(
            "/lookup",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = spawn(app).await;
        let sampler = HttpElevationSampler::new(url, Duration::from_secs(5)).unwrap();
        assert!(sampler.lookup(GeoPoint::new(1.0, 1.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_remote_short_response_is_unavailable() {
        let app = Router::new().route(
            "/lookup",
            post(|| async { Json(json!({ "results": [] })) }),
        );
        let url = spawn(app).await;
        let sampler = HttpElevationSampler::new(url, Duration::from_secs(5)).unwrap();
        let err = sampler
            .lookup_batch(&[GeoPoint::new(1.0, 1.0)])
            .await
            .unwrap_err();
        assert!(err.0.contains("0 results for 1 points"));
    }

    #[tokio::test]
    async fn test_remote_timeout_is_reported() {
        let app = Router::new().route(
            "/lookup",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({ "results": [] }))
            }),
        );
        let url = spawn(app).await;
        let sampler = HttpElevationSampler::new(url, Duration::from_millis(100)).unwrap();
        let err = sampler
            .lookup_batch(&[GeoPoint::new(1.0, 1.0)])
            .await
            .unwrap_err();
        assert!(err.0.contains("timed out"));
    }

    #[tokio::test]
    async fn test_grid_variant_delegates() {
        let sampler = Sampler::Grid(ElevationGrid::flat(1.0, 0.0, 0.5, 3, 3, 7.0));
        assert_eq!(sampler.lookup(GeoPoint::new(0.5, 0.5)).await.unwrap(), Some(7.0));
        assert_eq!(sampler.lookup(GeoPoint::new(50.0, 0.5)).await.unwrap(), None);
    }
}
