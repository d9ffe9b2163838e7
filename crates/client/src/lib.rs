//! Typed async caller for a tacmap backend.
//!
//! Every call runs under its own time budget so a slow elevation service
//! surfaces as [`ClientError::Timeout`], distinct from the backend reporting
//! [`ClientError::ElevationUnavailable`].

use std::future::Future;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tacmap_shared::api::{
    ApiErrorBody, LineOfSightRequest, LineOfSightResponse, ProfileRequest, ProfileResponse,
    RaytraceRequest, RaytraceResponse,
};
use tacmap_shared::GeoPoint;

pub const DEFAULT_RAYTRACE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub raytrace_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            raytrace_timeout: DEFAULT_RAYTRACE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::new("http://localhost:3000")
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("elevation unavailable: {0}")]
    ElevationUnavailable(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Short text for an operator, one wording per failure kind.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Timeout(budget) => format!(
                "The request took longer than {}s. Try a smaller radius or fewer samples.",
                budget.as_secs()
            ),
            ClientError::ElevationUnavailable(_) => {
                "Elevation data is unavailable for this area right now.".to_string()
            }
            ClientError::InvalidRequest(msg) => format!("Check the input: {}", msg),
            ClientError::Server { status, .. } => format!("The server failed ({}).", status),
            ClientError::Transport(_) => "Could not reach the server.".to_string(),
            ClientError::Decode(_) => "The server sent an unexpected response.".to_string(),
        }
    }
}

/// Map a non-2xx elevation response onto a [`ClientError`] using the `code`
/// of its JSON error body, falling back to the raw text.
pub fn classify_error(status: u16, body: &str) -> ClientError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => match err.code.as_str() {
            "ELEVATION_UNAVAILABLE" => ClientError::ElevationUnavailable(err.error),
            "INVALID_REQUEST" => ClientError::InvalidRequest(err.error),
            _ => ClientError::Server {
                status,
                message: err.error,
            },
        },
        Err(_) => ClientError::Server {
            status,
            message: body.trim().to_string(),
        },
    }
}

/// Build the variables JSON for a toMilitaryGrid query.
pub fn build_military_grid_variables(point: GeoPoint, precision: Option<u8>) -> serde_json::Value {
    serde_json::json!({
        "point": { "lat": point.lat, "lon": point.lon },
        "precision": precision
    })
}

/// Build the variables JSON for a createMarker mutation. `affiliation` is
/// one of the single-letter codes F, H, N or U.
pub fn build_create_marker_variables(
    name: &str,
    point: GeoPoint,
    affiliation: Option<&str>,
    sidc: Option<&str>,
) -> serde_json::Value {
    let affiliation = affiliation.and_then(|code| match code {
        "F" => Some("FRIENDLY"),
        "H" => Some("HOSTILE"),
        "N" => Some("NEUTRAL"),
        "U" => Some("UNKNOWN"),
        _ => None,
    });
    serde_json::json!({
        "input": {
            "name": name,
            "lat": point.lat,
            "lon": point.lon,
            "affiliation": affiliation,
            "sidc": sidc
        }
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<serde_json::Value>,
}

impl From<GraphQLError> for ClientError {
    fn from(err: GraphQLError) -> Self {
        let code = err
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(|c| c.as_str());
        match code {
            Some("INVALID_COORDINATE") => ClientError::InvalidRequest(err.message),
            _ => ClientError::Server {
                status: 200,
                message: err.message,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerData {
    pub id: String,
    pub name: String,
    pub sidc: String,
    pub affiliation: String,
    pub lat: f64,
    pub lon: f64,
    pub military_grid: Option<String>,
    pub created_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MilitaryGridResponse {
    to_military_grid: String,
}

#[derive(Deserialize)]
struct MarkersResponse {
    markers: Vec<MarkerData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMarkerResponse {
    create_marker: MarkerData,
}

const MARKER_FIELDS: &str = "id name sidc affiliation lat lon militaryGrid createdAt";

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

#[derive(Debug, Clone)]
pub struct TacmapClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl TacmapClient {
    pub fn new(config: ClientConfig) -> Self {
        TacmapClient {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn with_budget<T>(
        &self,
        budget: Duration,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        match tokio::time::timeout(budget, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(budget_ms = budget.as_millis() as u64, "Request timed out");
                Err(ClientError::Timeout(budget))
            }
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        let text = resp.text().await.map_err(transport)?;

        if !status.is_success() {
            let err = classify_error(status.as_u16(), &text);
            tracing::debug!(status = status.as_u16(), error = %err, "Elevation request failed");
            return Err(err);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query_str: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<T, ClientError> {
        let req = GraphQLRequest {
            query: query_str.to_string(),
            variables,
        };
        let call = async {
            let gql_resp: GraphQLResponse<T> = self
                .http
                .post(self.url("/graphql"))
                .json(&req)
                .send()
                .await
                .map_err(transport)?
                .json()
                .await
                .map_err(|e| ClientError::Decode(e.to_string()))?;

            if let Some(err) = gql_resp.errors.and_then(|errors| errors.into_iter().next()) {
                return Err(err.into());
            }
            gql_resp
                .data
                .ok_or_else(|| ClientError::Decode("No data returned".to_string()))
        };
        self.with_budget(self.config.request_timeout, call).await
    }

    pub async fn elevation_profile(
        &self,
        points: &[GeoPoint],
        samples: Option<usize>,
    ) -> Result<ProfileResponse, ClientError> {
        let body = ProfileRequest {
            points: points.to_vec(),
            samples,
        };
        self.with_budget(
            self.config.request_timeout,
            self.post_json("/api/elevation/profile/", &body),
        )
        .await
    }

    pub async fn line_of_sight(
        &self,
        request: &LineOfSightRequest,
    ) -> Result<LineOfSightResponse, ClientError> {
        self.with_budget(
            self.config.request_timeout,
            self.post_json("/api/elevation/line-of-sight/", request),
        )
        .await
    }

    /// Radial visibility around `observer`. Uses the longer raytrace budget.
    pub async fn raytrace(
        &self,
        observer: GeoPoint,
        radius: f64,
        observer_height: f64,
    ) -> Result<RaytraceResponse, ClientError> {
        let body = RaytraceRequest {
            observer,
            radius,
            observer_height,
        };
        self.with_budget(
            self.config.raytrace_timeout,
            self.post_json("/api/elevation/raytrace/", &body),
        )
        .await
    }

    pub async fn to_military_grid(
        &self,
        point: GeoPoint,
        precision: Option<u8>,
    ) -> Result<String, ClientError> {
        let resp: MilitaryGridResponse = self
            .query(
                r#"query($point: GeoPointInput!, $precision: Int) { toMilitaryGrid(point: $point, precision: $precision) }"#,
                Some(build_military_grid_variables(point, precision)),
            )
            .await?;
        Ok(resp.to_military_grid)
    }

    pub async fn markers(&self) -> Result<Vec<MarkerData>, ClientError> {
        let resp: MarkersResponse = self
            .query(&format!("query {{ markers {{ {} }} }}", MARKER_FIELDS), None)
            .await?;
        Ok(resp.markers)
    }

    pub async fn create_marker(
        &self,
        name: &str,
        point: GeoPoint,
        affiliation: Option<&str>,
        sidc: Option<&str>,
    ) -> Result<MarkerData, ClientError> {
        let resp: CreateMarkerResponse = self
            .query(
                &format!(
                    "mutation($input: CreateMarkerInput!) {{ createMarker(input: $input) {{ {} }} }}",
                    MARKER_FIELDS
                ),
                Some(build_create_marker_variables(name, point, affiliation, sidc)),
            )
            .await?;
        Ok(resp.create_marker)
    }
}
