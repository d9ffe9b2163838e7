use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tacmap_shared::api::{
    ApiErrorBody, LineOfSightRequest, LineOfSightResponse, ProfileRequest, ProfileResponse,
    RaytraceRequest, RaytraceResponse,
};
use tacmap_shared::visibility::VisibilityEngine;
use tacmap_shared::VisibilityError;
use tokio_util::sync::CancellationToken;

use crate::sampler::Sampler;
use crate::wms;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<VisibilityEngine<Sampler>>,
    /// Cancelled on shutdown; each request works under a child token.
    pub shutdown: CancellationToken,
    pub http: reqwest::Client,
    pub wms_base_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Visibility(#[from] VisibilityError),
    #[error("invalid request body: {0}")]
    Body(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Visibility(err) => {
                let status = match err {
                    VisibilityError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    VisibilityError::ElevationUnavailable(_) => StatusCode::BAD_GATEWAY,
                    VisibilityError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, ApiErrorBody::from(err))
            }
            ApiError::Body(_) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    error: self.to_string(),
                    code: "INVALID_REQUEST".to_string(),
                },
            ),
        };
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %body.error, "Elevation request failed");
        }
        (status, Json(body)).into_response()
    }
}

async fn elevation_profile(
    State(state): State<AppState>,
    payload: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let Json(req) = payload?;
    let cancel = state.shutdown.child_token();
    let profile = state
        .engine
        .elevation_profile(&req.points, req.samples, &cancel)
        .await?;
    Ok(Json(profile.into()))
}

async fn line_of_sight(
    State(state): State<AppState>,
    payload: Result<Json<LineOfSightRequest>, JsonRejection>,
) -> Result<Json<LineOfSightResponse>, ApiError> {
    let Json(req) = payload?;
    let cancel = state.shutdown.child_token();
    let result = state
        .engine
        .line_of_sight(
            req.observer,
            req.observer_height,
            req.target,
            req.samples,
            &cancel,
        )
        .await?;
    Ok(Json(result.into()))
}

async fn raytrace(
    State(state): State<AppState>,
    payload: Result<Json<RaytraceRequest>, JsonRejection>,
) -> Result<Json<RaytraceResponse>, ApiError> {
    let Json(req) = payload?;
    let cancel = state.shutdown.child_token();
    let map = state
        .engine
        .radial_visibility(req.observer, req.radius, req.observer_height, &cancel)
        .await?;
    Ok(Json(map.into()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/elevation/profile/", post(elevation_profile))
        .route("/api/elevation/line-of-sight/", post(line_of_sight))
        .route("/api/elevation/raytrace/", post(raytrace))
        .route("/api/wms-proxy/", get(wms::proxy))
        .route("/api/wms-capabilities/", get(wms::capabilities))
        .with_state(state)
}
