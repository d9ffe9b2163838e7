mod assets;
mod config;
mod graphql;
mod routes;
mod sampler;
mod storage;
mod wms;

use std::sync::Arc;
use std::time::Duration;

use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{extract::State, response::Html, routing::get, Router};
use tacmap_shared::visibility::VisibilityEngine;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use config::{Config, ElevationSource};
use graphql::Schema;
use routes::AppState;
use sampler::{HttpElevationSampler, Sampler};

/// Upstream budget for one proxied map tile.
const WMS_TIMEOUT: Duration = Duration::from_secs(15);

async fn graphql_handler(State(schema): State<Schema>, req: GraphQLRequest) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn graphiql() -> Html<String> {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/graphql")
            .finish(),
    )
}

/// Build the full application router.
fn build_app(schema: Schema, state: AppState) -> Router {
    Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .with_state(schema)
        .merge(routes::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

fn build_sampler(config: &Config) -> Result<Sampler, String> {
    match &config.elevation {
        ElevationSource::Grid(path) => Ok(Sampler::Grid(assets::load_grid(path)?)),
        ElevationSource::Remote(url) => {
            tracing::info!(url = %url, "Using remote elevation service");
            Ok(Sampler::Remote(HttpElevationSampler::new(
                url.clone(),
                config.elevation_timeout,
            )?))
        }
    }
}

/// Resolves once Ctrl-C arrives, after cancelling in-flight computations.
async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    token.cancel();
}

async fn run() -> Result<(), String> {
    let config = Config::from_env()?;

    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create database directory: {}", e))?;
    }
    let storage = storage::Storage::open(&config.db_path)?;

    let sampler = build_sampler(&config)?;
    let http = reqwest::Client::builder()
        .timeout(WMS_TIMEOUT)
        .build()
        .map_err(|e| e.to_string())?;
    let shutdown = CancellationToken::new();
    let state = AppState {
        engine: Arc::new(VisibilityEngine::new(sampler, config.visibility.clone())),
        shutdown: shutdown.clone(),
        http,
        wms_base_url: config.wms_base_url.clone(),
    };

    let schema = graphql::build_schema(storage);
    let app = build_app(schema, state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;
    tracing::info!(port = config.port, "Server running at http://localhost:{}", config.port);
    tracing::info!("GraphiQL playground at http://localhost:{}/graphql", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tacmap_backend=info,tower_http=info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server stopped");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tacmap_shared::dem::ElevationGrid;
    use tacmap_shared::visibility::VisibilityConfig;
    use tower::ServiceExt;

    fn test_app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage::Storage::open(&dir.path().join("test.redb")).unwrap();
        let state = AppState {
            engine: Arc::new(VisibilityEngine::new(
                Sampler::Grid(ElevationGrid::flat(60.0, 24.0, 0.1, 21, 21, 10.0)),
                VisibilityConfig::default(),
            )),
            shutdown: CancellationToken::new(),
            http: reqwest::Client::new(),
            wms_base_url: "http://127.0.0.1:9/wms".to_string(),
        };
        (dir, build_app(graphql::build_schema(storage), state))
    }

    #[tokio::test]
    async fn test_graphiql_served_on_get() {
        let (_dir, app) = test_app();
        let resp = app
            .oneshot(Request::builder().uri("/graphql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("graphiql"));
    }

    #[tokio::test]
    async fn test_graphql_post() {
        let (_dir, app) = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/graphql")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"query":"{ toMilitaryGrid(point: {lat: 0, lon: 3}, precision: 0) }"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["toMilitaryGrid"], "31N EA");
    }

    #[tokio::test]
    async fn test_rest_routes_are_mounted() {
        let (_dir, app) = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/elevation/line-of-sight/")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"observer":{"lat":59.0,"lon":25.0},"target":{"lat":59.01,"lon":25.0}}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (_dir, app) = test_app();
        let resp = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_build_sampler_from_grid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");
        let grid = ElevationGrid::flat(59.5, 24.5, 0.01, 3, 3, 1.0);
        std::fs::write(&path, serde_json::to_string(&grid).unwrap()).unwrap();

        let config = Config::from_lookup(|key| match key {
            "DEM_GRID_PATH" => Some(path.display().to_string()),
            _ => None,
        })
        .unwrap();
        assert!(matches!(build_sampler(&config), Ok(Sampler::Grid(_))));
    }
}
