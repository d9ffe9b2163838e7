//! Pass-through to the national WMS map services.

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::routes::AppState;

/// Map services the proxy forwards to; anything else falls back to the first.
pub const WMS_SERVICES: [&str; 3] = ["fotokaart", "alus", "kaart"];

/// How much of an unparseable capabilities document is echoed back.
const RAW_XML_LIMIT: usize = 5000;

fn resolve_service(requested: &str) -> &'static str {
    WMS_SERVICES
        .iter()
        .find(|s| **s == requested)
        .copied()
        .unwrap_or(WMS_SERVICES[0])
}

/// Forward a WMS tile request to the national map service.
///
/// `service_path` picks the service; every other query parameter is passed
/// through unchanged. The upstream body and content type come back with a
/// 200 whatever the upstream status; only transport failures are errors.
pub async fn proxy(
    State(state): State<AppState>,
    Query(mut params): Query<Vec<(String, String)>>,
) -> Response {
    let requested = params
        .iter()
        .find(|(k, _)| k == "service_path")
        .map(|(_, v)| v.as_str())
        .unwrap_or(WMS_SERVICES[0]);
    let service = resolve_service(requested);
    params.retain(|(k, _)| k != "service_path");

    let url = format!("{}/{}", state.wms_base_url, service);
    let upstream = match state.http.get(&url).query(&params).send().await {
        Ok(resp) => resp,
        Err(e) => return proxy_error(e),
    };
    if !upstream.status().is_success() {
        tracing::debug!(status = %upstream.status(), service, "WMS upstream returned an error page");
    }
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("image/png"));
    match upstream.bytes().await {
        Ok(body) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => proxy_error(e),
    }
}

fn proxy_error(e: reqwest::Error) -> Response {
    tracing::warn!(error = %e, "WMS proxy request failed");
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, "text/plain")],
        format!("Proxy Error: {}", e),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct CapabilitiesQuery {
    service: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WmsLayer {
    pub name: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub service: String,
    pub url: String,
    pub layers: Vec<WmsLayer>,
    /// Start of the upstream document when no layers could be read from it.
    pub raw_xml: Option<String>,
}

fn child_text(node: roxmltree::Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
        .and_then(|c| c.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Named layers of a WMS capabilities document, in document order.
///
/// Only layers with their own `Name` child are listed; the title falls back
/// to the name. Works for both namespaced (1.3.0) and bare (1.1.1) documents.
/// Anything that does not parse yields no layers.
pub fn parse_layers(xml: &str) -> Vec<WmsLayer> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = match roxmltree::Document::parse_with_options(xml, options) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!(error = %e, "Capabilities document did not parse");
            return Vec::new();
        }
    };

    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Layer")
        .filter_map(|layer| {
            let name = child_text(layer, "Name")?;
            let title = child_text(layer, "Title").unwrap_or_else(|| name.clone());
            Some(WmsLayer { name, title })
        })
        .collect()
}

/// List the layers a map service offers.
pub async fn capabilities(
    State(state): State<AppState>,
    Query(query): Query<CapabilitiesQuery>,
) -> Response {
    let requested = query
        .service
        .unwrap_or_else(|| WMS_SERVICES[0].to_string());
    let url = format!("{}/{}", state.wms_base_url, resolve_service(&requested));

    let fetched = async {
        state
            .http
            .get(&url)
            .query(&[
                ("SERVICE", "WMS"),
                ("REQUEST", "GetCapabilities"),
                ("VERSION", "1.1.1"),
            ])
            .send()
            .await?
            .text()
            .await
    };
    let text = match fetched.await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, url = %url, "WMS capabilities request failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let layers = parse_layers(&text);
    let raw_xml = layers
        .is_empty()
        .then(|| text.chars().take(RAW_XML_LIMIT).collect());
    tracing::debug!(service = %requested, layers = layers.len(), "WMS capabilities fetched");

    Json(Capabilities {
        service: requested,
        url,
        layers,
        raw_xml,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::Router;
    use serde_json::Value;
    use tacmap_shared::dem::ElevationGrid;
    use tacmap_shared::visibility::{VisibilityConfig, VisibilityEngine};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::routes::router;
    use crate::sampler::Sampler;

    const CAPABILITIES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE WMT_MS_Capabilities SYSTEM "http://schemas.opengis.net/wms/1.1.1/capabilities_1_1_1.dtd">
<WMT_MS_Capabilities version="1.1.1">
  <Capability>
    <Layer>
      <Title>Maa-amet</Title>
      <Layer queryable="1"><Name>of10000</Name><Title>Ortofoto</Title></Layer>
      <Layer><Name>BAASKAART</Name></Layer>
    </Layer>
  </Capability>
</WMT_MS_Capabilities>"#;

    fn test_app(wms_base_url: &str) -> Router {
        router(AppState {
            engine: Arc::new(VisibilityEngine::new(
                Sampler::Grid(ElevationGrid::flat(59.2, 24.9, 0.01, 3, 3, 0.0)),
                VisibilityConfig::default(),
            )),
            shutdown: CancellationToken::new(),
            http: reqwest::Client::new(),
            wms_base_url: wms_base_url.to_string(),
        })
    }

    /// Upstream stand-in. Capabilities requests get a document (garbage for
    /// `kaart`), a MISSING layer on `alus` is a 404, anything else echoes
    /// path and query.
    async fn spawn_wms() -> String {
        let app = Router::new().fallback(|req: Request<Body>| async move {
            let path = req.uri().path().to_string();
            let query = req.uri().query().unwrap_or_default().to_string();
            if query.contains("REQUEST=GetCapabilities") {
                let body = if path.ends_with("/kaart") {
                    "<html>maintenance</html".to_string()
                } else {
                    CAPABILITIES_XML.to_string()
                };
                return (StatusCode::OK, [(header::CONTENT_TYPE, "application/xml")], body);
            }
            if path.ends_with("/alus") && query.contains("MISSING") {
                return (
                    StatusCode::NOT_FOUND,
                    [(header::CONTENT_TYPE, "application/vnd.ogc.se_xml")],
                    "<ServiceException>LayerNotDefined</ServiceException>".to_string(),
                );
            }
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "image/jpeg")],
                format!("{}?{}", path, query),
            )
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/wms", addr)
    }

    async fn get_text(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_parse_layers_skips_unnamed_groups() {
        assert_eq!(
            parse_layers(CAPABILITIES_XML),
            vec![
                WmsLayer {
                    name: "of10000".to_string(),
                    title: "Ortofoto".to_string()
                },
                WmsLayer {
                    name: "BAASKAART".to_string(),
                    title: "BAASKAART".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_layers_namespaced() {
        let xml = r#"<WMS_Capabilities xmlns="http://www.opengis.net/wms" version="1.3.0">
            <Capability><Layer><Name>alus</Name><Title>Aluskaart</Title></Layer></Capability>
        </WMS_Capabilities>"#;
        let layers = parse_layers(xml);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].title, "Aluskaart");
    }

    #[test]
    fn test_parse_layers_garbage_is_empty() {
        assert!(parse_layers("not xml at all").is_empty());
        assert!(parse_layers("<Capability/>").is_empty());
    }

    #[tokio::test]
    async fn test_proxy_forwards_query() {
        let app = test_app(&spawn_wms().await);
        let (status, content_type, body) = get_text(
            app,
            "/api/wms-proxy/?service_path=alus&LAYERS=BAASKAART&BBOX=1,2,3,4",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("image/jpeg"));
        assert!(body.starts_with("/wms/alus?"));
        assert!(body.contains("LAYERS=BAASKAART"));
        assert!(!body.contains("service_path"));
    }

    #[tokio::test]
    async fn test_proxy_unknown_service_falls_back() {
        let app = test_app(&spawn_wms().await);
        let (_, _, body) = get_text(app, "/api/wms-proxy/?service_path=secret").await;
        assert!(body.starts_with("/wms/fotokaart?"));
    }

    #[tokio::test]
    async fn test_proxy_relays_upstream_error_page_as_ok() {
        let app = test_app(&spawn_wms().await);
        let (status, content_type, body) =
            get_text(app, "/api/wms-proxy/?service_path=alus&LAYERS=MISSING").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/vnd.ogc.se_xml"));
        assert!(body.contains("LayerNotDefined"));
    }

    #[tokio::test]
    async fn test_proxy_unreachable_is_502() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let app = test_app("http://127.0.0.1:9/wms");
        let (status, content_type, body) = get_text(app, "/api/wms-proxy/").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(content_type.as_deref(), Some("text/plain"));
        assert!(body.starts_with("Proxy Error"));
    }

    #[tokio::test]
    async fn test_capabilities_lists_layers() {
        let base = spawn_wms().await;
        let app = test_app(&base);
        let (status, _, body) = get_text(app, "/api/wms-capabilities/?service=alus").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["service"], "alus");
        assert_eq!(json["url"], format!("{}/alus", base));
        assert_eq!(json["layers"][0]["name"], "of10000");
        assert_eq!(json["layers"][1]["title"], "BAASKAART");
        assert!(json["raw_xml"].is_null());
    }

    #[tokio::test]
    async fn test_capabilities_defaults_and_falls_back() {
        let base = spawn_wms().await;
        let (_, _, body) = get_text(test_app(&base), "/api/wms-capabilities/").await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["service"], "fotokaart");

        let (_, _, body) = get_text(test_app(&base), "/api/wms-capabilities/?service=secret").await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["service"], "secret");
        assert_eq!(json["url"], format!("{}/fotokaart", base));
    }

    #[tokio::test]
    async fn test_capabilities_unparseable_returns_raw_xml() {
        let app = test_app(&spawn_wms().await);
        let (status, _, body) = get_text(app, "/api/wms-capabilities/?service=kaart").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["layers"].as_array().unwrap().len(), 0);
        assert_eq!(json["raw_xml"], "<html>maintenance</html");
    }

    #[tokio::test]
    async fn test_capabilities_unreachable_is_502_json() {
        let app = test_app("http://127.0.0.1:9/wms");
        let (status, _, body) = get_text(app, "/api/wms-capabilities/").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert!(json["error"].is_string());
    }
}
