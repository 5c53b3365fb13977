use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::error::NetConfigError;
use crate::models::{HotspotConfigRequest, InterfaceConfig};
use crate::service::NetworkService;

/// Error body: `{"error": "..."}`, plus the partial record when only the
/// hardware lookup of an interface failed.
pub enum ApiError {
    Service(NetConfigError),
    BadRequest(String),
    Internal(String),
}

impl From<NetConfigError> for ApiError {
    fn from(e: NetConfigError) -> Self {
        ApiError::Service(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

fn status_for(err: &NetConfigError) -> StatusCode {
    match err {
        NetConfigError::InterfaceNotFound(_) => StatusCode::NOT_FOUND,
        NetConfigError::Validation(_) => StatusCode::BAD_REQUEST,
        NetConfigError::UnsupportedPlatform(_) => StatusCode::NOT_IMPLEMENTED,
        NetConfigError::Configuration { source, .. } => status_for(source),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message })),
            ApiError::Service(e) => {
                let message = e.to_string();
                match e {
                    NetConfigError::HardwareUnavailable { partial, .. } => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "error": message, "interface": partial }),
                    ),
                    other => (status_for(&other), json!({ "error": message })),
                }
            }
        };
        if status.is_server_error() {
            error!("Request failed: {}", body);
        }
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Runs a blocking service call off the async workers.
async fn blocking<T, F>(service: &Arc<NetworkService>, op: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&NetworkService) -> crate::Result<T> + Send + 'static,
{
    let service = service.clone();
    tokio::task::spawn_blocking(move || op(&service))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

pub fn router(service: Arc<NetworkService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/interfaces", get(list_interfaces))
        .route("/api/v1/interfaces/:name", get(get_interface))
        .route("/api/v1/interfaces/:name/ipv4", put(configure_ipv4))
        .route("/api/v1/interfaces/:name/ipv6", put(configure_ipv6))
        .route("/api/v1/interfaces/:name/hotspots", get(scan_hotspots))
        .route("/api/v1/interfaces/:name/connect", post(connect_wifi))
        .route("/api/v1/connectivity", get(check_connectivity))
        .route("/api/v1/hotspot", get(hotspot_status).post(configure_hotspot))
        .route("/api/v1/hotspot/status", put(set_hotspot_status))
        .layer(cors)
        .with_state(service)
}

/// Serves the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    service: Arc<NetworkService>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(service);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn run_server(
    service: Arc<NetworkService>,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://localhost:{}", port);
    serve(listener, service, shutdown).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_interfaces(State(service): State<Arc<NetworkService>>) -> ApiResult<impl IntoResponse> {
    let interfaces = blocking(&service, |s| s.list_interfaces_fast()).await?;
    Ok(Json(interfaces))
}

async fn get_interface(
    State(service): State<Arc<NetworkService>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let record = blocking(&service, move |s| s.get_interface(&name)).await?;
    Ok(Json(record))
}

async fn configure_ipv4(
    State(service): State<Arc<NetworkService>>,
    Path(name): Path<String>,
    body: Result<Json<InterfaceConfig>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    let ipv4 = request
        .ipv4_config
        .ok_or_else(|| ApiError::BadRequest("missing ipv4_config".to_string()))?;
    let config = InterfaceConfig {
        ipv4_config: Some(ipv4),
        ipv6_config: None,
    };
    blocking(&service, move |s| s.configure_interface(&name, &config)).await?;
    Ok(StatusCode::OK)
}

async fn configure_ipv6(
    State(service): State<Arc<NetworkService>>,
    Path(name): Path<String>,
    body: Result<Json<InterfaceConfig>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    let ipv6 = request
        .ipv6_config
        .ok_or_else(|| ApiError::BadRequest("missing ipv6_config".to_string()))?;
    let config = InterfaceConfig {
        ipv4_config: None,
        ipv6_config: Some(ipv6),
    };
    blocking(&service, move |s| s.configure_interface(&name, &config)).await?;
    Ok(StatusCode::OK)
}

async fn scan_hotspots(
    State(service): State<Arc<NetworkService>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let networks = blocking(&service, move |s| s.scan_wifi(&name)).await?;
    Ok(Json(networks))
}

#[derive(Deserialize)]
struct ConnectRequest {
    ssid: String,
    #[serde(default)]
    password: String,
}

async fn connect_wifi(
    State(service): State<Arc<NetworkService>>,
    Path(name): Path<String>,
    body: Result<Json<ConnectRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    blocking(&service, move |s| s.connect_wifi(&name, &request.ssid, &request.password)).await?;
    Ok(Json(json!({ "message": "Connected" })))
}

#[derive(Deserialize)]
struct ConnectivityQuery {
    target: Option<String>,
}

async fn check_connectivity(
    State(service): State<Arc<NetworkService>>,
    Query(query): Query<ConnectivityQuery>,
) -> ApiResult<impl IntoResponse> {
    let result = blocking(&service, move |s| Ok(s.check_connectivity(query.target.as_deref()))).await?;
    Ok(Json(result))
}

async fn hotspot_status(State(service): State<Arc<NetworkService>>) -> ApiResult<impl IntoResponse> {
    let status = blocking(&service, |s| s.get_hotspot_status()).await?;
    Ok(Json(status))
}

async fn configure_hotspot(
    State(service): State<Arc<NetworkService>>,
    body: Result<Json<HotspotConfigRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body?;
    blocking(&service, move |s| s.configure_hotspot(&request)).await?;
    Ok(Json(json!({ "message": "Hotspot configured" })))
}

#[derive(Deserialize)]
struct HotspotState {
    enabled: bool,
}

async fn set_hotspot_status(
    State(service): State<Arc<NetworkService>>,
    body: Result<Json<HotspotState>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(HotspotState { enabled }) = body?;
    blocking(&service, move |s| s.set_hotspot_enabled(enabled)).await?;
    let message = if enabled { "Hotspot enabled" } else { "Hotspot disabled" };
    Ok(Json(json!({ "message": message })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectivityConfig;
    use crate::error::ConfigStep;
    use crate::hotspot::HotspotController;
    use crate::interface::fake::{link, StaticLinks};
    use crate::interface::{InterfaceFilter, NetworkEngine};
    use crate::monitor::MonitorSettings;
    use crate::platform::Platform;
    use crate::runner::fake::ScriptedRunner;

    fn service() -> Arc<NetworkService> {
        let runner = Arc::new(ScriptedRunner::new());
        let engine = NetworkEngine::new(
            runner.clone(),
            Arc::new(StaticLinks(vec![link("eth0", "00:11:22:33:44:55", &[])])),
            Platform::Linux,
            InterfaceFilter::default(),
        );
        let hotspot = Arc::new(HotspotController::new(runner, None, None, false));
        Arc::new(NetworkService::new(
            engine,
            hotspot,
            MonitorSettings::default(),
            ConnectivityConfig::default(),
        ))
    }

    async fn start() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve(listener, service(), std::future::pending()));
        base
    }

    /// Blocking request; returns status and parsed body.
    async fn request(method: &'static str, url: String, body: Option<&'static str>) -> (u16, serde_json::Value) {
        tokio::task::spawn_blocking(move || {
            let req = ureq::request(method, &url).set("Content-Type", "application/json");
            let result = match body {
                Some(body) => req.send_string(body),
                None => req.call(),
            };
            let response = match result {
                Ok(resp) => resp,
                Err(ureq::Error::Status(_, resp)) => resp,
                Err(e) => panic!("transport error: {}", e),
            };
            let status = response.status();
            let text = response.into_string().unwrap();
            (status, serde_json::from_str(&text).unwrap_or(serde_json::Value::Null))
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn health_and_error_mapping() {
        let base = start().await;

        let (status, body) = request("GET", format!("{}/health", base), None).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");

        let (status, body) = request("GET", format!("{}/api/v1/interfaces/nonexistent", base), None).await;
        assert_eq!(status, 404);
        assert!(body["error"].as_str().unwrap().contains("nonexistent"));

        let (status, _) = request("GET", format!("{}/api/v1/hotspot", base), None).await;
        assert_eq!(status, 501);

        let (status, _) = request(
            "POST",
            format!("{}/api/v1/hotspot", base),
            Some(r#"{"ssid": "Hotspot", "password": "short"}"#),
        )
        .await;
        assert_eq!(status, 400);

        let (status, body) = request("PUT", format!("{}/api/v1/interfaces/eth0/ipv4", base), Some("{}")).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "missing ipv4_config");

        let (status, _) = request("PUT", format!("{}/api/v1/hotspot/status", base), Some("not json")).await;
        assert_eq!(status, 400);
    }

    #[test]
    fn nested_causes_decide_the_status() {
        let err = NetConfigError::configuration(
            ConfigStep::Ipv4,
            NetConfigError::Validation("bad mask".to_string()),
        );
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);

        let err = NetConfigError::configuration(
            ConfigStep::Ipv6,
            NetConfigError::CommandFailed {
                command: "nmcli".to_string(),
                detail: "denied".to_string(),
            },
        );
        assert_eq!(status_for(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
