//! HTTP API over the data service and geocoder.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::domain::{CityStats, FetchParams, NetworkType};
use crate::geocode::GeocodingChain;
use crate::osm::{edges_feature_collection, graph_extent};
use crate::service::{DataService, ProgressEvent, ProgressLog};

#[derive(Clone)]
pub struct AppState {
    pub data: Arc<DataService>,
    pub geocoder: Arc<GeocodingChain>,
}

/// Error body shaped as `{"detail": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            ApiError::NotFound(d) => (StatusCode::NOT_FOUND, d),
            ApiError::Internal(d) => (StatusCode::INTERNAL_SERVER_ERROR, d),
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

fn default_network_type() -> String {
    NetworkType::Drive.to_string()
}

fn default_simplify() -> bool {
    true
}

fn default_language() -> String {
    "ru".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    pub city: String,
    #[serde(default = "default_network_type")]
    pub network_type: String,
    #[serde(default = "default_simplify")]
    pub simplify: bool,
}

impl CityQuery {
    fn params(&self) -> Result<FetchParams, ApiError> {
        let network_type = self.network_type.parse().map_err(ApiError::BadRequest)?;
        Ok(FetchParams {
            network_type,
            simplify: self.simplify,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Serialize)]
struct CityResponse {
    city_name: String,
    stats: CityStats,
    params: FetchParams,
    progress: Vec<ProgressEvent>,
}

#[derive(Serialize)]
struct Center {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct GraphResponse {
    bbox: [f64; 4],
    center: Center,
    edges: Value,
    stats: CityStats,
}

#[derive(Serialize)]
struct CoordsResponse {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct AddressResponse {
    address: String,
}

/// Run blocking service code off the async workers
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {}", e)))
}

async fn ping() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn city(
    State(state): State<AppState>,
    Query(query): Query<CityQuery>,
) -> Result<Json<CityResponse>, ApiError> {
    let params = query.params()?;
    let data = state.data.clone();

    let (result, progress) = blocking(move || {
        let log = ProgressLog::new();
        let result = data.get_city_data(&query.city, &params, &log.reporter());
        (result, log.events())
    })
    .await?;

    let bundle = result.map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(CityResponse {
        city_name: bundle.city_name,
        stats: bundle.stats,
        params: bundle.params,
        progress,
    }))
}

async fn graph(
    State(state): State<AppState>,
    Query(query): Query<CityQuery>,
) -> Result<Json<GraphResponse>, ApiError> {
    let params = query.params()?;
    let data = state.data.clone();

    blocking(move || -> Result<Json<GraphResponse>, ApiError> {
        let bundle = data
            .get_city_data(&query.city, &params, &Default::default())
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let extent = graph_extent(&bundle.road_graph)
            .ok_or_else(|| ApiError::NotFound("Graph not found".to_string()))?;

        Ok(Json(GraphResponse {
            bbox: extent.bbox,
            center: Center {
                lat: extent.center_lat,
                lon: extent.center_lon,
            },
            edges: edges_feature_collection(&bundle.road_graph),
            stats: bundle.stats,
        }))
    })
    .await?
}

async fn geocode(
    State(state): State<AppState>,
    Query(query): Query<GeocodeQuery>,
) -> Result<Json<CoordsResponse>, ApiError> {
    let geocoder = state.geocoder.clone();
    let coords = blocking(move || geocoder.address_to_coords(&query.address, query.city.as_deref()))
        .await?;

    let (lat, lon) = coords.ok_or_else(|| ApiError::NotFound("Address not found".to_string()))?;
    Ok(Json(CoordsResponse { lat, lon }))
}

async fn reverse(
    State(state): State<AppState>,
    Query(query): Query<ReverseQuery>,
) -> Result<Json<AddressResponse>, ApiError> {
    let geocoder = state.geocoder.clone();
    let address =
        blocking(move || geocoder.coords_to_address(query.lat, query.lon, &query.language)).await?;

    let address = address.ok_or_else(|| ApiError::NotFound("Address not found".to_string()))?;
    Ok(Json(AddressResponse { address }))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/city", get(city))
        .route("/api/graph", get(graph))
        .route("/api/geocode", get(geocode))
        .route("/api/reverse", get(reverse))
        .layer(cors)
        .with_state(state)
}

/// Serve on an already bound listener until ctrl-c
pub async fn serve_listener(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_listener(listener, state).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
