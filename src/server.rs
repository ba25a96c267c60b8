//! ==============================================================================
//! server.rs - http surfaces
//! ==============================================================================
//!
//! purpose:
//!     axum routers for the two web-facing components.
//!
//! reading store (port 3001):
//!     POST /api/sensor-data    json update -> { message }
//!                              empty body  -> current snapshot
//!     POST /api/nodeMCU-data   json update -> { message }
//!     GET  /api/sensor-data    current snapshot (after the configured delay)
//!
//! dashboard (port 3000):
//!     GET  /                   html cards rendered from the poller's view
//!     GET  /api/history        poller's view as json
//!
//! relationships:
//!     - uses: store.rs (ReadingStore injected as state)
//!     - uses: poller.rs (SharedView injected as state)
//!     - uses: dashboard.rs (html rendering)
//!
//! ==============================================================================

use crate::dashboard;
use crate::domain::{SensorSnapshot, SensorUpdate};
use crate::error::ApiError;
use crate::poller::{DashboardView, SharedView};
use crate::store::ReadingStore;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, Method},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

// ==============================================================================
// reading store
// ==============================================================================

#[derive(Clone)]
pub struct StoreState {
    pub store: ReadingStore,
    /// latency injected before a snapshot read is answered
    pub response_delay: Duration,
    pub show_sensor_data: bool,
}

#[derive(Debug, Serialize)]
struct Ack {
    message: &'static str,
}

const ACK: Ack = Ack {
    message: "Data received successfully",
};

pub fn store_router(state: StoreState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/sensor-data", get(snapshot_handler).post(sensor_data_handler))
        .route("/api/nodeMCU-data", post(update_handler))
        .layer(cors)
        .with_state(state)
}

/// credentialed cors for one origin, or permissive for "*"
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer> {
    if allowed_origin == "*" {
        return Ok(CorsLayer::permissive());
    }
    let origin = HeaderValue::from_str(allowed_origin)
        .with_context(|| format!("invalid allowed_origin {:?}", allowed_origin))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

async fn snapshot_handler(State(state): State<StoreState>) -> Json<SensorSnapshot> {
    Json(read_snapshot(&state).await)
}

/// POST /api/sensor-data
/// an empty body reads the snapshot, anything else is an update
async fn sensor_data_handler(
    State(state): State<StoreState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Json(read_snapshot(&state).await).into_response());
    }
    apply_update(&state, &body).await.map(IntoResponse::into_response)
}

/// POST /api/nodeMCU-data
async fn update_handler(
    State(state): State<StoreState>,
    body: Bytes,
) -> Result<Json<Ack>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Json(ACK));
    }
    apply_update(&state, &body).await
}

async fn read_snapshot(state: &StoreState) -> SensorSnapshot {
    if !state.response_delay.is_zero() {
        tokio::time::sleep(state.response_delay).await;
    }
    state.store.get_current().await
}

async fn apply_update(state: &StoreState, body: &[u8]) -> Result<Json<Ack>, ApiError> {
    let update = SensorUpdate::from_json(body).inspect_err(|e| {
        tracing::warn!(error = %e, "rejected sensor payload");
    })?;
    let merged = state.store.update(&update).await;
    if state.show_sensor_data {
        tracing::info!(
            soil_temp = merged.soil_temp,
            air_temp = merged.air_temp,
            humidity = merged.humidity,
            soil_moisture = merged.soil_moisture,
            "received sensor data"
        );
    }
    Ok(Json(ACK))
}

// ==============================================================================
// dashboard
// ==============================================================================

pub fn dashboard_router(view: SharedView) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/history", get(history_handler))
        .layer(CorsLayer::permissive())
        .with_state(view)
}

async fn dashboard_handler(State(view): State<SharedView>) -> Html<String> {
    let view = view.read().await;
    Html(dashboard::render(&view))
}

/// json api endpoint for programmatic access
/// returns the poller's history, latest snapshot and notice
async fn history_handler(State(view): State<SharedView>) -> Json<DashboardView> {
    let view = view.read().await;
    Json(view.clone())
}

// ==============================================================================
// serving
// ==============================================================================

/// bind `addr` and serve `app` until `shutdown` resolves
pub async fn run_server<F>(addr: String, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    serve(listener, app, shutdown).await
}

pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryBuffer, RetentionPolicy};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    async fn spawn(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, app, std::future::pending()));
        addr
    }

    async fn spawn_store(delay_ms: u64) -> (SocketAddr, ReadingStore) {
        let store = ReadingStore::default();
        let state = StoreState {
            store: store.clone(),
            response_delay: Duration::from_millis(delay_ms),
            show_sensor_data: false,
        };
        let app = store_router(state, cors_layer("http://localhost:5173").unwrap());
        (spawn(app).await, store)
    }

    #[tokio::test]
    async fn test_get_returns_placeholder_snapshot() {
        let (addr, _) = spawn_store(0).await;
        let snapshot: SensorSnapshot = reqwest::get(format!("http://{}/api/sensor-data", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot, SensorSnapshot::PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_post_update_then_get() {
        let (addr, _) = spawn_store(0).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("http://{}/api/sensor-data", addr))
            .json(&serde_json::json!({ "SoilTemp": 30 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let ack: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(ack["message"], "Data received successfully");

        let snapshot: SensorSnapshot = client
            .get(format!("http://{}/api/sensor-data", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot.soil_temp, 30.0);
        assert_eq!(
            SensorSnapshot { soil_temp: 25.0, ..snapshot },
            SensorSnapshot::PLACEHOLDER
        );
    }

    #[tokio::test]
    async fn test_node_mcu_endpoint_updates_store() {
        let (addr, store) = spawn_store(0).await;
        let resp = reqwest::Client::new()
            .post(format!("http://{}/api/nodeMCU-data", addr))
            .json(&SensorUpdate {
                soil_temp: Some(1.0),
                air_temp: Some(2.0),
                humidity: Some(3.0),
                soil_moisture: Some(4.0),
            })
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let current = store.get_current().await;
        assert_eq!(current.soil_moisture, 4.0);
        assert_eq!(current.ideal_soil_moisture, 41.0);
    }

    #[tokio::test]
    async fn test_empty_post_reads_snapshot() {
        let (addr, store) = spawn_store(0).await;
        store
            .update(&SensorUpdate { humidity: Some(88.0), ..Default::default() })
            .await;

        let snapshot: SensorSnapshot = reqwest::Client::new()
            .post(format!("http://{}/api/sensor-data", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot.humidity, 88.0);
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected() {
        let (addr, store) = spawn_store(0).await;
        let client = reqwest::Client::new();

        for body in ["not json", r#"{"SoilTemp": "warm"}"#, "[30, 1, 2, 3]", "null"] {
            let resp = client
                .post(format!("http://{}/api/nodeMCU-data", addr))
                .header("content-type", "application/json")
                .body(body)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 400);
            let err: serde_json::Value = resp.json().await.unwrap();
            assert!(err["message"].as_str().unwrap().starts_with("malformed"));
        }
        assert_eq!(store.get_current().await, SensorSnapshot::PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_response_delay() {
        let (addr, _) = spawn_store(300).await;
        let started = std::time::Instant::now();
        let resp = reqwest::get(format!("http://{}/api/sensor-data", addr)).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_cors_allows_dashboard_origin() {
        let (addr, _) = spawn_store(0).await;
        let resp = reqwest::Client::new()
            .get(format!("http://{}/api/sensor-data", addr))
            .header("origin", "http://localhost:5173")
            .send()
            .await
            .unwrap();
        let headers = resp.headers();
        assert_eq!(headers["access-control-allow-origin"], "http://localhost:5173");
        assert_eq!(headers["access-control-allow-credentials"], "true");
    }

    #[test]
    fn test_bad_origin_rejected() {
        assert!(cors_layer("http://bad\norigin").is_err());
    }

    #[tokio::test]
    async fn test_history_endpoint() {
        let mut view = DashboardView::new(HistoryBuffer::new(RetentionPolicy::default()));
        view.history.record(&SensorSnapshot::PLACEHOLDER, 1_000);
        let view: SharedView = Arc::new(RwLock::new(view));
        let addr = spawn(dashboard_router(view)).await;

        let json: serde_json::Value = reqwest::get(format!("http://{}/api/history", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["history"]["SoilTemp"][0]["value"], 25.0);
        assert!(json["latest"].is_null());

        let html = reqwest::get(format!("http://{}/", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(html.contains("Plant Environment Dashboard"));
    }
}
