//! HTTP and WebSocket handlers for the relay.
//!
//! Serves the status and health endpoints and upgrades signaling
//! connections, handing each one to a session.

use crate::config::{Config, CorsConfig};
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::session;
use anyhow::{Context, Result};
use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use relay_core::Hub;
use relay_protocol::ConnectionId;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Router plus connection outboxes.
    pub hub: Hub,
    /// Server configuration.
    pub config: Config,
    started_at: Instant,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            hub: Hub::with_config(config.router_config()),
            config,
            started_at: Instant::now(),
        }
    }
}

/// Body of `GET /`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    status: &'static str,
    message: &'static str,
    active_rooms: usize,
    timestamp: String,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    status: &'static str,
    uptime: f64,
}

/// Build the HTTP application.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/", get(status_handler))
        .route("/health", get(health_handler))
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn run_server(config: Config) -> Result<()> {
    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let state = Arc::new(AppState::new(config));
    let app = build_app(Arc::clone(&state));

    let listener = TcpListener::bind((state.config.host.as_str(), state.config.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                state.config.host, state.config.port
            )
        })?;
    let addr = listener.local_addr()?;

    info!("Signaling server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, state.config.transport.websocket_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if cors.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Status handler.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    Json(StatusReport {
        status: "ok",
        message: "Signaling server is running",
        active_rooms: state.hub.room_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy",
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Some(origin) = headers.get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .is_ok_and(|origin| state.config.cors.allows(origin));
        if !allowed {
            warn!(origin = ?origin, "Rejected WebSocket upgrade from disallowed origin");
            metrics::record_error("origin");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    ws.max_message_size(state.config.websocket_config().hard_limit())
        .on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle an upgraded WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();
    let connection_id = ConnectionId::generate();
    debug!(connection = %connection_id, "WebSocket connected");

    let (source, sink) = relay_transport::websocket::split(socket, &state.config.websocket_config());
    let end = session::run(
        connection_id.clone(),
        source,
        sink,
        &state.hub,
        &state.config.heartbeat,
    )
    .await;

    debug!(connection = %connection_id, reason = ?end, "WebSocket session finished");
}
