//! # roadsense-server
//!
//! Axum HTTP + WebSocket server for the Roadsense telemetry relay.
//!
//! - [`session::SessionCore`] — the orchestrator: register updates, sample
//!   buffering, session start/stop, aggregation hand-off to storage
//! - [`websocket`] — connection upgrade and the broadcast hub
//! - [`routing::RouteProxy`] — sequential-fallback OSRM proxy
//! - [`http`] — `/data` ingestion/read-back, `/route`, `/metrics`
//!
//! One process serves HTTP and WebSocket on the same port.

#![deny(unsafe_code)]

pub mod http;
pub mod metrics;
pub mod routing;
pub mod session;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routing::RouteProxy;
use crate::session::SessionCore;
use crate::websocket::BroadcastHub;

/// Shared handles behind every request handler.
#[derive(Clone)]
pub struct AppState {
    /// The session core orchestrator.
    pub core: Arc<SessionCore>,
    /// Viewer fan-out hub (also owned by `core`; exposed for the upgrade path).
    pub hub: Arc<BroadcastHub>,
    /// Routing proxy.
    pub proxy: Arc<RouteProxy>,
    /// Prometheus render handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// Build the application router.
///
/// The caller serves it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so connection
/// logging can name the peer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket::connection::ws_handler))
        .route("/data", get(http::get_data).post(http::post_data))
        .route("/route", post(http::post_route))
        .route("/metrics", get(http::get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
