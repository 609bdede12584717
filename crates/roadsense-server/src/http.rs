//! Plain HTTP surface: telemetry ingestion/read-back for robots that cannot
//! hold a WebSocket open, the routing proxy endpoint, and `/metrics`.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use roadsense_core::{TelemetryReading, TelemetryUpdate};

use crate::AppState;
use crate::routing::{RouteError, RouteReply, RouteRequest};

/// Reply to `POST /data`: acknowledgement plus the register as it stands
/// after the update.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Always `"success"` — a parsed body is always applied.
    pub status: &'static str,
    /// Register snapshot after this update.
    pub received: TelemetryReading,
}

/// `GET /data` — current register snapshot, no side effect.
pub async fn get_data(State(state): State<AppState>) -> Json<TelemetryReading> {
    Json(state.core.snapshot().await)
}

/// `POST /data` — HTTP telemetry ingestion.
///
/// Identical register-update and buffer-append semantics as the WebSocket
/// path, including the broadcast to connected viewers.
pub async fn post_data(
    State(state): State<AppState>,
    Json(update): Json<TelemetryUpdate>,
) -> Json<IngestResponse> {
    let received = state.core.handle_telemetry(update, "http").await;
    Json(IngestResponse {
        status: "success",
        received,
    })
}

/// `POST /route` — proxy a route request through the upstream fallback list.
pub async fn post_route(
    State(state): State<AppState>,
    Json(request): Json<RouteRequest>,
) -> Response {
    match state.proxy.best_route(&request.points).await {
        Ok(coordinates) => Json(RouteReply {
            success: true,
            coordinates,
        })
        .into_response(),
        Err(e @ RouteError::TooFewPoints) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e @ RouteError::Unavailable) => {
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": e.to_string() }))).into_response()
        }
    }
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn get_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
