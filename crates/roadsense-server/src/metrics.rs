//! Prometheus metrics recorder and metric name constants.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across modules.

/// Viewer connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Viewer disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Broadcast messages dropped total (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Inbound telemetry messages total (counter, labels: transport).
pub const TELEMETRY_MESSAGES_TOTAL: &str = "telemetry_messages_total";
/// Malformed inbound messages dropped total (counter).
pub const MALFORMED_MESSAGES_TOTAL: &str = "malformed_messages_total";
/// Recording sessions started total (counter).
pub const SESSIONS_STARTED_TOTAL: &str = "sessions_started_total";
/// Recording sessions stopped total (counter, labels: outcome).
pub const SESSIONS_STOPPED_TOTAL: &str = "sessions_stopped_total";
/// Storage write failures total (counter, labels: kind).
pub const STORE_WRITE_FAILURES_TOTAL: &str = "store_write_failures_total";
/// Route proxy requests total (counter, labels: outcome).
pub const ROUTE_REQUESTS_TOTAL: &str = "route_requests_total";
/// Route upstream failures total (counter).
pub const ROUTE_UPSTREAM_FAILURES_TOTAL: &str = "route_upstream_failures_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_BROADCAST_DROPS_TOTAL,
            TELEMETRY_MESSAGES_TOTAL,
            MALFORMED_MESSAGES_TOTAL,
            SESSIONS_STARTED_TOTAL,
            SESSIONS_STOPPED_TOTAL,
            STORE_WRITE_FAILURES_TOTAL,
            ROUTE_REQUESTS_TOTAL,
            ROUTE_UPSTREAM_FAILURES_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
