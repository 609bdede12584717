//! Turn-by-turn routing proxy with an ordered upstream fallback list.
//!
//! Exists so browser clients avoid CORS against the public OSRM servers and
//! so a dead upstream degrades to the next one instead of to an error. The
//! fallback is sequential: one upstream at a time, first success
//! short-circuits, an already-failed upstream is never retried within a
//! request.

use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::metrics::{ROUTE_REQUESTS_TOTAL, ROUTE_UPSTREAM_FAILURES_TOTAL};

/// Fixed OSRM query string: full geometry, GeoJSON, no turn-by-turn steps
/// or annotations (the map only draws the line).
const OSRM_QUERY: &str = "overview=full&geometries=geojson&steps=false&annotations=false";

/// One waypoint in a route request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

/// Body of `POST /route`.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    /// Ordered waypoints; at least 2 required.
    pub points: Vec<RoutePoint>,
}

/// Successful `POST /route` reply: `[lng, lat]` pairs along the route.
#[derive(Debug, Serialize)]
pub struct RouteReply {
    /// Always `true` on this path.
    pub success: bool,
    /// Route geometry as `[lng, lat]` pairs, straight from the upstream.
    pub coordinates: Vec<[f64; 2]>,
}

/// Routing proxy errors — the only externally visible error surface of the
/// relay besides malformed-input silence.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Client sent fewer than 2 waypoints; no upstream is contacted.
    #[error("At least 2 points required")]
    TooFewPoints,
    /// Every upstream in the fallback list failed.
    #[error("Routing services unavailable")]
    Unavailable,
}

/// OSRM response subset: we only need the first route's geometry.
#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// Sequential-fallback client over a fixed ordered upstream list.
pub struct RouteProxy {
    upstreams: Vec<String>,
    client: reqwest::Client,
}

impl RouteProxy {
    /// Create a proxy over `upstreams`, tried in order.
    pub fn new(upstreams: Vec<String>) -> Self {
        Self {
            upstreams,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the best route through `points` from the first upstream that
    /// answers with at least one route.
    pub async fn best_route(&self, points: &[RoutePoint]) -> Result<Vec<[f64; 2]>, RouteError> {
        if points.len() < 2 {
            counter!(ROUTE_REQUESTS_TOTAL, "outcome" => "rejected").increment(1);
            return Err(RouteError::TooFewPoints);
        }

        // OSRM waypoint syntax: lng,lat;lng,lat
        let waypoints = points
            .iter()
            .map(|p| format!("{},{}", p.lng, p.lat))
            .collect::<Vec<_>>()
            .join(";");

        for upstream in &self.upstreams {
            let url = format!("{upstream}/route/v1/driving/{waypoints}?{OSRM_QUERY}");
            match self.client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<OsrmResponse>().await {
                        Ok(body) => {
                            if let Some(route) = body.routes.into_iter().next() {
                                counter!(ROUTE_REQUESTS_TOTAL, "outcome" => "ok").increment(1);
                                info!(upstream = %upstream, "route found");
                                return Ok(route.geometry.coordinates);
                            }
                            counter!(ROUTE_UPSTREAM_FAILURES_TOTAL).increment(1);
                            warn!(upstream = %upstream, "upstream returned no routes");
                        }
                        Err(e) => {
                            counter!(ROUTE_UPSTREAM_FAILURES_TOTAL).increment(1);
                            warn!(upstream = %upstream, error = %e, "upstream body unparsable");
                        }
                    }
                }
                Ok(response) => {
                    counter!(ROUTE_UPSTREAM_FAILURES_TOTAL).increment(1);
                    warn!(
                        upstream = %upstream,
                        status = response.status().as_u16(),
                        "upstream returned non-success status"
                    );
                }
                Err(e) => {
                    counter!(ROUTE_UPSTREAM_FAILURES_TOTAL).increment(1);
                    warn!(upstream = %upstream, error = %e, "failed to reach upstream");
                }
            }
        }

        counter!(ROUTE_REQUESTS_TOTAL, "outcome" => "unavailable").increment(1);
        error!("all routing upstreams failed");
        Err(RouteError::Unavailable)
    }
}
