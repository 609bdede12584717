//! The live telemetry register and its partial-update type.
//!
//! The register is a process-wide singleton owned by the session core. Every
//! inbound sensor message mutates it in place; viewers always observe the
//! most recently supplied value per field. Wire field names are camelCase to
//! match the robot's JSON protocol (`roadQuality`, `holesCount`).

use serde::{Deserialize, Serialize};

/// Condition label reported before the robot has sent anything.
pub const UNKNOWN_CONDITION: &str = "UNKNOWN";

/// The single live sensor reading.
///
/// Created once at process start with defaults and never destroyed. Fields
/// update independently: a message carrying only `roadQuality` leaves the
/// other fields untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReading {
    /// Instantaneous road-quality score.
    pub road_quality: f64,
    /// Categorical condition label.
    pub condition: String,
    /// Potholes seen in the current reading.
    pub holes_count: u32,
    /// Last known latitude; 0 until the robot reports a position.
    pub latitude: f64,
    /// Last known longitude; 0 until the robot reports a position.
    pub longitude: f64,
}

impl Default for TelemetryReading {
    fn default() -> Self {
        Self {
            road_quality: 0.0,
            condition: UNKNOWN_CONDITION.to_string(),
            holes_count: 0,
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl TelemetryReading {
    /// Apply a partial update in place.
    ///
    /// `road_quality`, `condition`, and `holes_count` overwrite whenever the
    /// field is present in the message, including zero and empty-string
    /// values. `latitude`/`longitude` overwrite only when present *and*
    /// nonzero: a reported coordinate of exactly 0 is ignored. That is
    /// inherited protocol behavior that connected dashboards rely on, so it
    /// is preserved rather than tightened.
    pub fn apply(&mut self, update: &TelemetryUpdate) {
        if let Some(quality) = update.road_quality {
            self.road_quality = quality;
        }
        if let Some(ref condition) = update.condition {
            self.condition = condition.clone();
        }
        if let Some(holes) = update.holes_count {
            self.holes_count = holes;
        }
        if let Some(lat) = update.latitude
            && lat != 0.0
        {
            self.latitude = lat;
        }
        if let Some(lng) = update.longitude
            && lng != 0.0
        {
            self.longitude = lng;
        }
    }
}

/// A partial sensor update, as sent by the robot over WebSocket or
/// `POST /data`. Every field is optional; missing fields leave the register
/// untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryUpdate {
    /// New road-quality score, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_quality: Option<f64>,
    /// New condition label, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// New pothole count, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holes_count: Option<u32>,
    /// New latitude, if supplied (ignored when exactly 0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// New longitude, if supplied (ignored when exactly 0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}
