//! The JSON protocol spoken over the duplex viewer/worker channel.
//!
//! Inbound, one JSON object per message: a control command carries
//! `"type": "control"`; anything else is treated as a sensor update.
//! Outbound messages are tagged `sensor_data` / `status_update`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::telemetry::{TelemetryReading, TelemetryUpdate};

/// Control command value that begins a recording session.
pub const COMMAND_START: &str = "start";
/// Control command value that ends a recording session.
pub const COMMAND_STOP: &str = "stop";

/// A worker control message (`{"type":"control", ...}`).
///
/// `command` is kept as a plain string: the original protocol silently
/// ignores unknown commands (while still broadcasting status), so parsing
/// must not reject them.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMessage {
    /// `"start"`, `"stop"`, or anything else (ignored).
    pub command: String,
    /// Road to record against; required for `start` to take effect.
    #[serde(default)]
    pub road_id: Option<String>,
}

/// One parsed inbound message.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    /// Worker start/stop command.
    Control(ControlMessage),
    /// Sensor update (any message without `"type":"control"`).
    Telemetry(TelemetryUpdate),
}

/// Parse one inbound JSON message.
///
/// Dispatches on the `type` field: `"control"` parses as
/// [`ControlMessage`], everything else as [`TelemetryUpdate`]. Errors mean
/// the message is malformed and must be dropped by the caller (logged, no
/// broadcast, connection stays open).
pub fn parse_inbound(text: &str) -> Result<InboundMessage, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("type").and_then(Value::as_str) == Some("control") {
        Ok(InboundMessage::Control(serde_json::from_value(value)?))
    } else {
        Ok(InboundMessage::Telemetry(serde_json::from_value(value)?))
    }
}

/// One outbound broadcast message.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Live register snapshot, sent on every sensor update and (with the
    /// `recording` flag) to each newly connected viewer.
    SensorData {
        /// Register snapshot at send time.
        data: TelemetryReading,
        /// Present only on the connection-time sync message.
        #[serde(skip_serializing_if = "Option::is_none")]
        recording: Option<bool>,
    },
    /// Recording-state change, sent after every control command.
    #[serde(rename_all = "camelCase")]
    StatusUpdate {
        /// Whether a session is active after the command.
        recording: bool,
        /// Active road id, `null` while idle.
        current_road_id: Option<String>,
    },
}
