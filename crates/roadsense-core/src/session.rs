//! Recording-session state: the active road and its sample buffer.

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetryReading;

/// One buffered snapshot of the live register, captured while a recording
/// session is active. Field names match the storage row layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Road-quality score at capture time.
    pub quality: f64,
    /// Condition label at capture time.
    pub condition: String,
    /// Pothole count at capture time.
    pub holes_count: u32,
    /// Latitude at capture time (0 when the robot never reported one).
    pub latitude: f64,
    /// Longitude at capture time (0 when the robot never reported one).
    pub longitude: f64,
}

impl From<&TelemetryReading> for Sample {
    fn from(reading: &TelemetryReading) -> Self {
        Self {
            quality: reading.road_quality,
            condition: reading.condition.clone(),
            holes_count: reading.holes_count,
            latitude: reading.latitude,
            longitude: reading.longitude,
        }
    }
}

/// Tracks at most one active recording session.
///
/// A session is active iff a road id is set. The buffer grows only while
/// active and preserves arrival order.
#[derive(Debug, Default)]
pub struct SessionTracker {
    road_id: Option<String>,
    buffer: Vec<Sample>,
}

impl SessionTracker {
    /// Create an idle tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a recording session is currently active.
    pub fn is_recording(&self) -> bool {
        self.road_id.is_some()
    }

    /// The road being recorded, if any.
    pub fn road_id(&self) -> Option<&str> {
        self.road_id.as_deref()
    }

    /// Number of buffered samples.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Begin a session for `road_id`, clearing the buffer.
    ///
    /// Calling this while a session is already active replaces it: the old
    /// buffer is discarded without aggregation. That discard is current
    /// product behavior (see the known-behavior test below); do not
    /// auto-aggregate here without a protocol change.
    pub fn start(&mut self, road_id: String) {
        self.road_id = Some(road_id);
        self.buffer.clear();
    }

    /// Append a sample to the active session's buffer. No-op while idle.
    pub fn append(&mut self, sample: Sample) {
        if self.road_id.is_some() {
            self.buffer.push(sample);
        }
    }

    /// End the active session, returning the detached `(road_id, buffer)`
    /// pair. Returns `None` (and changes nothing) while idle. The buffer may
    /// be empty; the caller decides whether that produces a record.
    pub fn stop(&mut self) -> Option<(String, Vec<Sample>)> {
        let road_id = self.road_id.take()?;
        Some((road_id, std::mem::take(&mut self.buffer)))
    }
}
