//! The session core: the state machine tying the telemetry register, the
//! session tracker, the aggregator, and the broadcast hub together.
//!
//! One exclusive lock covers the register + tracker pair and is held across
//! the read-modify-broadcast of each inbound event, so every message is
//! processed to completion before the next one observes state — the same
//! atomicity the wire protocol has always promised. Storage writes are
//! detached tasks: they never block message processing and their failures
//! are only ever a log line (live-state correctness over persisted-state
//! completeness).

use std::sync::Arc;

use metrics::counter;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use roadsense_core::messages::{
    COMMAND_START, COMMAND_STOP, ControlMessage, InboundMessage, OutboundMessage, parse_inbound,
};
use roadsense_core::{AggregateRecord, Sample, SessionTracker, TelemetryReading, TelemetryUpdate, reduce};
use roadsense_store::{MeasurementStore, RoadStatus};

use crate::metrics::{
    MALFORMED_MESSAGES_TOTAL, SESSIONS_STARTED_TOTAL, SESSIONS_STOPPED_TOTAL,
    STORE_WRITE_FAILURES_TOTAL, TELEMETRY_MESSAGES_TOTAL,
};
use crate::websocket::BroadcastHub;

/// The register + tracker pair behind the core's single lock.
#[derive(Default)]
struct CoreState {
    register: TelemetryReading,
    tracker: SessionTracker,
}

/// Orchestrator for all inbound telemetry and control traffic.
///
/// Runs for the lifetime of the process. Two states: idle (no road id) and
/// recording; inbound telemetry behaves identically in both except for the
/// buffer append.
pub struct SessionCore {
    state: Mutex<CoreState>,
    hub: Arc<BroadcastHub>,
    store: Arc<dyn MeasurementStore>,
}

impl SessionCore {
    /// Create an idle core with a default register.
    pub fn new(hub: Arc<BroadcastHub>, store: Arc<dyn MeasurementStore>) -> Self {
        Self {
            state: Mutex::new(CoreState::default()),
            hub,
            store,
        }
    }

    /// Handle one raw inbound message from the duplex channel.
    ///
    /// Malformed messages are logged and dropped; the connection stays open
    /// and nothing is broadcast.
    pub async fn handle_text(&self, text: &str) {
        match parse_inbound(text) {
            Ok(InboundMessage::Control(control)) => self.handle_control(control).await,
            Ok(InboundMessage::Telemetry(update)) => {
                let _ = self.handle_telemetry(update, "ws").await;
            }
            Err(e) => {
                counter!(MALFORMED_MESSAGES_TOTAL).increment(1);
                warn!(error = %e, "dropping malformed inbound message");
            }
        }
    }

    /// Apply a sensor update: mutate the register, buffer a sample while
    /// recording, broadcast the new snapshot. Returns the snapshot so the
    /// HTTP ingestion path can echo it back.
    pub async fn handle_telemetry(
        &self,
        update: TelemetryUpdate,
        transport: &'static str,
    ) -> TelemetryReading {
        counter!(TELEMETRY_MESSAGES_TOTAL, "transport" => transport).increment(1);
        let mut state = self.state.lock().await;
        state.register.apply(&update);
        let snapshot = state.register.clone();
        if state.tracker.is_recording() {
            state.tracker.append(Sample::from(&snapshot));
            debug!(buffered = state.tracker.buffered(), "buffered measurement");
        }
        self.hub
            .broadcast(&OutboundMessage::SensorData {
                data: snapshot.clone(),
                recording: None,
            })
            .await;
        snapshot
    }

    /// Handle a worker control command and broadcast the resulting status.
    ///
    /// Status is broadcast after every control message, including unknown
    /// commands and a stop while idle — viewers resynchronize on it.
    pub async fn handle_control(&self, control: ControlMessage) {
        let mut state = self.state.lock().await;
        match control.command.as_str() {
            COMMAND_START => match control.road_id.filter(|id| !id.is_empty()) {
                Some(road_id) => self.start_session(&mut state, road_id),
                None => warn!("start command without road id ignored"),
            },
            COMMAND_STOP => self.stop_session(&mut state),
            other => debug!(command = other, "ignoring unknown control command"),
        }
        self.hub
            .broadcast(&OutboundMessage::StatusUpdate {
                recording: state.tracker.is_recording(),
                current_road_id: state.tracker.road_id().map(String::from),
            })
            .await;
    }

    fn start_session(&self, state: &mut CoreState, road_id: String) {
        if state.tracker.is_recording() {
            // Known current behavior: the old session's samples are gone.
            warn!(
                previous_road = state.tracker.road_id().unwrap_or_default(),
                discarded_samples = state.tracker.buffered(),
                "start while recording replaces session, discarding buffer"
            );
        }
        state.tracker.start(road_id.clone());
        counter!(SESSIONS_STARTED_TOTAL).increment(1);
        info!(road_id = %road_id, "recording started");
        self.spawn_status_write(road_id, RoadStatus::Recording);
    }

    fn stop_session(&self, state: &mut CoreState) {
        // Stop while idle: nothing detaches, no storage writes; the status
        // broadcast downstream still announces recording=false.
        let Some((road_id, buffer)) = state.tracker.stop() else {
            return;
        };
        match reduce(&road_id, &buffer) {
            Some(record) => {
                counter!(SESSIONS_STOPPED_TOTAL, "outcome" => "aggregated").increment(1);
                info!(
                    road_id = %road_id,
                    samples = buffer.len(),
                    avg_quality = record.avg_quality,
                    total_holes = record.total_holes,
                    modal_condition = %record.modal_condition,
                    "session aggregated"
                );
                self.spawn_measurement_write(record);
            }
            None => {
                counter!(SESSIONS_STOPPED_TOTAL, "outcome" => "empty").increment(1);
                info!(road_id = %road_id, "session ended with no samples, nothing persisted");
            }
        }
        info!(road_id = %road_id, "recording stopped");
        self.spawn_status_write(road_id, RoadStatus::Idle);
    }

    /// Connection-time sync message: register snapshot plus recording flag.
    pub async fn connect_message(&self) -> OutboundMessage {
        let state = self.state.lock().await;
        OutboundMessage::SensorData {
            data: state.register.clone(),
            recording: Some(state.tracker.is_recording()),
        }
    }

    /// Current register snapshot, no side effects.
    pub async fn snapshot(&self) -> TelemetryReading {
        self.state.lock().await.register.clone()
    }

    /// Fire-and-forget road status write. Completion is observed only by
    /// the log; a slow store never delays the next inbound message.
    fn spawn_status_write(&self, road_id: String, status: RoadStatus) {
        let store = Arc::clone(&self.store);
        let _ = tokio::spawn(async move {
            if let Err(e) = store.set_road_status(&road_id, status).await {
                counter!(STORE_WRITE_FAILURES_TOTAL, "kind" => "road_status").increment(1);
                error!(road_id = %road_id, status = status.as_str(), error = %e, "road status write failed");
            }
        });
    }

    /// Fire-and-forget aggregate insert. Not retried; a failure loses this
    /// measurement but never the live state.
    fn spawn_measurement_write(&self, record: AggregateRecord) {
        let store = Arc::clone(&self.store);
        let _ = tokio::spawn(async move {
            if let Err(e) = store.insert_measurement(&record).await {
                counter!(STORE_WRITE_FAILURES_TOTAL, "kind" => "measurement").increment(1);
                error!(road_id = %record.road_id, error = %e, "aggregate measurement write failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use roadsense_store::StoreError;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    /// One observed storage call.
    #[derive(Clone, Debug, PartialEq)]
    enum StoreCall {
        Status(String, &'static str),
        Insert(AggregateRecord),
    }

    /// Store stub that reports every call over a channel, optionally failing.
    struct StubStore {
        calls: mpsc::UnboundedSender<StoreCall>,
        fail: bool,
    }

    #[async_trait]
    impl MeasurementStore for StubStore {
        async fn set_road_status(
            &self,
            road_id: &str,
            status: RoadStatus,
        ) -> Result<(), StoreError> {
            self.calls
                .send(StoreCall::Status(road_id.to_string(), status.as_str()))
                .unwrap();
            if self.fail {
                return Err(StoreError::Status {
                    status: 500,
                    body: "stub failure".into(),
                });
            }
            Ok(())
        }

        async fn insert_measurement(&self, record: &AggregateRecord) -> Result<(), StoreError> {
            self.calls.send(StoreCall::Insert(record.clone())).unwrap();
            if self.fail {
                return Err(StoreError::Status {
                    status: 500,
                    body: "stub failure".into(),
                });
            }
            Ok(())
        }
    }

    struct Fixture {
        core: SessionCore,
        hub: Arc<BroadcastHub>,
        store_calls: mpsc::UnboundedReceiver<StoreCall>,
    }

    fn fixture_with(fail: bool) -> Fixture {
        let (calls, store_calls) = mpsc::unbounded_channel();
        let hub = Arc::new(BroadcastHub::new());
        let core = SessionCore::new(
            Arc::clone(&hub),
            Arc::new(StubStore { calls, fail }),
        );
        Fixture {
            core,
            hub,
            store_calls,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(false)
    }

    async fn viewer(hub: &BroadcastHub) -> mpsc::Receiver<Arc<String>> {
        let (tx, rx) = mpsc::channel(64);
        hub.register(Arc::new(crate::websocket::ViewerChannel::new(
            "test-viewer".into(),
            tx,
        )))
        .await;
        rx
    }

    async fn next_store_call(fixture: &mut Fixture) -> StoreCall {
        timeout(Duration::from_secs(1), fixture.store_calls.recv())
            .await
            .expect("timed out waiting for store call")
            .expect("store call channel closed")
    }

    async fn assert_no_more_store_calls(fixture: &mut Fixture) {
        // Detached writes are spawned before handle_* returns, so a few
        // scheduler passes are enough for any pending call to land.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        assert!(
            fixture.store_calls.try_recv().is_err(),
            "unexpected extra store call"
        );
    }

    fn parsed(raw: &Arc<String>) -> serde_json::Value {
        serde_json::from_str(raw).unwrap()
    }

    fn telemetry(quality: f64, condition: &str, holes: u32) -> TelemetryUpdate {
        TelemetryUpdate {
            road_quality: Some(quality),
            condition: Some(condition.into()),
            holes_count: Some(holes),
            ..TelemetryUpdate::default()
        }
    }

    async fn start(core: &SessionCore, road_id: &str) {
        core.handle_control(ControlMessage {
            command: COMMAND_START.into(),
            road_id: Some(road_id.into()),
        })
        .await;
    }

    async fn stop(core: &SessionCore) {
        core.handle_control(ControlMessage {
            command: COMMAND_STOP.into(),
            road_id: None,
        })
        .await;
    }

    #[tokio::test]
    async fn telemetry_updates_register_and_broadcasts() {
        let fixture = fixture();
        let mut rx = viewer(&fixture.hub).await;

        let snapshot = fixture
            .core
            .handle_telemetry(telemetry(6.5, "FAIR", 1), "ws")
            .await;
        assert_eq!(snapshot.road_quality, 6.5);

        let msg = parsed(&rx.recv().await.unwrap());
        assert_eq!(msg["type"], "sensor_data");
        assert_eq!(msg["data"]["roadQuality"], 6.5);
        assert_eq!(msg["data"]["condition"], "FAIR");
        assert!(msg.get("recording").is_none());
    }

    #[tokio::test]
    async fn start_marks_road_recording_and_broadcasts_status() {
        let mut fixture = fixture();
        let mut rx = viewer(&fixture.hub).await;

        start(&fixture.core, "road-42").await;

        let msg = parsed(&rx.recv().await.unwrap());
        assert_eq!(msg["type"], "status_update");
        assert_eq!(msg["recording"], true);
        assert_eq!(msg["currentRoadId"], "road-42");

        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-42".into(), "recording")
        );
    }

    #[tokio::test]
    async fn full_session_aggregates_and_persists() {
        let mut fixture = fixture();
        start(&fixture.core, "road-42").await;
        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-42".into(), "recording")
        );

        for (quality, condition, holes) in
            [(1.0, "A", 0), (3.0, "A", 2), (2.0, "B", 1)]
        {
            let _ = fixture
                .core
                .handle_telemetry(telemetry(quality, condition, holes), "ws")
                .await;
        }
        stop(&fixture.core).await;

        // Both detached writes land, in either completion order.
        let mut calls = vec![
            next_store_call(&mut fixture).await,
            next_store_call(&mut fixture).await,
        ];
        calls.sort_by_key(|c| matches!(c, StoreCall::Status(..)));
        let StoreCall::Insert(record) = calls.remove(0) else {
            panic!("expected an insert call");
        };
        assert_eq!(record.road_id, "road-42");
        assert_eq!(record.avg_quality, 2.0);
        assert_eq!(record.total_holes, 3);
        assert_eq!(record.modal_condition, "A");
        assert_eq!(calls[0], StoreCall::Status("road-42".into(), "idle"));
        assert_no_more_store_calls(&mut fixture).await;
    }

    #[tokio::test]
    async fn immediate_stop_skips_aggregate_write() {
        let mut fixture = fixture();
        start(&fixture.core, "road-42").await;
        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-42".into(), "recording")
        );

        stop(&fixture.core).await;

        // Only the idle mark; no measurement insert for an empty buffer.
        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-42".into(), "idle")
        );
        assert_no_more_store_calls(&mut fixture).await;
    }

    #[tokio::test]
    async fn stop_while_idle_broadcasts_status_without_storage_writes() {
        let mut fixture = fixture();
        let mut rx = viewer(&fixture.hub).await;

        stop(&fixture.core).await;

        let msg = parsed(&rx.recv().await.unwrap());
        assert_eq!(msg["type"], "status_update");
        assert_eq!(msg["recording"], false);
        assert_eq!(msg["currentRoadId"], serde_json::Value::Null);
        assert_no_more_store_calls(&mut fixture).await;
    }

    #[tokio::test]
    async fn telemetry_while_idle_is_not_buffered() {
        let mut fixture = fixture();
        let _ = fixture.core.handle_telemetry(telemetry(9.0, "BAD", 3), "ws").await;

        start(&fixture.core, "road-1").await;
        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-1".into(), "recording")
        );
        stop(&fixture.core).await;

        // The pre-session reading never entered the buffer.
        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-1".into(), "idle")
        );
        assert_no_more_store_calls(&mut fixture).await;
    }

    // Known current behavior: re-entrant start drops the first session's
    // samples without persisting them.
    #[tokio::test]
    async fn reentrant_start_discards_unaggregated_buffer() {
        let mut fixture = fixture();
        start(&fixture.core, "road-1").await;
        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-1".into(), "recording")
        );
        let _ = fixture.core.handle_telemetry(telemetry(5.0, "A", 5), "ws").await;

        start(&fixture.core, "road-2").await;
        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-2".into(), "recording")
        );

        let _ = fixture.core.handle_telemetry(telemetry(1.0, "B", 1), "ws").await;
        stop(&fixture.core).await;

        let mut calls = vec![
            next_store_call(&mut fixture).await,
            next_store_call(&mut fixture).await,
        ];
        calls.sort_by_key(|c| matches!(c, StoreCall::Status(..)));
        let StoreCall::Insert(record) = calls.remove(0) else {
            panic!("expected an insert call");
        };
        // Only road-2's sample survived; road-1's buffer was never persisted.
        assert_eq!(record.road_id, "road-2");
        assert_eq!(record.avg_quality, 1.0);
        assert_eq!(record.total_holes, 1);
        assert_no_more_store_calls(&mut fixture).await;
    }

    #[tokio::test]
    async fn start_without_road_id_is_ignored_but_status_still_broadcast() {
        let mut fixture = fixture();
        let mut rx = viewer(&fixture.hub).await;

        fixture
            .core
            .handle_control(ControlMessage {
                command: COMMAND_START.into(),
                road_id: None,
            })
            .await;

        let msg = parsed(&rx.recv().await.unwrap());
        assert_eq!(msg["type"], "status_update");
        assert_eq!(msg["recording"], false);
        assert_no_more_store_calls(&mut fixture).await;
    }

    #[tokio::test]
    async fn empty_road_id_counts_as_missing() {
        let mut fixture = fixture();
        fixture
            .core
            .handle_control(ControlMessage {
                command: COMMAND_START.into(),
                road_id: Some(String::new()),
            })
            .await;
        assert_matches::assert_matches!(
            fixture.core.connect_message().await,
            OutboundMessage::SensorData {
                recording: Some(false),
                ..
            }
        );
        assert_no_more_store_calls(&mut fixture).await;
    }

    #[tokio::test]
    async fn unknown_command_broadcasts_status_and_changes_nothing() {
        let mut fixture = fixture();
        let mut rx = viewer(&fixture.hub).await;

        fixture
            .core
            .handle_control(ControlMessage {
                command: "pause".into(),
                road_id: None,
            })
            .await;

        let msg = parsed(&rx.recv().await.unwrap());
        assert_eq!(msg["type"], "status_update");
        assert_eq!(msg["recording"], false);
        assert_no_more_store_calls(&mut fixture).await;
    }

    #[tokio::test]
    async fn malformed_text_is_dropped_without_broadcast() {
        let fixture = fixture();
        let mut rx = viewer(&fixture.hub).await;

        fixture.core.handle_text("{ not json").await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn handle_text_routes_control_and_telemetry() {
        let mut fixture = fixture();
        let mut rx = viewer(&fixture.hub).await;

        fixture
            .core
            .handle_text(r#"{"type":"control","command":"start","roadId":"road-9"}"#)
            .await;
        let msg = parsed(&rx.recv().await.unwrap());
        assert_eq!(msg["type"], "status_update");
        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-9".into(), "recording")
        );

        fixture.core.handle_text(r#"{"roadQuality":4.2}"#).await;
        let msg = parsed(&rx.recv().await.unwrap());
        assert_eq!(msg["type"], "sensor_data");
        assert_eq!(msg["data"]["roadQuality"], 4.2);
    }

    #[tokio::test]
    async fn storage_failure_does_not_block_state_transitions() {
        let mut fixture = fixture_with(true);
        let mut rx = viewer(&fixture.hub).await;

        start(&fixture.core, "road-1").await;
        let _ = fixture.core.handle_telemetry(telemetry(2.0, "A", 0), "ws").await;
        stop(&fixture.core).await;

        // Every broadcast still happened despite the failing store.
        let statuses: Vec<serde_json::Value> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(parsed)
        .collect();
        assert_eq!(statuses[0]["recording"], true);
        assert_eq!(statuses[1]["type"], "sensor_data");
        assert_eq!(statuses[2]["recording"], false);

        // And a fresh session can start immediately.
        start(&fixture.core, "road-2").await;
        let msg = parsed(&rx.recv().await.unwrap());
        assert_eq!(msg["currentRoadId"], "road-2");
    }

    #[tokio::test]
    async fn connect_message_reflects_recording_state() {
        let mut fixture = fixture();
        assert_matches::assert_matches!(
            fixture.core.connect_message().await,
            OutboundMessage::SensorData {
                recording: Some(false),
                ..
            }
        );

        start(&fixture.core, "road-1").await;
        assert_eq!(
            next_store_call(&mut fixture).await,
            StoreCall::Status("road-1".into(), "recording")
        );
        assert_matches::assert_matches!(
            fixture.core.connect_message().await,
            OutboundMessage::SensorData {
                recording: Some(true),
                ..
            }
        );
    }
}
