//! Message fan-out to connected viewers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use roadsense_core::messages::OutboundMessage;

use super::connection::ViewerChannel;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

/// Fan-out hub over the set of connected viewer channels.
///
/// Delivery is best-effort and at-most-once: a closed or saturated channel
/// is skipped silently and never fails the broadcast for the others. Closed
/// channels are pruned as they are discovered.
pub struct BroadcastHub {
    /// Connected viewers indexed by connection ID.
    viewers: RwLock<HashMap<String, Arc<ViewerChannel>>>,
    /// Atomic counter tracking viewer count (avoids read-locking for count queries).
    active_count: AtomicUsize,
}

impl BroadcastHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            viewers: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a viewer channel.
    pub async fn register(&self, viewer: Arc<ViewerChannel>) {
        let mut viewers = self.viewers.write().await;
        if viewers.insert(viewer.id.clone(), viewer).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a viewer channel by ID. Idempotent.
    pub async fn unregister(&self, viewer_id: &str) {
        let mut viewers = self.viewers.write().await;
        if viewers.remove(viewer_id).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Serialize `message` once and send it to every connected viewer.
    ///
    /// Channels whose receiver is gone are collected and pruned after the
    /// fan-out; channels that are merely full count a drop and move on.
    pub async fn broadcast(&self, message: &OutboundMessage) {
        let json = match serde_json::to_string(message) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(error = %e, "failed to serialize broadcast message");
                return;
            }
        };
        let mut to_remove = Vec::new();
        {
            let viewers = self.viewers.read().await;
            let mut recipients = 0u32;
            for viewer in viewers.values() {
                if viewer.is_closed() {
                    to_remove.push(viewer.id.clone());
                    continue;
                }
                if viewer.send(Arc::clone(&json)) {
                    recipients += 1;
                } else {
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    warn!(viewer_id = %viewer.id, "dropped broadcast message (channel full)");
                }
            }
            debug!(recipients, "broadcast message");
        }
        if !to_remove.is_empty() {
            let mut viewers = self.viewers.write().await;
            for id in &to_remove {
                if viewers.remove(id).is_some() {
                    let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Number of connected viewers.
    pub fn viewer_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
