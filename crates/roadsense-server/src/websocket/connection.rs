//! WebSocket upgrade and per-connection read/write loops.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::AppState;
use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// Outbound queue depth per viewer before broadcasts start dropping.
const OUTBOUND_BUFFER: usize = 256;

/// One connected viewer, as seen by the broadcast hub.
///
/// A thin handle over the connection's outbound queue: `send` is synchronous
/// and never blocks; a full or closed queue reports failure and the hub
/// decides what to do with it.
pub struct ViewerChannel {
    /// Connection ID (UUID v7).
    pub id: String,
    tx: mpsc::Sender<Arc<String>>,
}

impl ViewerChannel {
    /// Create a channel handle over an outbound queue.
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self { id, tx }
    }

    /// Queue a serialized message. Returns `false` when the queue is full
    /// or the connection is gone.
    pub fn send(&self, message: Arc<String>) -> bool {
        self.tx.try_send(message).is_ok()
    }

    /// Whether the connection's write loop has terminated.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// `GET /ws` — upgrade to a duplex viewer/worker connection.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

/// Drive one connection until it closes.
///
/// All outbound traffic (connection-time sync included) goes through the
/// viewer's queue so a single writer task owns the socket sink. Inbound text
/// frames feed the session core; everything else is ignored apart from close.
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    info!(client = %addr, "viewer connected");

    let (tx, mut rx) = mpsc::channel::<Arc<String>>(OUTBOUND_BUFFER);
    let viewer = Arc::new(ViewerChannel::new(Uuid::now_v7().to_string(), tx));
    let viewer_id = viewer.id.clone();

    // Connection-time sync: current register snapshot plus recording flag,
    // queued before hub registration so it is always the first frame this
    // viewer sees.
    let hello = state.core.connect_message().await;
    match serde_json::to_string(&hello) {
        Ok(json) => {
            let _ = viewer.send(Arc::new(json));
        }
        Err(e) => debug!(error = %e, "failed to serialize connect sync"),
    }
    state.hub.register(Arc::clone(&viewer)).await;

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(Message::Text(message.as_str().into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => state.core.handle_text(&text).await,
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of
            // the protocol.
            _ => {}
        }
    }

    state.hub.unregister(&viewer_id).await;
    writer.abort();
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    info!(client = %addr, "viewer disconnected");
}
