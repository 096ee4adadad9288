//! WebSocket handling

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::session::Session;
use crate::state::AppState;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(username): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, username, state))
}

/// Handle a WebSocket connection: one session per socket, torn down when
/// the client goes away.
async fn handle_socket(socket: WebSocket, username: String, state: Arc<AppState>) {
    let conn_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    info!(
        component = "websocket",
        event = "ws.connection.opened",
        connection_id = conn_id,
        username = %username,
        "WebSocket connection opened"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Channel for messages bound for this client
    let (outbound_tx, mut outbound_rx) = mpsc::channel(100);

    // Forward serialized wire messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!(
                        component = "websocket",
                        event = "ws.send.serialize_failed",
                        connection_id = conn_id,
                        error = %e,
                        "Failed to serialize wire message"
                    );
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                debug!(
                    component = "websocket",
                    event = "ws.send.disconnected",
                    connection_id = conn_id,
                    "WebSocket send failed, client disconnected"
                );
                break;
            }
        }
    });

    let mut session = Session::new(&username, outbound_tx, state.source(), state.profiles());

    // Startup can block for seconds on a profile scrape or bridge spawn, so
    // keep watching the socket while it runs; a client that leaves
    // mid-startup cancels the rest of it.
    let disconnected = {
        let start = session.start();
        tokio::pin!(start);
        loop {
            tokio::select! {
                _ = &mut start => break false,
                frame = ws_rx.next() => {
                    if let FrameOutcome::Disconnect = classify_frame(frame, conn_id) {
                        break true;
                    }
                }
            }
        }
    };

    // Clients never send commands; the receive loop only detects disconnect.
    if !disconnected {
        loop {
            let frame = ws_rx.next().await;
            if let FrameOutcome::Disconnect = classify_frame(frame, conn_id) {
                break;
            }
        }
    }

    session.teardown();
    send_task.abort();
    info!(
        component = "websocket",
        event = "ws.connection.closed",
        connection_id = conn_id,
        username = %session.username(),
        "WebSocket connection closed"
    );
}

enum FrameOutcome {
    Continue,
    Disconnect,
}

/// Reduce an incoming frame to "still connected" or "gone". Data frames
/// are ignored; pings are answered by the protocol layer.
fn classify_frame(frame: Option<Result<Message, axum::Error>>, conn_id: u64) -> FrameOutcome {
    match frame {
        Some(Ok(Message::Close(_))) => {
            info!(
                component = "websocket",
                event = "ws.connection.close_frame",
                connection_id = conn_id,
                "Client sent close frame"
            );
            FrameOutcome::Disconnect
        }
        Some(Ok(_)) => FrameOutcome::Continue,
        Some(Err(e)) => {
            warn!(
                component = "websocket",
                event = "ws.connection.error",
                connection_id = conn_id,
                error = %e,
                "WebSocket error"
            );
            FrameOutcome::Disconnect
        }
        None => {
            debug!(
                component = "websocket",
                event = "ws.connection.stream_ended",
                connection_id = conn_id,
                "WebSocket stream ended"
            );
            FrameOutcome::Disconnect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_error_and_eof_end_the_connection() {
        assert!(matches!(
            classify_frame(Some(Ok(Message::Close(None))), 1),
            FrameOutcome::Disconnect
        ));
        assert!(matches!(
            classify_frame(
                Some(Err(axum::Error::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset"
                )))),
                1
            ),
            FrameOutcome::Disconnect
        ));
        assert!(matches!(classify_frame(None, 1), FrameOutcome::Disconnect));
    }

    #[test]
    fn data_frames_keep_the_connection_open() {
        assert!(matches!(
            classify_frame(Some(Ok(Message::Text("hello".into()))), 1),
            FrameOutcome::Continue
        ));
        assert!(matches!(
            classify_frame(Some(Ok(Message::Ping(vec![1].into()))), 1),
            FrameOutcome::Continue
        ));
    }
}
