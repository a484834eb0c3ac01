//! WebSocket handler for log observers
//!
//! Each connection becomes one broker subscription. The subscription is
//! closed explicitly when either side goes away.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::logs::{LogBroker, LogFrame};

/// Frames queued per observer before the forwarder waits on the socket.
const OBSERVER_QUEUE: usize = 256;

pub async fn ws_handler(ws: WebSocketUpgrade, State(broker): State<Arc<LogBroker>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, broker))
}

async fn handle_socket(socket: WebSocket, broker: Arc<LogBroker>) {
    let (frame_tx, mut frame_rx) = mpsc::channel::<LogFrame>(OBSERVER_QUEUE);
    let subscription = broker.attach(frame_tx).await;
    let id = subscription.id();
    tracing::info!("Log WebSocket connected: {}", id);

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize log frame: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                // Client disconnected
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    // Observers only listen; drain until the client leaves
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Log WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            debug!("Log stream ended for observer {}", id);
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!("Observer {} left", id);
            send_task.abort();
        }
    }

    subscription.close().await;
    tracing::info!("Log WebSocket disconnected: {}", id);
}
