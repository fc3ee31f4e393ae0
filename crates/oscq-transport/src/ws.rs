use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use oscq_core::{ConnectionId, FeedbackSink, ProtocolRouter};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Feedback packets queued per connection before new ones are dropped.
const FEEDBACK_QUEUE: usize = 256;

/// Hands feedback packets to the connection's writer task.
struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl FeedbackSink for ChannelSink {
    fn send(&self, packet: Bytes) -> bool {
        match self.tx.try_send(packet) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("WebSocket: feedback queue full, dropping packet");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Command {
    #[serde(rename = "COMMAND")]
    command: String,
    #[serde(rename = "DATA")]
    data: String,
}

fn handle_command(router: &ProtocolRouter, id: ConnectionId, text: &str) {
    let cmd: Command = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(e) => {
            tracing::warn!("WebSocket: {} sent malformed command: {}", id, e);
            return;
        }
    };
    match cmd.command.as_str() {
        "LISTEN" => router.listen(id, &cmd.data),
        "IGNORE" => router.ignore(id, &cmd.data),
        other => tracing::warn!("WebSocket: {} sent unknown command {}", id, other),
    }
}

/// Drives one subscriber connection until either side closes it or the
/// server shuts down. Its subscriptions are gone by the time this returns.
pub async fn serve_connection(socket: WebSocket, router: Arc<ProtocolRouter>, mut shutdown: watch::Receiver<bool>) {
    let (tx, mut rx) = mpsc::channel::<Bytes>(FEEDBACK_QUEUE);
    let id = router.open_connection(Arc::new(ChannelSink { tx }));
    let (mut write, mut read) = socket.split();
    tracing::info!("WebSocket: {} connected", id);

    loop {
        tokio::select! {
            Some(packet) = rx.recv() => {
                if write.send(Message::Binary(packet.to_vec())).await.is_err() {
                    tracing::debug!("WebSocket: {} write failed", id);
                    break;
                }
            }

            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_command(&router, id, &text),
                Some(Ok(Message::Binary(data))) => {
                    if let Err(e) = router.handle_packet(&data) {
                        tracing::debug!("WebSocket: {} sent an unroutable frame: {}", id, e);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("WebSocket: {} read failed: {}", id, e);
                    break;
                }
            },

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    router.on_connection_closed(id);
    tracing::info!("WebSocket: {} disconnected", id);
}
