//! `ClientSocket` lifecycle: a reader task parsing inbound ops and a writer
//! task draining the outbound channel (spec.md §4.5 "Lifecycle").

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::StreamExt;
use tokio::sync::mpsc;

use crate::protocol::{InboundOp, OutboundEnvelope};
use crate::registry::SocketId;

/// WS close code for a protocol violation (RFC 6455 §7.4.1), used when a
/// client sends a message the bus cannot parse (spec.md §7 "Protocol/
/// Contract ... surfaced to the caller at the boundary ... WS close 1003").
const CLOSE_CODE_UNSUPPORTED_DATA: u16 = 1003;

/// A registered socket's send side, held by the bus for dispatch.
#[derive(Clone)]
pub struct ClientSocket {
    pub id: SocketId,
    pub user_id: String,
    sender: mpsc::Sender<OutboundEnvelope>,
}

impl ClientSocket {
    /// Non-blocking enqueue. Returns `false` if the channel is full,
    /// signalling a slow consumer to the caller (spec.md §4.5 "Dispatch").
    pub fn try_send(&self, envelope: OutboundEnvelope) -> bool {
        self.sender.try_send(envelope).is_ok()
    }
}

/// What the reader/writer pair reports back to the bus so it can update
/// its indices.
pub enum SocketEvent {
    Op(SocketId, InboundOp),
    Closed(SocketId, String),
}

/// Spawns the reader and writer halves for one authenticated connection
/// and returns the registered [`ClientSocket`] plus a channel the bus
/// drains for inbound ops and close notifications.
pub fn spawn(
    user_id: String,
    ws: WebSocket,
    send_capacity: usize,
    write_deadline: Duration,
) -> (ClientSocket, mpsc::UnboundedReceiver<SocketEvent>) {
    let id = SocketId::new_v4();
    let (outbound_tx, outbound_rx) = mpsc::channel(send_capacity);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = mpsc::unbounded_channel();

    let (sink, stream) = ws.split();
    tokio::spawn(writer_loop(id, sink, outbound_rx, close_rx, write_deadline));
    tokio::spawn(reader_loop(id, user_id.clone(), stream, events_tx, close_tx));

    (
        ClientSocket {
            id,
            user_id,
            sender: outbound_tx,
        },
        events_rx,
    )
}

async fn writer_loop(
    id: SocketId,
    mut sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<OutboundEnvelope>,
    mut close_rx: mpsc::UnboundedReceiver<(u16, String)>,
    write_deadline: Duration,
) {
    use futures::SinkExt;

    loop {
        tokio::select! {
            biased;
            close = close_rx.recv() => {
                if let Some((code, reason)) = close {
                    tracing::info!(socket_id = %id, code, %reason, "closing socket for protocol violation");
                    let frame = Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    }));
                    let _ = tokio::time::timeout(write_deadline, sink.send(frame)).await;
                }
                break;
            }
            envelope = outbound_rx.recv() => {
                let Some(envelope) = envelope else { break };
                let payload = match serde_json::to_string(&envelope) {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(socket_id = %id, error = %err, "failed to encode outbound envelope");
                        continue;
                    }
                };

                let write = sink.send(Message::Text(payload.into()));
                match tokio::time::timeout(write_deadline, write).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::info!(socket_id = %id, error = %err, "socket write failed, closing");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(socket_id = %id, "socket write deadline exceeded, closing");
                        break;
                    }
                }
            }
        }
    }

    let _ = sink.close().await;
}

async fn reader_loop(
    id: SocketId,
    _user_id: String,
    mut stream: futures::stream::SplitStream<WebSocket>,
    events_tx: mpsc::UnboundedSender<SocketEvent>,
    close_tx: mpsc::UnboundedSender<(u16, String)>,
) {
    let mut close_reason = "reader closed".to_string();

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<InboundOp>(&text) {
                Ok(op) => {
                    if events_tx.send(SocketEvent::Op(id, op)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::debug!(socket_id = %id, error = %err, "malformed inbound message");
                    let _ = close_tx.send((
                        CLOSE_CODE_UNSUPPORTED_DATA,
                        "malformed inbound message".to_string(),
                    ));
                    close_reason = "protocol violation".to_string();
                    break;
                }
            },
            Ok(Message::Close(_)) => {
                close_reason = "client closed".to_string();
                break;
            }
            Ok(_) => {}
            Err(err) => {
                close_reason = err.to_string();
                break;
            }
        }
    }

    let _ = events_tx.send(SocketEvent::Closed(id, close_reason));
}
