//! `EventBus`: registration, subscription protocol handling, and dispatch
//! with backpressure (spec.md §4.5).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use dashmap::DashMap;
use qcore_shared::config::EventsConfig;
use qcore_shared::Event;
use tokio::sync::mpsc;

use crate::protocol::{EventKind, InboundOp, OutboundEnvelope};
use crate::registry::{SocketId, SubscriptionIndex};
use crate::socket::{self, ClientSocket, SocketEvent};

struct Inner {
    sockets: DashMap<SocketId, ClientSocket>,
    index: SubscriptionIndex,
    config: EventsConfig,
}

/// Owns every registered socket and the indices used to resolve dispatch
/// recipients. Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("sockets", &self.inner.sockets.len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventsConfig::default())
    }
}

impl EventBus {
    pub fn new(config: EventsConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sockets: DashMap::new(),
                index: SubscriptionIndex::new(),
                config,
            }),
        }
    }

    pub fn connected_sockets(&self) -> usize {
        self.inner.sockets.len()
    }

    /// Always true: the bus itself holds no external connection, only
    /// in-process state (spec.md SPEC_FULL.md §4 "Health reporting").
    pub fn is_healthy(&self) -> bool {
        true
    }

    /// Registers a freshly-authenticated socket (`userId` already
    /// resolved by the caller) and spawns its reader/writer pair
    /// (spec.md §4.5 "Registration", "Lifecycle").
    pub fn accept(&self, user_id: String, ws: WebSocket) -> SocketId {
        let (client, mut events_rx) = socket::spawn(
            user_id.clone(),
            ws,
            self.inner.config.send_channel_capacity,
            Duration::from_millis(self.inner.config.write_deadline_ms),
        );
        let id = client.id;

        self.inner.sockets.insert(id, client);
        self.inner.index.register_user(&user_id, id);

        let bus = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    SocketEvent::Op(socket_id, op) => bus.handle_op(socket_id, op),
                    SocketEvent::Closed(socket_id, reason) => {
                        bus.close(socket_id, &reason);
                        break;
                    }
                }
            }
        });

        id
    }

    fn handle_op(&self, socket_id: SocketId, op: InboundOp) {
        match op {
            InboundOp::Subscribe { kind, security_id } => {
                self.inner.index.subscribe(socket_id, kind, security_id);
            }
            InboundOp::Unsubscribe { kind, security_id } => {
                self.inner.index.unsubscribe(socket_id, kind, security_id);
            }
        }
    }

    fn close(&self, socket_id: SocketId, reason: &str) {
        if let Some((_, client)) = self.inner.sockets.remove(&socket_id) {
            tracing::debug!(socket_id = %socket_id, user_id = %client.user_id, %reason, "socket closed");
            self.inner.index.deregister(&client.user_id, socket_id);
        }
    }

    /// Drains `events` (produced by the alert engine and market stream
    /// adapters) and dispatches each one to its subscribed recipients,
    /// until the channel closes — run this as its own long-lived task.
    pub async fn run(&self, mut events: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event);
        }
    }

    /// Resolves recipients and non-blockingly enqueues to each one,
    /// closing sockets whose channel is full (spec.md §4.5 "Dispatch").
    fn dispatch(&self, event: &Event) {
        let envelope = OutboundEnvelope::from_event(event);

        let recipients = if envelope.kind == EventKind::Alert {
            match event.user_id() {
                Some(user_id) => self.inner.index.sockets_for_user(user_id),
                None => Vec::new(),
            }
        } else {
            self.inner
                .index
                .recipients(envelope.kind, envelope.security_id.as_deref())
        };

        let mut to_close = Vec::new();
        for socket_id in recipients {
            let Some(client) = self.inner.sockets.get(&socket_id) else {
                continue;
            };
            if !client.try_send(envelope.clone()) {
                to_close.push(socket_id);
            }
        }

        for socket_id in to_close {
            tracing::info!(socket_id = %socket_id, "outbound channel full, closing slow consumer");
            metrics::counter!("qcore_events_backpressure_closes_total").increment(1);
            self.close(socket_id, "backpressure");
        }

        metrics::counter!("qcore_events_dispatched_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_healthy_is_always_true() {
        let bus = EventBus::new(qcore_shared::config::EventsConfig::default());
        assert!(bus.is_healthy());
        assert_eq!(bus.connected_sockets(), 0);
    }
}
