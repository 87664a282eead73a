//! Subscription indices (spec.md §4.5 "Registration", "Dispatch").
//!
//! `bySecurity[kind][securityId]` and `byUser[userId]` are concurrent maps
//! of socket ids, following the same `DashMap`-of-sets shape a subscription
//! manager uses to avoid a single global lock on every (un)subscribe.

use dashmap::{DashMap, DashSet};

use crate::protocol::{EventKind, SecurityRef};

pub type SocketId = uuid::Uuid;

/// One subscription key: an event kind plus a specific security or the
/// wildcard.
pub type SubscriptionKey = (EventKind, SecurityRef);

/// Tracks which sockets are registered for which users and which
/// subscriptions, independent of the sockets' own send channels.
#[derive(Default)]
pub struct SubscriptionIndex {
    by_user: DashMap<String, DashSet<SocketId>>,
    by_security: DashMap<SubscriptionKey, DashSet<SocketId>>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_user(&self, user_id: &str, socket_id: SocketId) {
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(socket_id);
    }

    pub fn subscribe(&self, socket_id: SocketId, kind: EventKind, security_id: SecurityRef) {
        self.by_security
            .entry((kind, security_id))
            .or_default()
            .insert(socket_id);
    }

    pub fn unsubscribe(&self, socket_id: SocketId, kind: EventKind, security_id: SecurityRef) {
        if let Some(sockets) = self.by_security.get(&(kind, security_id)) {
            sockets.remove(&socket_id);
        }
    }

    /// Every socket subscribed to `kind`/`security_id` directly, unioned
    /// with every socket subscribed to `kind`'s wildcard (spec.md §4.5
    /// "Dispatch": `bySecurity[kind][securityId] ∪ bySecurity[kind]["*"]`).
    pub fn recipients(&self, kind: EventKind, security_id: Option<&str>) -> Vec<SocketId> {
        let mut out = std::collections::HashSet::new();

        if let Some(id) = security_id {
            if let Some(sockets) = self.by_security.get(&(kind, SecurityRef::id(id))) {
                out.extend(sockets.iter().map(|s| *s));
            }
        }
        if let Some(sockets) = self.by_security.get(&(kind, SecurityRef::wildcard())) {
            out.extend(sockets.iter().map(|s| *s));
        }

        out.into_iter().collect()
    }

    /// Every socket registered for `user_id` (spec.md §4.5 "Registration":
    /// `byUser[userId]`) — used to route `Alert` events, which are
    /// addressed to a user rather than broadcast by security id.
    pub fn sockets_for_user(&self, user_id: &str) -> Vec<SocketId> {
        self.by_user
            .get(user_id)
            .map(|sockets| sockets.iter().map(|s| *s).collect())
            .unwrap_or_default()
    }

    /// Drop every trace of `socket_id` from every index — called on socket
    /// close (spec.md §3 "ClientSocket" lifecycle: "deregistered from all
    /// subscription indices on close").
    pub fn deregister(&self, user_id: &str, socket_id: SocketId) {
        if let Some(sockets) = self.by_user.get(user_id) {
            sockets.remove(&socket_id);
        }
        for entry in self.by_security.iter() {
            entry.value().remove(&socket_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_subscription_is_unioned_with_direct() {
        let index = SubscriptionIndex::new();
        let a = SocketId::new_v4();
        let b = SocketId::new_v4();

        index.subscribe(a, EventKind::Quote, SecurityRef::id("AAPL"));
        index.subscribe(b, EventKind::Quote, SecurityRef::id("AAPL"));
        index.subscribe(b, EventKind::Quote, SecurityRef::wildcard());

        let recipients = index.recipients(EventKind::Quote, Some("AAPL"));
        assert_eq!(recipients.len(), 2);
        assert!(recipients.contains(&a));
        assert!(recipients.contains(&b));

        let recipients = index.recipients(EventKind::Quote, Some("MSFT"));
        assert_eq!(recipients, vec![b]);
    }

    #[test]
    fn deregister_removes_from_every_index() {
        let index = SubscriptionIndex::new();
        let socket = SocketId::new_v4();
        index.register_user("user-1", socket);
        index.subscribe(socket, EventKind::Trade, SecurityRef::id("AAPL"));

        index.deregister("user-1", socket);

        assert!(index.recipients(EventKind::Trade, Some("AAPL")).is_empty());
    }
}
