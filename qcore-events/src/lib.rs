//! Real-time Event Bus (spec.md §4.5): authenticated socket registration,
//! per-security subscription indices, and backpressure-bounded fan-out of
//! market and alert events to WebSocket clients.

mod bus;
mod error;
mod protocol;
mod registry;
mod socket;

pub use bus::EventBus;
pub use error::EventBusError;
pub use protocol::{EventKind, InboundOp, OutboundEnvelope, SecurityRef};
pub use registry::{SocketId, SubscriptionIndex};
pub use socket::ClientSocket;
