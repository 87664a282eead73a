//! HTTP surface: the WebSocket upgrade route and a health check.
//!
//! spec.md explicitly places authentication out of scope (§1 "Explicitly
//! out of scope": "OAuth flows, user signup/login") and SPEC_FULL.md's
//! "Event Bus authentication boundary" note says the bus accepts an
//! already-authenticated `userId`. A real deployment puts an auth layer in
//! front of this route (or validates a token here) and passes the
//! resolved id through; this handler trusts the `user_id` query parameter
//! as that already-authenticated identity.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    user_id: String,
}

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        state.event_bus.accept(query.user_id, socket);
    })
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.is_healthy() {
        (axum::http::StatusCode::OK, "ok")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    }
}
