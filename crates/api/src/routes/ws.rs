//! Websocket entry point for the notification hub.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::hub::serve_socket;
use crate::state::AppState;

/// `GET /ws`
///
/// Upgrades the connection and hands the socket to the hub. The request
/// task returns once the upgrade response is sent.
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.hub().clone();
    ws.on_upgrade(move |socket| serve_socket(socket, hub))
}
