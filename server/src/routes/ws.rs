//! WebSocket upgrade route.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};

use crate::auth::AuthUser;
use crate::handlers::handle_websocket_connection;
use crate::AppState;

/// Create the WebSocket route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/ws", get(upgrade_handler))
}

/// GET /v1/ws - Upgrade to a subscription socket.
async fn upgrade_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, state.pool, state.hub, auth)
    })
}
