use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use domain::Username;

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    success: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(preflight_register))
        .route("/roster", get(roster))
        .route("/ws", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 名称预检：只校验格式，不占用名称。真正的占用发生在 WebSocket 的 `register` 事件。
async fn preflight_register(
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let raw = payload
        .username
        .ok_or_else(|| ApiError::bad_request("username is required"))?;
    let name = Username::parse(&raw)?;
    tracing::info!(username = %name, "名称预检通过");
    Ok(Json(RegisterResponse { success: true }))
}

async fn roster(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.relay.roster().await)
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        WebSocketConnection::new(socket, state).await.run().await;
    })
}
