use std::sync::Arc;

use axum::{
    Json, Router, debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::{AppState, hub::Hub, protocol::Action, rooms::RoomSummary};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(chat_ws))
        .route("/rooms", get(rooms))
        .route("/health", get(health))
}

#[debug_handler(state = crate::AppState)]
async fn rooms(State(hub): State<Arc<Hub>>) -> Json<Vec<RoomSummary>> {
    Json(hub.room_list())
}

async fn health() -> &'static str {
    "ok"
}

#[debug_handler(state = crate::AppState)]
async fn chat_ws(State(hub): State<Arc<Hub>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |stream| serve_socket(hub, stream))
}

async fn serve_socket(hub: Arc<Hub>, stream: WebSocket) {
    let (conn, mut outbox) = hub.connect();
    let (mut sender, mut receiver) = stream.split();

    let forward_conn = conn.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(event) = outbox.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(conn = %forward_conn, error = %err, "failed to encode event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<Action>(text.as_str()) {
            Ok(Action::Disconnect) => break,
            Ok(action) => hub.dispatch(&conn, action),
            Err(err) => debug!(conn = %conn, error = %err, "unreadable frame"),
        }
    }

    hub.disconnect(&conn);
    forward_task.abort();
}
