/*
 * Responsibility
 * - GET /ws/{user_id}: WebSocket upgrade
 * - Register the socket with the ConnectionManager so the heartbeat can see it
 * - Translate Outbound commands to frames; any inbound frame counts as activity
 * - Message payloads are not interpreted here
 */
use axum::{
    body::Bytes,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};

use crate::{
    services::realtime::{ConnectionManager, Outbound},
    state::AppState,
};

pub async fn upgrade(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, user_id, state.connections))
}

async fn serve_socket(socket: WebSocket, user_id: String, connections: ConnectionManager) {
    let (id, mut outbound) = connections.register(user_id.as_str());
    tracing::debug!(
        connection_id = %id,
        user_connections = connections.connections_for(&user_id),
        "websocket opened"
    );
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            cmd = outbound.recv() => match cmd {
                Some(Outbound::Ping) => {
                    if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
                // pruned by the heartbeat (None: the registry dropped our sender)
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => connections.touch(&id),
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %id, error = %e, "websocket receive failed");
                    break;
                }
            },
        }
    }

    connections.unregister(&id);
}
