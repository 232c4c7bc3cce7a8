//! WebSocket Stream Route

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
    Json,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::broadcast::{run_stream, ClientInfo, FrameSink, StreamError};
use crate::AppState;

/// `GET /ws`: upgrade and stream frames to this client until it goes away
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

#[derive(Debug, Serialize)]
pub struct StreamClientsResponse {
    pub count: usize,
    pub clients: Vec<ClientInfo>,
}

/// `GET /api/v1/stream/clients`: connected dashboard clients, oldest first
pub async fn get_clients(State(state): State<Arc<AppState>>) -> Json<StreamClientsResponse> {
    let clients = state.registry.snapshot();
    Json(StreamClientsResponse {
        count: clients.len(),
        clients,
    })
}

struct WsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.0
            .send(Message::Text(text))
            .await
            .map_err(|e| StreamError::ConnectionLost(e.to_string()))
    }
}

async fn handle_socket(socket: WebSocket, peer: Option<SocketAddr>, state: Arc<AppState>) {
    let guard = state.registry.register(peer);
    let (sender, mut receiver) = socket.split();

    // Inbound messages are ignored; the reader only watches for the close
    let (closed_tx, closed_rx) = oneshot::channel::<()>();
    let reader = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            if matches!(message, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
        let _ = closed_tx.send(());
    });

    let closed = async move {
        let _ = closed_rx.await;
    };
    run_stream(
        guard,
        WsSink(sender),
        state.frame_source(),
        closed,
        state.stream.clone(),
    )
    .await;

    reader.abort();
}
