// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Each connection is served by its own task. Every text frame is one
//! [`ClientMessage`]; the reply echoes its request id. Requests on one
//! connection are answered in order.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use chatsync_core::protocol::{ClientMessage, ErrorCode, Reply, ServerMessage};

use crate::state::ServerState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", listener.local_addr()?);
    serve(listener, state).await
}

/// Accepts connections on a bound listener until it fails.
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<(), BoxError> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), BoxError> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;
    info!("New WebSocket connection from: {}", peer_addr);

    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let reply = handle_client_message(&text, &state).await;
                ws.send(Message::Text(reply.to_json()?.into())).await?;
            }
            Ok(Message::Close(_)) => {
                info!("Client {} disconnected", peer_addr);
                break;
            }
            // tungstenite answers pings itself
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    debug!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Turns one text frame into the reply to send back.
pub(crate) async fn handle_client_message(text: &str, state: &ServerState) -> ServerMessage {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Unparseable message: {}", e);
            return ServerMessage::new(
                0,
                Reply::error(ErrorCode::Invalid, format!("bad request: {}", e)),
            );
        }
    };

    let name = msg.request.name();
    let reply = state.handle(msg.request).await;
    match &reply {
        Reply::Error { code, message } => {
            debug!(request = name, request_id = msg.request_id, ?code, "{}", message)
        }
        _ => debug!(request = name, request_id = msg.request_id, "served"),
    }
    ServerMessage::new(msg.request_id, reply)
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
