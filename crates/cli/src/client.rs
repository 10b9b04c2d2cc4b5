// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote backend reached over a [`Transport`].
//!
//! Requests are serialized on one connection: each call connects lazily,
//! sends a [`ClientMessage`] with a fresh request id and waits for the reply
//! carrying the same id. Replies to earlier requests that timed out are
//! skipped. A timeout or transport failure drops the connection so the next
//! call reconnects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;

use chatsync_core::protocol::{ClientMessage, Reply, Request};
use chatsync_core::remote::{
    NewRemoteChat, NewRemoteMessage, RemoteChatPatch, RemoteFuture, RemoteMessagePatch,
};
use chatsync_core::{Remote, RemoteChat, RemoteError, RemoteMessage, RemoteResult};

use crate::transport::{Transport, TransportError, WebSocketTransport};

/// A [`Remote`] speaking the chatsync protocol.
pub struct WebSocketRemote<T: Transport = WebSocketTransport> {
    url: String,
    request_timeout: Duration,
    transport: Mutex<T>,
    next_request_id: AtomicU64,
}

impl WebSocketRemote<WebSocketTransport> {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self::with_transport(url, request_timeout, WebSocketTransport::new())
    }
}

impl<T: Transport> WebSocketRemote<T> {
    /// Creates a remote over a custom transport (for testing).
    pub fn with_transport(url: impl Into<String>, request_timeout: Duration, transport: T) -> Self {
        WebSocketRemote {
            url: url.into(),
            request_timeout,
            transport: Mutex::new(transport),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Round-trips a ping.
    pub async fn ping(&self) -> RemoteResult<()> {
        self.request(Request::Ping).await?.into_pong()
    }

    /// Closes the connection if open.
    pub async fn disconnect(&self) {
        let mut transport = self.transport.lock().await;
        let _ = transport.disconnect().await;
    }

    async fn request(&self, request: Request) -> RemoteResult<Reply> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let name = request.name();
        let mut transport = self.transport.lock().await;

        let outcome = tokio::time::timeout(
            self.request_timeout,
            exchange(&mut *transport, &self.url, ClientMessage::new(request_id, request)),
        )
        .await;

        let error = match outcome {
            Ok(Ok(reply)) => return Ok(reply),
            Ok(Err(e)) => e,
            Err(_) => RemoteError::Network(format!(
                "{} timed out after {}s",
                name,
                self.request_timeout.as_secs_f64()
            )),
        };
        tracing::debug!(request = name, request_id, "request failed: {}", error);
        let _ = transport.disconnect().await;
        Err(error)
    }
}

fn network(e: TransportError) -> RemoteError {
    RemoteError::Network(e.to_string())
}

async fn exchange<T: Transport>(
    transport: &mut T,
    url: &str,
    msg: ClientMessage,
) -> RemoteResult<Reply> {
    if !transport.is_connected() {
        transport.connect(url).await.map_err(network)?;
    }
    let request_id = msg.request_id;
    transport.send(msg).await.map_err(network)?;

    loop {
        match transport.recv().await.map_err(network)? {
            Some(reply) if reply.request_id == request_id => return Ok(reply.reply),
            Some(stale) => {
                tracing::debug!(request_id = stale.request_id, "skipping stale reply");
            }
            None => return Err(RemoteError::Network("connection closed".to_string())),
        }
    }
}

impl<T: Transport> Remote for WebSocketRemote<T> {
    fn create_chat(&self, chat: NewRemoteChat) -> RemoteFuture<'_, String> {
        Box::pin(async move { self.request(Request::CreateChat { chat }).await?.into_created() })
    }

    fn update_chat(&self, remote_id: &str, patch: RemoteChatPatch) -> RemoteFuture<'_, ()> {
        let request = Request::UpdateChat {
            id: remote_id.to_string(),
            patch,
        };
        Box::pin(async move { self.request(request).await?.into_done() })
    }

    fn create_message(
        &self,
        remote_chat_id: &str,
        message: NewRemoteMessage,
    ) -> RemoteFuture<'_, String> {
        let request = Request::CreateMessage {
            chat_id: remote_chat_id.to_string(),
            message,
        };
        Box::pin(async move { self.request(request).await?.into_created() })
    }

    fn update_message(&self, remote_id: &str, patch: RemoteMessagePatch) -> RemoteFuture<'_, ()> {
        let request = Request::UpdateMessage {
            id: remote_id.to_string(),
            patch,
        };
        Box::pin(async move { self.request(request).await?.into_done() })
    }

    fn delete_chat(&self, remote_id: &str) -> RemoteFuture<'_, ()> {
        let request = Request::DeleteChat {
            id: remote_id.to_string(),
        };
        Box::pin(async move { self.request(request).await?.into_done() })
    }

    fn delete_all_chats(&self) -> RemoteFuture<'_, ()> {
        Box::pin(async move { self.request(Request::DeleteAllChats).await?.into_done() })
    }

    fn list_chats(&self, profile_id: Option<&str>) -> RemoteFuture<'_, Vec<RemoteChat>> {
        let request = Request::ListChats {
            profile_id: profile_id.map(str::to_string),
        };
        Box::pin(async move { self.request(request).await?.into_chats() })
    }

    fn list_messages(&self, remote_chat_id: &str) -> RemoteFuture<'_, Vec<RemoteMessage>> {
        let request = Request::ListMessages {
            chat_id: remote_chat_id.to_string(),
        };
        Box::pin(async move { self.request(request).await?.into_messages() })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
