// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages for client-server communication.
//!
//! The protocol is request/response:
//! - Client sends a [`Request`] tagged with a client-chosen `request_id`
//! - Server answers every request with exactly one [`Reply`] echoing that id
//!
//! Replies may arrive out of order; clients correlate them by id. Chat and
//! message listings carry backend documents (see [`crate::document`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{
    chat_to_document, chats_from_documents, message_to_document, messages_from_documents,
};
use crate::remote::{
    NewRemoteChat, NewRemoteMessage, Remote, RemoteChat, RemoteChatPatch, RemoteError,
    RemoteMessage, RemoteMessagePatch, RemoteResult,
};

/// Operations a client can ask of the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    CreateChat {
        chat: NewRemoteChat,
    },
    UpdateChat {
        id: String,
        patch: RemoteChatPatch,
    },
    CreateMessage {
        chat_id: String,
        message: NewRemoteMessage,
    },
    UpdateMessage {
        id: String,
        patch: RemoteMessagePatch,
    },
    DeleteChat {
        id: String,
    },
    DeleteAllChats,
    ListChats {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile_id: Option<String>,
    },
    ListMessages {
        chat_id: String,
    },
    /// Keepalive; answered with [`Reply::Pong`].
    Ping,
}

impl Request {
    /// Returns the wire name of the request.
    pub fn name(&self) -> &'static str {
        match self {
            Request::CreateChat { .. } => "create_chat",
            Request::UpdateChat { .. } => "update_chat",
            Request::CreateMessage { .. } => "create_message",
            Request::UpdateMessage { .. } => "update_message",
            Request::DeleteChat { .. } => "delete_chat",
            Request::DeleteAllChats => "delete_all_chats",
            Request::ListChats { .. } => "list_chats",
            Request::ListMessages { .. } => "list_messages",
            Request::Ping => "ping",
        }
    }
}

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    pub request_id: u64,
    #[serde(flatten)]
    pub request: Request,
}

/// Error categories carried by [`Reply::Error`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Unauthorized,
    Invalid,
    Internal,
}

/// The server's answer to one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// A record was created with this id.
    Created { id: String },
    /// An update or delete succeeded.
    Done,
    Chats { documents: Vec<Value> },
    Messages { documents: Vec<Value> },
    Pong,
    Error { code: ErrorCode, message: String },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    /// Echoed from the request; 0 when the request could not be parsed.
    pub request_id: u64,
    #[serde(flatten)]
    pub reply: Reply,
}

impl ClientMessage {
    pub fn new(request_id: u64, request: Request) -> Self {
        ClientMessage {
            request_id,
            request,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    pub fn new(request_id: u64, reply: Reply) -> Self {
        ServerMessage { request_id, reply }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl Reply {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Reply::Error {
            code,
            message: message.into(),
        }
    }

    /// Converts a backend failure into an error reply.
    pub fn from_remote_error(err: &RemoteError) -> Self {
        let (code, message) = match err {
            RemoteError::NotFound(m) => (ErrorCode::NotFound, m),
            RemoteError::Unauthorized(m) => (ErrorCode::Unauthorized, m),
            RemoteError::Rejected(m) | RemoteError::Protocol(m) => (ErrorCode::Invalid, m),
            RemoteError::Network(m) => (ErrorCode::Internal, m),
        };
        Reply::error(code, message.clone())
    }

    /// Maps an error reply to a [`RemoteError`]; other replies become
    /// protocol errors naming what was expected.
    fn into_error(self, expected: &str) -> RemoteError {
        match self {
            Reply::Error { code, message } => match code {
                ErrorCode::NotFound => RemoteError::NotFound(message),
                ErrorCode::Unauthorized => RemoteError::Unauthorized(message),
                ErrorCode::Invalid => RemoteError::Rejected(message),
                ErrorCode::Internal => RemoteError::Network(format!("server error: {message}")),
            },
            other => RemoteError::Protocol(format!("expected {expected}, got {other:?}")),
        }
    }

    pub fn into_created(self) -> RemoteResult<String> {
        match self {
            Reply::Created { id } => Ok(id),
            other => Err(other.into_error("created")),
        }
    }

    pub fn into_done(self) -> RemoteResult<()> {
        match self {
            Reply::Done => Ok(()),
            other => Err(other.into_error("done")),
        }
    }

    pub fn into_chats(self) -> RemoteResult<Vec<RemoteChat>> {
        match self {
            Reply::Chats { documents } => Ok(chats_from_documents(&documents)),
            other => Err(other.into_error("chats")),
        }
    }

    pub fn into_messages(self) -> RemoteResult<Vec<RemoteMessage>> {
        match self {
            Reply::Messages { documents } => Ok(messages_from_documents(&documents)),
            other => Err(other.into_error("messages")),
        }
    }

    pub fn into_pong(self) -> RemoteResult<()> {
        match self {
            Reply::Pong => Ok(()),
            other => Err(other.into_error("pong")),
        }
    }
}

/// Serves one request against a backend and builds the reply.
///
/// Backend failures become [`Reply::Error`]; this never fails itself.
pub async fn handle_request(remote: &dyn Remote, request: Request) -> Reply {
    let result = match request {
        Request::CreateChat { chat } => remote
            .create_chat(chat)
            .await
            .map(|id| Reply::Created { id }),
        Request::UpdateChat { id, patch } => {
            remote.update_chat(&id, patch).await.map(|()| Reply::Done)
        }
        Request::CreateMessage { chat_id, message } => remote
            .create_message(&chat_id, message)
            .await
            .map(|id| Reply::Created { id }),
        Request::UpdateMessage { id, patch } => {
            remote.update_message(&id, patch).await.map(|()| Reply::Done)
        }
        Request::DeleteChat { id } => remote.delete_chat(&id).await.map(|()| Reply::Done),
        Request::DeleteAllChats => remote.delete_all_chats().await.map(|()| Reply::Done),
        Request::ListChats { profile_id } => {
            remote
                .list_chats(profile_id.as_deref())
                .await
                .map(|chats| Reply::Chats {
                    documents: chats.iter().map(chat_to_document).collect(),
                })
        }
        Request::ListMessages { chat_id } => {
            remote
                .list_messages(&chat_id)
                .await
                .map(|messages| Reply::Messages {
                    documents: messages.iter().map(message_to_document).collect(),
                })
        }
        Request::Ping => Ok(Reply::Pong),
    };
    result.unwrap_or_else(|e| Reply::from_remote_error(&e))
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
