// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Contract with the remote backend.
//!
//! The remote owns durable multi-device storage. The sync layer only needs a
//! handful of request/response calls, expressed by the [`Remote`] trait so a
//! WebSocket client, an in-memory fake, or any other backend can stand behind
//! it.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Role;

/// Error type for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The addressed record (or the parent of a new record) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller may not touch the record.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Transport or availability failure. Retrying may help.
    #[error("network error: {0}")]
    Network(String),

    /// The remote refused the request.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The remote answered with something the client did not understand.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteError::Unauthorized(_))
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future returned by [`Remote`] methods.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = RemoteResult<T>> + Send + 'a>>;

/// Fields sent when creating a chat remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRemoteChat {
    pub mode: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
}

/// Server-owned chat fields pushed after a local edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteChatPatch {
    pub title: String,
    pub is_archived: bool,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_at: Option<DateTime<Utc>>,
}

/// Fields sent when creating a message remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRemoteMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Message fields pushed after a local edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessagePatch {
    pub is_favorite: bool,
}

/// Authoritative chat as reported by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteChat {
    pub id: String,
    pub mode: String,
    pub title: String,
    pub profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub is_public: bool,
    pub share_token: Option<String>,
    pub shared_at: Option<DateTime<Utc>>,
}

/// Authoritative message as reported by the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub is_favorite: bool,
}

/// The remote backend as seen by the sync layer.
///
/// Implementations own their timeouts; callers only distinguish success,
/// [`RemoteError::NotFound`], and everything else.
pub trait Remote: Send + Sync {
    /// Creates a chat and returns its remote id.
    fn create_chat(&self, chat: NewRemoteChat) -> RemoteFuture<'_, String>;

    /// Overwrites the server-owned fields of a chat.
    fn update_chat(&self, remote_id: &str, patch: RemoteChatPatch) -> RemoteFuture<'_, ()>;

    /// Creates a message under a remote chat and returns its remote id.
    ///
    /// Fails with [`RemoteError::NotFound`] if the chat is not visible yet.
    fn create_message(
        &self,
        remote_chat_id: &str,
        message: NewRemoteMessage,
    ) -> RemoteFuture<'_, String>;

    /// Overwrites the mutable fields of a message.
    fn update_message(&self, remote_id: &str, patch: RemoteMessagePatch)
        -> RemoteFuture<'_, ()>;

    /// Deletes a chat and its messages.
    fn delete_chat(&self, remote_id: &str) -> RemoteFuture<'_, ()>;

    /// Deletes every chat visible to the caller.
    fn delete_all_chats(&self) -> RemoteFuture<'_, ()>;

    /// Lists chats, optionally restricted to one profile.
    fn list_chats(&self, profile_id: Option<&str>) -> RemoteFuture<'_, Vec<RemoteChat>>;

    /// Lists the messages of a chat.
    fn list_messages(&self, remote_chat_id: &str) -> RemoteFuture<'_, Vec<RemoteMessage>>;
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
