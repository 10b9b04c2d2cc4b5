// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Core record types for local-first chat storage.
//!
//! This module contains the fundamental data types: LocalChat, LocalMessage,
//! Role, SyncStatus and RecordKind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Confirmation state of a local record against the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Written locally, not yet confirmed by the remote.
    Pending,
    /// Confirmed by the remote.
    Synced,
    /// Last attempt failed. Still retried unless the retry budget is spent.
    Failed,
}

impl SyncStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            _ => Err(Error::InvalidSyncStatus(s.to_string())),
        }
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(Error::InvalidRole(s.to_string())),
        }
    }
}

/// Which collection a queued record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Chat,
    Message,
}

impl RecordKind {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Chat => "chat",
            RecordKind::Message => "message",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chat conversation as held on this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalChat {
    /// Stable primary key, assigned at creation and never changed.
    pub local_id: String,
    /// Server-assigned id once the remote accepted the chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Personality mode the chat was opened in.
    pub mode: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl LocalChat {
    /// Creates a new pending chat.
    pub fn new(
        local_id: String,
        mode: String,
        title: String,
        profile_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        LocalChat {
            local_id,
            remote_id: None,
            mode,
            title,
            profile_id,
            created_at: now,
            updated_at: now,
            last_message_at: None,
            is_archived: false,
            is_public: false,
            share_token: None,
            shared_at: None,
            sync_status: SyncStatus::Pending,
            sync_error: None,
            last_sync_at: None,
        }
    }

    /// Returns true if the given id is this chat's local or remote id.
    pub fn has_id(&self, id: &str) -> bool {
        self.local_id == id || self.remote_id.as_deref() == Some(id)
    }

    /// Returns true if the remote has confirmed this chat and it has a remote id.
    pub fn is_synced(&self) -> bool {
        self.sync_status == SyncStatus::Synced && self.remote_id.is_some()
    }

    /// Timestamp used to order chats by recency.
    pub fn last_activity(&self) -> DateTime<Utc> {
        match self.last_message_at {
            Some(at) if at > self.updated_at => at,
            _ => self.updated_at,
        }
    }
}

/// A single message within a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMessage {
    pub local_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    /// Local id of the parent chat.
    pub chat_id: String,
    /// Remote id of the parent chat, filled once the parent is synced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_chat_id: Option<String>,
    pub role: Role,
    pub content: String,
    /// Opaque payload carried alongside the content (model, tokens, attachments).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_favorite: bool,
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
}

impl LocalMessage {
    /// Returns true if the given id is this message's local or remote id.
    pub fn has_id(&self, id: &str) -> bool {
        self.local_id == id || self.remote_id.as_deref() == Some(id)
    }

    /// Returns true if the remote has confirmed this message.
    pub fn is_synced(&self) -> bool {
        self.sync_status == SyncStatus::Synced && self.remote_id.is_some()
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
