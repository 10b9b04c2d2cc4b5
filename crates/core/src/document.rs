// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mapping between backend documents and typed remote records.
//!
//! Backends return loosely shaped JSON documents: system fields prefixed with
//! `$` (`$id`, `$createdAt`), attributes in snake_case or camelCase, booleans
//! and timestamps in more than one encoding. Everything past this module sees
//! only [`RemoteChat`] and [`RemoteMessage`].

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::clock::datetime_from_ms;
use crate::error::{Error, Result};
use crate::model::Role;
use crate::remote::{RemoteChat, RemoteMessage};

const DEFAULT_MODE: &str = "general";
const DEFAULT_TITLE: &str = "New Chat";

/// Returns the first non-null value among `names`.
fn field<'a>(doc: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| doc.get(*name))
        .find(|v| !v.is_null())
}

fn string_field(doc: &Map<String, Value>, names: &[&str]) -> Option<String> {
    match field(doc, names)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_field(doc: &Map<String, Value>, names: &[&str]) -> bool {
    match field(doc, names) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1"),
        _ => false,
    }
}

fn time_field(doc: &Map<String, Value>, names: &[&str]) -> Result<Option<DateTime<Utc>>> {
    match field(doc, names) {
        None => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| Error::InvalidDocument(format!("bad timestamp '{s}': {e}"))),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|ms| Some(datetime_from_ms(ms)))
            .ok_or_else(|| Error::InvalidDocument(format!("bad timestamp {n}"))),
        Some(other) => Err(Error::InvalidDocument(format!("bad timestamp {other}"))),
    }
}

fn as_object(doc: &Value) -> Result<&Map<String, Value>> {
    doc.as_object()
        .ok_or_else(|| Error::InvalidDocument("document is not an object".to_string()))
}

fn require_id(doc: &Map<String, Value>) -> Result<String> {
    string_field(doc, &["$id", "id"])
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::InvalidDocument("document has no id".to_string()))
}

/// Metadata may arrive as an embedded JSON string.
fn metadata_field(doc: &Map<String, Value>) -> Value {
    match field(doc, &["metadata"]) {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Maps a backend chat document to a [`RemoteChat`].
pub fn chat_from_document(doc: &Value) -> Result<RemoteChat> {
    let doc = as_object(doc)?;
    let id = require_id(doc)?;

    let created = time_field(doc, &["$createdAt", "created_at", "createdAt"])?;
    let updated = time_field(doc, &["$updatedAt", "updated_at", "updatedAt"])?;
    let (created_at, updated_at) = match (created, updated) {
        (Some(c), Some(u)) => (c, u),
        (Some(c), None) => (c, c),
        (None, Some(u)) => (u, u),
        (None, None) => {
            return Err(Error::InvalidDocument(format!(
                "chat {id} has no timestamps"
            )))
        }
    };

    Ok(RemoteChat {
        mode: string_field(doc, &["mode"]).unwrap_or_else(|| DEFAULT_MODE.to_string()),
        title: string_field(doc, &["title"]).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        profile_id: string_field(doc, &["profile_id", "profileId"]),
        created_at,
        updated_at,
        last_message_at: time_field(doc, &["last_message_at", "lastMessageAt"])?,
        is_archived: bool_field(doc, &["is_archived", "isArchived"]),
        is_public: bool_field(doc, &["is_public", "isPublic"]),
        share_token: string_field(doc, &["share_token", "shareToken"]),
        shared_at: time_field(doc, &["shared_at", "sharedAt"])?,
        id,
    })
}

/// Maps a backend message document to a [`RemoteMessage`].
pub fn message_from_document(doc: &Value) -> Result<RemoteMessage> {
    let doc = as_object(doc)?;
    let id = require_id(doc)?;

    let chat_id = string_field(doc, &["chat_id", "chatId"])
        .ok_or_else(|| Error::InvalidDocument(format!("message {id} has no chat id")))?;
    let role = string_field(doc, &["role"])
        .ok_or_else(|| Error::InvalidDocument(format!("message {id} has no role")))?
        .parse::<Role>()?;
    let created_at = time_field(doc, &["$createdAt", "created_at", "createdAt"])?
        .ok_or_else(|| Error::InvalidDocument(format!("message {id} has no timestamp")))?;

    Ok(RemoteMessage {
        chat_id,
        role,
        content: string_field(doc, &["content"]).unwrap_or_default(),
        metadata: metadata_field(doc),
        created_at,
        is_favorite: bool_field(doc, &["is_favorite", "isFavorite"]),
        id,
    })
}

/// Renders a chat in backend document shape.
pub fn chat_to_document(chat: &RemoteChat) -> Value {
    json!({
        "$id": chat.id,
        "$createdAt": chat.created_at.to_rfc3339(),
        "$updatedAt": chat.updated_at.to_rfc3339(),
        "mode": chat.mode,
        "title": chat.title,
        "profile_id": chat.profile_id,
        "last_message_at": chat.last_message_at.map(|t| t.to_rfc3339()),
        "is_archived": chat.is_archived,
        "is_public": chat.is_public,
        "share_token": chat.share_token,
        "shared_at": chat.shared_at.map(|t| t.to_rfc3339()),
    })
}

/// Renders a message in backend document shape.
///
/// Metadata is stored as a JSON string, as document databases commonly do.
pub fn message_to_document(message: &RemoteMessage) -> Value {
    let metadata = if message.metadata.is_null() {
        Value::Null
    } else {
        Value::String(message.metadata.to_string())
    };
    json!({
        "$id": message.id,
        "$createdAt": message.created_at.to_rfc3339(),
        "chat_id": message.chat_id,
        "role": message.role.as_str(),
        "content": message.content,
        "metadata": metadata,
        "is_favorite": message.is_favorite,
    })
}

/// Maps a list of chat documents, skipping (and logging) malformed entries.
pub fn chats_from_documents(docs: &[Value]) -> Vec<RemoteChat> {
    docs.iter()
        .filter_map(|doc| match chat_from_document(doc) {
            Ok(chat) => Some(chat),
            Err(e) => {
                tracing::warn!("skipping chat document: {}", e);
                None
            }
        })
        .collect()
}

/// Maps a list of message documents, skipping (and logging) malformed entries.
pub fn messages_from_documents(docs: &[Value]) -> Vec<RemoteMessage> {
    docs.iter()
        .filter_map(|doc| match message_from_document(doc) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("skipping message document: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
