// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for chatsync-core operations.

use thiserror::Error;

use crate::remote::RemoteError;

/// All possible errors that can occur in chatsync-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("chat not found: {0}")]
    ChatNotFound(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("no chat or message with id: {0}")]
    RecordNotFound(String),

    #[error("invalid role: '{0}'\n  hint: valid roles are: user, assistant, system")]
    InvalidRole(String),

    #[error("invalid sync status: '{0}'\n  hint: valid statuses are: pending, synced, failed")]
    InvalidSyncStatus(String),

    #[error("invalid remote document: {0}")]
    InvalidDocument(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// A specialized Result type for chatsync-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
