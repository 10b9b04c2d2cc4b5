// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::transport::TransportError;

/// All possible errors that can occur in the chatsync front end.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("chat not found: {0}\n  hint: run 'chatsync list' to see local chats")]
    ChatNotFound(String),

    #[error("message not found: {0}\n  hint: run 'chatsync show <chat>' to see message ids")]
    MessageNotFound(String),

    #[error("no chat or message with id: {0}")]
    RecordNotFound(String),

    #[error("invalid role: '{0}'\n  hint: valid roles are: user, assistant, system")]
    InvalidRole(String),

    #[error("invalid metadata: {0}\n  hint: metadata must be a JSON object")]
    InvalidMetadata(String),

    #[error("no remote configured\n  hint: set 'url' under [remote] in config.toml")]
    NoRemote,

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("remote error: {0}")]
    Remote(#[from] chatsync_core::RemoteError),

    #[error("storage error: {0}")]
    Storage(chatsync_core::Error),
}

/// A specialized Result type for chatsync operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<chatsync_core::Error> for Error {
    fn from(e: chatsync_core::Error) -> Self {
        use chatsync_core::Error as Core;
        match e {
            Core::ChatNotFound(id) => Error::ChatNotFound(id),
            Core::MessageNotFound(id) => Error::MessageNotFound(id),
            Core::RecordNotFound(id) => Error::RecordNotFound(id),
            Core::InvalidRole(s) => Error::InvalidRole(s),
            Core::Io(e) => Error::Io(e),
            Core::Json(e) => Error::Json(e),
            Core::Remote(e) => Error::Remote(e),
            other => Error::Storage(other),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
