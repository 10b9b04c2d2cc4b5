// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Chats and messages live in a [`MemoryRemote`]. With a data directory the
//! records are loaded from `chats.jsonl` and `messages.jsonl` at startup and
//! rewritten after every successful change.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use chatsync_core::protocol::{handle_request, Reply, Request};
use chatsync_core::{jsonl, MemoryRemote, RemoteChat, RemoteMessage, Result};

const CHATS_FILE: &str = "chats.jsonl";
const MESSAGES_FILE: &str = "messages.jsonl";

/// Shared server state.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    backend: MemoryRemote,
    data_dir: Option<PathBuf>,
    /// Serializes snapshot writes so an older snapshot never lands last.
    save_lock: Mutex<()>,
}

impl ServerState {
    /// Creates state that lives only in memory.
    pub fn in_memory() -> Self {
        Self::with_backend(MemoryRemote::new(), None)
    }

    /// Creates state persisted under `data_dir`, loading what is there.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let chats: Vec<RemoteChat> = jsonl::read_all(&data_dir.join(CHATS_FILE))?;
        let messages: Vec<RemoteMessage> = jsonl::read_all(&data_dir.join(MESSAGES_FILE))?;
        tracing::info!(
            chats = chats.len(),
            messages = messages.len(),
            "loaded records from {}",
            data_dir.display()
        );

        let backend = MemoryRemote::new();
        backend.restore(chats, messages);
        Ok(Self::with_backend(backend, Some(data_dir.to_path_buf())))
    }

    fn with_backend(backend: MemoryRemote, data_dir: Option<PathBuf>) -> Self {
        ServerState {
            inner: Arc::new(ServerStateInner {
                backend,
                data_dir,
                save_lock: Mutex::new(()),
            }),
        }
    }

    pub fn backend(&self) -> &MemoryRemote {
        &self.inner.backend
    }

    /// Serves one request, persisting afterwards if it changed anything.
    pub async fn handle(&self, request: Request) -> Reply {
        let mutates = is_mutation(&request);
        let reply = handle_request(&self.inner.backend, request).await;
        if mutates && !matches!(reply, Reply::Error { .. }) {
            if let Err(e) = self.save().await {
                tracing::error!("failed to persist records: {}", e);
            }
        }
        reply
    }

    /// Writes all records to the data directory, if there is one.
    pub async fn save(&self) -> Result<()> {
        let Some(dir) = &self.inner.data_dir else {
            return Ok(());
        };
        let _guard = self.inner.save_lock.lock().await;
        jsonl::write_all(&dir.join(CHATS_FILE), &self.inner.backend.chats())?;
        jsonl::write_all(&dir.join(MESSAGES_FILE), &self.inner.backend.messages())?;
        Ok(())
    }
}

fn is_mutation(request: &Request) -> bool {
    !matches!(
        request,
        Request::ListChats { .. } | Request::ListMessages { .. } | Request::Ping
    )
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
