// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The chatsync client as one object.
//!
//! [`ChatSync`] owns the shared store, the sync engine (when a remote is
//! configured) and the background scheduler. Mutations go through it so the
//! scheduler hears about them and remote deletes are propagated.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::task::JoinHandle;

use chatsync_core::{
    DeletedChat, EventBus, FileKv, KvStore, LocalChat, LocalMessage, LocalStore, MergeReport,
    Remote, Role, SharedStore, SqliteKv, SyncEngine, SyncOutcome, SystemClock,
};

use crate::client::WebSocketRemote;
use crate::config::{storage_path, Config, StorageBackend};
use crate::error::{Error, Result};
use crate::scheduler::{self, SchedulerConfig, SchedulerHandle};

/// Local-first chat state with optional background sync.
pub struct ChatSync {
    store: SharedStore,
    engine: Option<Arc<SyncEngine>>,
    scheduler: Option<SchedulerHandle>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// Opens the configured persistence backend under `data_dir`.
pub fn open_kv(data_dir: &Path, backend: StorageBackend) -> Result<Box<dyn KvStore>> {
    fs::create_dir_all(data_dir)?;
    let path = storage_path(data_dir, backend);
    Ok(match backend {
        StorageBackend::Sqlite => Box::new(SqliteKv::open(&path)?),
        StorageBackend::File => Box::new(FileKv::open(&path)?),
    })
}

impl ChatSync {
    /// Opens the client described by `config`.
    ///
    /// `identity` overrides the configured identity.
    pub fn open(data_dir: &Path, config: &Config, identity: Option<&str>) -> Result<Self> {
        let kv = open_kv(data_dir, config.storage.backend)?;
        let identity = identity.or(config.identity.as_deref());
        let store = LocalStore::open(
            kv,
            Arc::new(SystemClock),
            Arc::new(EventBus::new()),
            identity,
            config.sync.store_options(),
        )
        .into_shared();

        let remote = config.remote.url.as_ref().map(|url| {
            Arc::new(WebSocketRemote::new(url.clone(), config.remote.request_timeout()))
                as Arc<dyn Remote>
        });
        Ok(Self::new(store, remote))
    }

    /// Wraps an open store; without a remote the client is local-only.
    pub fn new(store: SharedStore, remote: Option<Arc<dyn Remote>>) -> Self {
        let engine = remote.map(|remote| Arc::new(SyncEngine::new(Arc::clone(&store), remote)));
        ChatSync {
            store,
            engine,
            scheduler: None,
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn engine(&self) -> Option<&Arc<SyncEngine>> {
        self.engine.as_ref()
    }

    pub fn scheduler(&self) -> Option<&SchedulerHandle> {
        self.scheduler.as_ref()
    }

    /// Starts background sync. Does nothing without a remote.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_scheduler(&mut self, config: SchedulerConfig) {
        if self.scheduler.is_some() {
            return;
        }
        if let Some(engine) = &self.engine {
            self.scheduler = Some(scheduler::spawn(Arc::clone(engine), config));
        }
    }

    /// Locks the store for reading.
    pub fn lock(&self) -> MutexGuard<'_, LocalStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mutated(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.notify_mutation();
        }
    }

    pub fn create_chat(&self, mode: &str, title: &str, profile_id: Option<&str>) -> LocalChat {
        let chat = self.lock().create_chat(mode, title, profile_id);
        self.mutated();
        chat
    }

    pub fn add_message(
        &self,
        chat_id: &str,
        role: Role,
        content: &str,
        metadata: Value,
        message_id: Option<&str>,
    ) -> Result<LocalMessage> {
        let message = self
            .lock()
            .add_message(chat_id, role, content, metadata, message_id)?;
        self.mutated();
        Ok(message)
    }

    pub fn rename_chat(&self, chat_id: &str, title: &str) -> Result<LocalChat> {
        let chat = self.lock().update_chat_title(chat_id, title)?;
        self.mutated();
        Ok(chat)
    }

    pub fn set_archived(&self, chat_id: &str, archived: bool) -> Result<LocalChat> {
        let chat = self.lock().set_chat_archived(chat_id, archived)?;
        self.mutated();
        Ok(chat)
    }

    /// Makes a chat public and returns its share token.
    pub fn share_chat(&self, chat_id: &str) -> Result<String> {
        let token = self.lock().share_chat(chat_id)?;
        self.mutated();
        Ok(token)
    }

    pub fn unshare_chat(&self, chat_id: &str) -> Result<LocalChat> {
        let chat = self.lock().unshare_chat(chat_id)?;
        self.mutated();
        Ok(chat)
    }

    pub fn set_favorite(&self, message_id: &str, favorite: bool) -> Result<LocalMessage> {
        let message = self.lock().set_message_favorite(message_id, favorite)?;
        self.mutated();
        Ok(message)
    }

    /// Deletes a chat locally and, in the background, remotely.
    pub fn delete_chat(&self, chat_id: &str) -> Result<DeletedChat> {
        let deleted = self.lock().delete_chat(chat_id)?;
        if let (Some(engine), Some(remote_id)) = (&self.engine, deleted.remote_id.clone()) {
            let engine = Arc::clone(engine);
            self.spawn_background(async move { engine.propagate_delete(&remote_id).await });
        }
        Ok(deleted)
    }

    /// Deletes every chat locally and, in the background, remotely.
    pub fn delete_all_chats(&self) -> usize {
        let count = self.lock().delete_all_chats();
        if let Some(engine) = &self.engine {
            let engine = Arc::clone(engine);
            self.spawn_background(async move { engine.propagate_delete_all().await });
        }
        count
    }

    /// Re-queues a failed record. Returns false if nothing needed retrying.
    pub fn retry(&self, id: &str) -> Result<bool> {
        let queued = self.lock().retry_sync(id)?;
        if queued {
            self.mutated();
        }
        Ok(queued)
    }

    pub fn retry_all_failed(&self) -> usize {
        let count = self.lock().retry_all_failed();
        if count > 0 {
            self.mutated();
        }
        count
    }

    /// Drops all local state for the current identity, e.g. on logout.
    pub fn clear(&self) -> Result<()> {
        self.lock().clear()?;
        Ok(())
    }

    /// Runs one sync pass now.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        let engine = self.engine.as_ref().ok_or(Error::NoRemote)?;
        Ok(engine.run_pass().await)
    }

    /// Pulls the server's chats and messages into the local store.
    pub async fn refresh(&self, profile_id: Option<&str>) -> Result<MergeReport> {
        let engine = self.engine.as_ref().ok_or(Error::NoRemote)?;
        Ok(engine.pull(profile_id).await?)
    }

    fn spawn_background<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = runtime.spawn(task);
                self.background
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(handle);
            }
            Err(_) => tracing::warn!("no async runtime, remote delete skipped"),
        }
    }

    /// Stops background work and persists local state.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }

        let background: Vec<JoinHandle<()>> = self
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for task in background {
            if let Err(e) = task.await {
                tracing::warn!("background task failed: {}", e);
            }
        }

        self.lock().flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
