// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local durable store of chats and messages.
//!
//! All mutations are synchronous: they update the in-memory maps, enqueue a
//! sync task, emit an event and mark the state dirty. Dirty state is written
//! to the [`KvStore`] once mutations go quiet for the debounce delay
//! ([`LocalStore::flush_if_due`]) or immediately on [`LocalStore::flush`].
//!
//! The sync engine drives the store through the `*_request`, `message_plan`
//! and `apply_*` methods; none of them perform I/O against the remote.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::clock::ClockSource;
use crate::error::{Error, Result};
use crate::events::{EventBus, SyncEvent};
use crate::id::{IdGenerator, CHAT_PREFIX, MESSAGE_PREFIX};
use crate::kv::KvStore;
use crate::model::{LocalChat, LocalMessage, RecordKind, Role, SyncStatus};
use crate::persist::{self, Debouncer, PersistedState, StorageKeys};
use crate::queue::{RetryOutcome, RetryPolicy, SyncQueue, SyncQueueItem};
use crate::remote::{NewRemoteChat, NewRemoteMessage, RemoteChatPatch, RemoteMessagePatch};

/// A store shared between the host, the sync engine and the scheduler.
///
/// The lock is never held across an `.await`.
pub type SharedStore = Arc<Mutex<LocalStore>>;

/// Tunables for a [`LocalStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub retry: RetryPolicy,
    pub persist_debounce: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            retry: RetryPolicy::default(),
            persist_debounce: Duration::from_millis(1_000),
        }
    }
}

/// Ids of a chat removed by [`LocalStore::delete_chat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedChat {
    pub local_id: String,
    /// Present when the remote copy still has to be deleted.
    pub remote_id: Option<String>,
}

/// Record counts by sync state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub chats: usize,
    pub messages: usize,
    pub pending: usize,
    pub synced: usize,
    pub failed: usize,
    pub queued: usize,
}

/// What the sync engine sends for a queued chat.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatRequest {
    Create(NewRemoteChat),
    Update {
        remote_id: String,
        patch: RemoteChatPatch,
    },
}

/// What the sync engine does with a queued message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePlan {
    Create {
        remote_chat_id: String,
        message: NewRemoteMessage,
    },
    Update {
        remote_id: String,
        patch: RemoteMessagePatch,
    },
    /// The parent chat has no confirmed remote id yet.
    AwaitingParent,
    /// The parent chat gave up syncing; the message waits for a manual retry
    /// of the parent.
    ParentFailed,
    /// The message no longer exists locally.
    Missing,
}

/// Result of confirming a chat create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatSyncResult {
    Applied,
    /// The chat was deleted locally while the request was in flight; the
    /// remote copy must be deleted.
    Orphaned { remote_id: String },
    /// The chat is gone and nothing was created remotely.
    Ignored,
    /// The chat was edited while the request was in flight. Any new remote id
    /// is recorded but the chat stays pending for another push.
    Changed,
}

/// In-memory chat state mirrored to a key-value store.
pub struct LocalStore {
    kv: Box<dyn KvStore>,
    clock: Arc<dyn ClockSource>,
    ids: IdGenerator,
    events: Arc<EventBus>,
    identity: Option<String>,
    keys: StorageKeys,
    retry: RetryPolicy,
    debounce: Debouncer,
    pub(crate) chats: HashMap<String, LocalChat>,
    pub(crate) messages: HashMap<String, LocalMessage>,
    pub(crate) queue: SyncQueue,
    pub(crate) deleted: HashSet<String>,
}

impl LocalStore {
    /// Opens the store for `identity`, loading its persisted state.
    pub fn open(
        kv: Box<dyn KvStore>,
        clock: Arc<dyn ClockSource>,
        events: Arc<EventBus>,
        identity: Option<&str>,
        options: StoreOptions,
    ) -> Self {
        let mut store = LocalStore {
            kv,
            clock,
            ids: IdGenerator::new(),
            events,
            identity: None,
            keys: StorageKeys::for_identity(None),
            retry: options.retry,
            debounce: Debouncer::new(options.persist_debounce),
            chats: HashMap::new(),
            messages: HashMap::new(),
            queue: SyncQueue::new(),
            deleted: HashSet::new(),
        };
        store.load(identity);
        store
    }

    /// Wraps the store for sharing with the sync engine.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn is_deleted(&self, id: &str) -> bool {
        self.deleted.contains(id)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        self.events.emit(&event);
    }

    /// Generates a message id unused by any live or deleted record.
    pub(crate) fn fresh_message_id(&self) -> String {
        self.ids.generate(MESSAGE_PREFIX, self.clock.now_ms(), |id| {
            self.messages.contains_key(id) || self.deleted.contains(id)
        })
    }

    pub(crate) fn touch(&mut self) {
        let now = self.clock.now_ms();
        self.debounce.touch(now);
    }

    fn load(&mut self, identity: Option<&str>) {
        self.identity = identity.filter(|s| !s.is_empty()).map(str::to_string);
        self.keys = StorageKeys::for_identity(self.identity.as_deref());

        let state = persist::load(&*self.kv, &self.keys);
        self.chats = state
            .chats
            .into_iter()
            .map(|c| (c.local_id.clone(), c))
            .collect();
        self.messages = state
            .messages
            .into_iter()
            .map(|m| (m.local_id.clone(), m))
            .collect();
        self.queue = SyncQueue::from_items(state.queue);
        self.deleted = state.deleted.into_iter().collect();
        self.debounce.clear();

        tracing::info!(
            identity = self.identity.as_deref().unwrap_or("anonymous"),
            chats = self.chats.len(),
            messages = self.messages.len(),
            queued = self.queue.len(),
            "loaded local chat state"
        );
        self.emit(SyncEvent::DataLoaded {
            identity: self.identity.clone(),
            chats: self.chats.len(),
            messages: self.messages.len(),
        });
    }

    fn snapshot(&self) -> PersistedState {
        let mut chats: Vec<LocalChat> = self.chats.values().cloned().collect();
        chats.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.local_id.cmp(&b.local_id))
        });
        let mut messages: Vec<LocalMessage> = self.messages.values().cloned().collect();
        messages.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.local_id.cmp(&b.local_id))
        });
        let mut deleted: Vec<String> = self.deleted.iter().cloned().collect();
        deleted.sort();

        PersistedState {
            chats,
            messages,
            queue: self.queue.items().to_vec(),
            deleted,
        }
    }

    // -- Persistence --

    /// Writes the current state immediately.
    pub fn flush(&mut self) -> Result<()> {
        let state = self.snapshot();
        persist::save(&mut *self.kv, &self.keys, &state)?;
        self.debounce.clear();
        tracing::debug!(
            chats = state.chats.len(),
            messages = state.messages.len(),
            "flushed local state"
        );
        Ok(())
    }

    /// Writes the state if the debounce delay has passed since the last
    /// mutation. Returns true if a write happened.
    pub fn flush_if_due(&mut self) -> Result<bool> {
        if !self.debounce.is_due(self.clock.now_ms()) {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Returns true if there are mutations not yet written.
    pub fn is_dirty(&self) -> bool {
        self.debounce.is_dirty()
    }

    /// Flushes the current identity and loads the state of another one.
    pub fn switch_identity(&mut self, identity: Option<&str>) -> Result<()> {
        if self.debounce.is_dirty() {
            self.flush()?;
        }
        self.load(identity);
        Ok(())
    }

    /// Drops all state of the current identity, in memory and persisted.
    pub fn clear(&mut self) -> Result<()> {
        self.chats.clear();
        self.messages.clear();
        self.queue.clear();
        self.deleted.clear();
        self.debounce.clear();
        persist::erase(&mut *self.kv, &self.keys)?;
        self.emit(SyncEvent::DataLoaded {
            identity: self.identity.clone(),
            chats: 0,
            messages: 0,
        });
        Ok(())
    }

    // -- Lookups --

    /// Resolves a local or remote chat id to the chat's local id.
    pub(crate) fn resolve_chat(&self, id: &str) -> Option<String> {
        if self.chats.contains_key(id) {
            return Some(id.to_string());
        }
        self.chats
            .values()
            .find(|c| c.has_id(id))
            .map(|c| c.local_id.clone())
    }

    pub(crate) fn resolve_message(&self, id: &str) -> Option<String> {
        if self.messages.contains_key(id) {
            return Some(id.to_string());
        }
        self.messages
            .values()
            .find(|m| m.has_id(id))
            .map(|m| m.local_id.clone())
    }

    fn chat_mut(&mut self, id: &str) -> Result<&mut LocalChat> {
        let local_id = self
            .resolve_chat(id)
            .ok_or_else(|| Error::ChatNotFound(id.to_string()))?;
        self.chats
            .get_mut(&local_id)
            .ok_or(Error::ChatNotFound(local_id))
    }

    fn message_mut(&mut self, id: &str) -> Result<&mut LocalMessage> {
        let local_id = self
            .resolve_message(id)
            .ok_or_else(|| Error::MessageNotFound(id.to_string()))?;
        self.messages
            .get_mut(&local_id)
            .ok_or(Error::MessageNotFound(local_id))
    }

    /// Returns a chat by local or remote id.
    pub fn get_chat(&self, id: &str) -> Option<&LocalChat> {
        let local_id = self.resolve_chat(id)?;
        self.chats.get(&local_id)
    }

    /// Returns a message by local or remote id.
    pub fn get_message(&self, id: &str) -> Option<&LocalMessage> {
        let local_id = self.resolve_message(id)?;
        self.messages.get(&local_id)
    }

    /// Lists chats, most recently active first.
    pub fn get_chats(&self, mode: Option<&str>, profile_id: Option<&str>) -> Vec<LocalChat> {
        let mut chats: Vec<LocalChat> = self
            .chats
            .values()
            .filter(|c| mode.map_or(true, |m| c.mode == m))
            .filter(|c| profile_id.map_or(true, |p| c.profile_id.as_deref() == Some(p)))
            .cloned()
            .collect();
        chats.sort_by(|a, b| {
            b.last_activity()
                .cmp(&a.last_activity())
                .then_with(|| a.local_id.cmp(&b.local_id))
        });
        chats
    }

    /// Lists the messages of a chat in conversation order.
    pub fn get_messages_for_chat(&self, chat_id: &str) -> Vec<LocalMessage> {
        let Some(local_id) = self.resolve_chat(chat_id) else {
            return Vec::new();
        };
        let mut messages: Vec<LocalMessage> = self
            .messages
            .values()
            .filter(|m| m.chat_id == local_id)
            .cloned()
            .collect();
        sort_conversation(&mut messages);
        messages
    }

    /// Lists favorite messages, newest first, optionally for one profile.
    pub fn get_favorite_messages(&self, profile_id: Option<&str>) -> Vec<LocalMessage> {
        let mut favorites: Vec<LocalMessage> = self
            .messages
            .values()
            .filter(|m| m.is_favorite)
            .filter(|m| match profile_id {
                None => true,
                Some(p) => self
                    .chats
                    .get(&m.chat_id)
                    .is_some_and(|c| c.profile_id.as_deref() == Some(p)),
            })
            .cloned()
            .collect();
        favorites.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.local_id.cmp(&b.local_id))
        });
        favorites
    }

    /// Counts records by sync state.
    pub fn sync_summary(&self) -> SyncSummary {
        let mut summary = SyncSummary {
            chats: self.chats.len(),
            messages: self.messages.len(),
            queued: self.queue.len(),
            ..SyncSummary::default()
        };
        let statuses = self
            .chats
            .values()
            .map(|c| c.sync_status)
            .chain(self.messages.values().map(|m| m.sync_status));
        for status in statuses {
            match status {
                SyncStatus::Pending => summary.pending += 1,
                SyncStatus::Synced => summary.synced += 1,
                SyncStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    // -- Mutations --

    /// Creates a pending chat and queues it for sync.
    pub fn create_chat(&mut self, mode: &str, title: &str, profile_id: Option<&str>) -> LocalChat {
        let now = self.now();
        let local_id = self.ids.generate(CHAT_PREFIX, self.clock.now_ms(), |id| {
            self.chats.contains_key(id) || self.deleted.contains(id)
        });

        let chat = LocalChat::new(
            local_id.clone(),
            mode.to_string(),
            title.to_string(),
            profile_id.map(str::to_string),
            now,
        );
        self.chats.insert(local_id.clone(), chat.clone());
        self.queue.enqueue(RecordKind::Chat, &local_id);
        self.touch();

        tracing::debug!(chat = %local_id, "created chat");
        self.emit(SyncEvent::ChatCreated { local_id });
        chat
    }

    /// Appends a message to a chat and queues it for sync.
    ///
    /// With a `message_id` the call is idempotent: if a message with that
    /// local or remote id exists it is returned unchanged.
    pub fn add_message(
        &mut self,
        chat_id: &str,
        role: Role,
        content: &str,
        metadata: Value,
        message_id: Option<&str>,
    ) -> Result<LocalMessage> {
        if let Some(existing) = message_id.and_then(|id| self.get_message(id)) {
            return Ok(existing.clone());
        }

        let now = self.now();
        let local_id = match message_id {
            Some(id) => id.to_string(),
            None => self.fresh_message_id(),
        };

        let chat = self.chat_mut(chat_id)?;
        chat.last_message_at = Some(now);
        let chat_local_id = chat.local_id.clone();
        let remote_chat_id = if chat.is_synced() {
            chat.remote_id.clone()
        } else {
            None
        };

        let message = LocalMessage {
            local_id: local_id.clone(),
            remote_id: None,
            chat_id: chat_local_id.clone(),
            remote_chat_id,
            role,
            content: content.to_string(),
            metadata,
            created_at: now,
            is_favorite: false,
            sync_status: SyncStatus::Pending,
            sync_error: None,
        };
        self.messages.insert(local_id.clone(), message.clone());
        self.queue.enqueue(RecordKind::Message, &local_id);
        self.touch();

        tracing::debug!(message = %local_id, chat = %chat_local_id, "added message");
        self.emit(SyncEvent::MessageCreated {
            local_id,
            chat_id: chat_local_id,
        });
        Ok(message)
    }

    /// Marks a chat as changed locally so the next pass pushes it.
    fn requeue_chat(&mut self, local_id: &str) {
        if let Some(chat) = self.chats.get_mut(local_id) {
            chat.sync_status = SyncStatus::Pending;
            chat.sync_error = None;
        }
        self.queue.mark_changed(RecordKind::Chat, local_id);
        self.touch();
        self.emit(SyncEvent::ChatUpdated {
            local_id: local_id.to_string(),
        });
    }

    fn requeue_message(&mut self, local_id: &str) {
        if let Some(message) = self.messages.get_mut(local_id) {
            message.sync_status = SyncStatus::Pending;
            message.sync_error = None;
        }
        self.queue.mark_changed(RecordKind::Message, local_id);
        self.touch();
        self.emit(SyncEvent::MessageUpdated {
            local_id: local_id.to_string(),
        });
    }

    /// Renames a chat.
    pub fn update_chat_title(&mut self, chat_id: &str, title: &str) -> Result<LocalChat> {
        let now = self.now();
        let chat = self.chat_mut(chat_id)?;
        chat.title = title.to_string();
        chat.updated_at = now;
        let local_id = chat.local_id.clone();
        self.requeue_chat(&local_id);
        self.chat_snapshot(&local_id)
    }

    /// Archives or restores a chat.
    pub fn set_chat_archived(&mut self, chat_id: &str, archived: bool) -> Result<LocalChat> {
        let now = self.now();
        let chat = self.chat_mut(chat_id)?;
        if chat.is_archived == archived {
            return Ok(chat.clone());
        }
        chat.is_archived = archived;
        chat.updated_at = now;
        let local_id = chat.local_id.clone();
        self.requeue_chat(&local_id);
        self.chat_snapshot(&local_id)
    }

    /// Makes a chat public and returns its share token.
    ///
    /// A chat that already has a token keeps it.
    pub fn share_chat(&mut self, chat_id: &str) -> Result<String> {
        let now = self.now();
        let now_ms = self.clock.now_ms();
        let local_id = self
            .resolve_chat(chat_id)
            .ok_or_else(|| Error::ChatNotFound(chat_id.to_string()))?;
        let fresh_token = self.ids.share_token(&local_id, now_ms);

        let chat = self.chat_mut(&local_id)?;
        if chat.is_public {
            if let Some(token) = &chat.share_token {
                return Ok(token.clone());
            }
        }
        let token = chat.share_token.clone().unwrap_or(fresh_token);
        chat.share_token = Some(token.clone());
        chat.is_public = true;
        chat.shared_at = Some(now);
        chat.updated_at = now;
        self.requeue_chat(&local_id);
        Ok(token)
    }

    /// Makes a chat private again. The token is kept for a later re-share.
    pub fn unshare_chat(&mut self, chat_id: &str) -> Result<LocalChat> {
        let now = self.now();
        let chat = self.chat_mut(chat_id)?;
        if !chat.is_public {
            return Ok(chat.clone());
        }
        chat.is_public = false;
        chat.updated_at = now;
        let local_id = chat.local_id.clone();
        self.requeue_chat(&local_id);
        self.chat_snapshot(&local_id)
    }

    /// Stars or unstars a message.
    pub fn set_message_favorite(&mut self, message_id: &str, favorite: bool) -> Result<LocalMessage> {
        let message = self.message_mut(message_id)?;
        if message.is_favorite == favorite {
            return Ok(message.clone());
        }
        message.is_favorite = favorite;
        let local_id = message.local_id.clone();
        self.requeue_message(&local_id);
        self.messages
            .get(&local_id)
            .cloned()
            .ok_or(Error::MessageNotFound(local_id))
    }

    fn chat_snapshot(&self, local_id: &str) -> Result<LocalChat> {
        self.chats
            .get(local_id)
            .cloned()
            .ok_or_else(|| Error::ChatNotFound(local_id.to_string()))
    }

    /// Removes a chat and its messages.
    ///
    /// Every removed id is remembered so no later merge brings the records
    /// back. The caller deletes the remote copy when `remote_id` is set.
    pub fn delete_chat(&mut self, chat_id: &str) -> Result<DeletedChat> {
        let local_id = self
            .resolve_chat(chat_id)
            .ok_or_else(|| Error::ChatNotFound(chat_id.to_string()))?;
        let chat = self
            .chats
            .remove(&local_id)
            .ok_or_else(|| Error::ChatNotFound(local_id.clone()))?;

        let message_ids: Vec<String> = self
            .messages
            .values()
            .filter(|m| m.chat_id == local_id)
            .map(|m| m.local_id.clone())
            .collect();

        let mut forgotten = vec![chat.local_id.clone()];
        forgotten.extend(chat.remote_id.clone());
        for id in &message_ids {
            if let Some(message) = self.messages.remove(id) {
                forgotten.push(message.local_id);
                forgotten.extend(message.remote_id);
            }
        }

        let queued = std::iter::once(local_id.as_str()).chain(message_ids.iter().map(String::as_str));
        self.queue.remove_all(queued);
        self.deleted.extend(forgotten);
        self.touch();

        tracing::debug!(chat = %local_id, messages = message_ids.len(), "deleted chat");
        self.emit(SyncEvent::ChatDeleted {
            local_id: local_id.clone(),
            remote_id: chat.remote_id.clone(),
        });
        Ok(DeletedChat {
            local_id,
            remote_id: chat.remote_id,
        })
    }

    /// Removes every chat and message. Returns the number of chats removed.
    pub fn delete_all_chats(&mut self) -> usize {
        let count = self.chats.len();
        let chat_ids = self
            .chats
            .drain()
            .flat_map(|(_, c)| std::iter::once(c.local_id).chain(c.remote_id));
        let message_ids = self
            .messages
            .drain()
            .flat_map(|(_, m)| std::iter::once(m.local_id).chain(m.remote_id));
        self.deleted.extend(chat_ids.chain(message_ids));
        self.queue.clear();
        self.touch();

        tracing::debug!(count, "deleted all chats");
        self.emit(SyncEvent::AllChatsDeleted { count });
        count
    }

    /// Re-queues a failed record with a fresh retry budget.
    ///
    /// Returns false if the record is neither failed nor stranded outside the
    /// queue.
    pub fn retry_sync(&mut self, id: &str) -> Result<bool> {
        let (kind, local_id, status) = if let Some(local_id) = self.resolve_chat(id) {
            let status = self.chat_snapshot(&local_id)?.sync_status;
            (RecordKind::Chat, local_id, status)
        } else if let Some(local_id) = self.resolve_message(id) {
            let status = self
                .messages
                .get(&local_id)
                .map(|m| m.sync_status)
                .ok_or_else(|| Error::MessageNotFound(local_id.clone()))?;
            (RecordKind::Message, local_id, status)
        } else {
            return Err(Error::RecordNotFound(id.to_string()));
        };

        let queued = self.queue.contains(&local_id);
        if status == SyncStatus::Synced || (status == SyncStatus::Pending && queued) {
            return Ok(false);
        }

        if !self.queue.reset(&local_id) {
            self.queue.enqueue(kind, &local_id);
        }
        match kind {
            RecordKind::Chat => {
                if let Some(chat) = self.chats.get_mut(&local_id) {
                    chat.sync_status = SyncStatus::Pending;
                    chat.sync_error = None;
                }
            }
            RecordKind::Message => {
                if let Some(message) = self.messages.get_mut(&local_id) {
                    message.sync_status = SyncStatus::Pending;
                    message.sync_error = None;
                }
            }
        }
        self.touch();
        tracing::info!(record = %local_id, kind = %kind, "retrying sync");
        Ok(true)
    }

    /// Re-queues every failed record. Returns how many were re-queued.
    pub fn retry_all_failed(&mut self) -> usize {
        let failed: Vec<String> = self
            .chats
            .values()
            .filter(|c| c.sync_status == SyncStatus::Failed)
            .map(|c| c.local_id.clone())
            .chain(
                self.messages
                    .values()
                    .filter(|m| m.sync_status == SyncStatus::Failed)
                    .map(|m| m.local_id.clone()),
            )
            .collect();

        failed
            .iter()
            .filter(|id| matches!(self.retry_sync(id), Ok(true)))
            .count()
    }

    // -- Sync engine interface --

    /// Queue items due for an attempt now, chats first.
    pub fn due_items(&self) -> Vec<SyncQueueItem> {
        self.queue.due(&self.retry, self.clock.now_ms())
    }

    /// Drops a queue item whose record no longer exists.
    pub fn drop_queue_item(&mut self, local_id: &str) {
        if self.queue.remove(local_id).is_some() {
            self.touch();
        }
    }

    /// Revision of a record's queue item, taken before a push so the push
    /// can tell whether the record changed while it was in flight.
    pub fn queued_revision(&self, local_id: &str) -> u64 {
        self.queue.revision(local_id)
    }

    /// Builds the remote request for a queued chat.
    pub fn chat_request(&self, local_id: &str) -> Option<ChatRequest> {
        let chat = self.chats.get(local_id)?;
        let request = match &chat.remote_id {
            None => ChatRequest::Create(NewRemoteChat {
                mode: chat.mode.clone(),
                title: chat.title.clone(),
                profile_id: chat.profile_id.clone(),
            }),
            Some(remote_id) => ChatRequest::Update {
                remote_id: remote_id.clone(),
                patch: RemoteChatPatch {
                    title: chat.title.clone(),
                    is_archived: chat.is_archived,
                    is_public: chat.is_public,
                    share_token: chat.share_token.clone(),
                    shared_at: chat.shared_at,
                },
            },
        };
        Some(request)
    }

    /// Decides what to do with a queued message.
    pub fn message_plan(&self, local_id: &str) -> MessagePlan {
        let Some(message) = self.messages.get(local_id) else {
            return MessagePlan::Missing;
        };
        if let Some(remote_id) = &message.remote_id {
            return MessagePlan::Update {
                remote_id: remote_id.clone(),
                patch: RemoteMessagePatch {
                    is_favorite: message.is_favorite,
                },
            };
        }

        let parent = self.chats.get(&message.chat_id);
        match parent.filter(|c| c.is_synced()).and_then(|c| c.remote_id.clone()) {
            Some(remote_chat_id) => MessagePlan::Create {
                remote_chat_id,
                message: NewRemoteMessage {
                    role: message.role,
                    content: message.content.clone(),
                    metadata: message.metadata.clone(),
                    is_favorite: message.is_favorite,
                },
            },
            None => match parent {
                None => MessagePlan::Missing,
                Some(chat)
                    if chat.sync_status == SyncStatus::Failed
                        && !self.queue.contains(&chat.local_id) =>
                {
                    MessagePlan::ParentFailed
                }
                Some(_) => MessagePlan::AwaitingParent,
            },
        }
    }

    /// Confirms a chat push. `created` carries the id of a newly created
    /// remote chat; `revision` is the queue revision the push was built from.
    pub fn apply_chat_synced(
        &mut self,
        local_id: &str,
        created: Option<String>,
        revision: u64,
    ) -> ChatSyncResult {
        let now = self.now();
        let Some(chat) = self.chats.get_mut(local_id) else {
            return match created {
                Some(remote_id) => {
                    tracing::info!(chat = local_id, remote = %remote_id, "chat deleted during sync");
                    self.deleted.insert(remote_id.clone());
                    self.touch();
                    ChatSyncResult::Orphaned { remote_id }
                }
                None => ChatSyncResult::Ignored,
            };
        };

        if let Some(remote_id) = created {
            chat.remote_id = Some(remote_id);
        }
        let remote_id = chat.remote_id.clone().unwrap_or_default();
        let unchanged = self.queue.complete(local_id, revision);
        if unchanged {
            chat.sync_status = SyncStatus::Synced;
            chat.sync_error = None;
            chat.last_sync_at = Some(now);
        }

        for message in self.messages.values_mut().filter(|m| m.chat_id == local_id) {
            message.remote_chat_id = Some(remote_id.clone());
        }
        self.touch();

        if !unchanged {
            tracing::debug!(chat = local_id, remote = %remote_id, "chat changed during sync");
            return ChatSyncResult::Changed;
        }

        tracing::debug!(chat = local_id, remote = %remote_id, "chat synced");
        self.emit(SyncEvent::synced(RecordKind::Chat, local_id, &remote_id));
        ChatSyncResult::Applied
    }

    /// Confirms a message push built from queue `revision`.
    ///
    /// Returns false if the message is gone, or if it changed while the push
    /// was in flight and stays queued.
    pub fn apply_message_synced(
        &mut self,
        local_id: &str,
        created: Option<String>,
        revision: u64,
    ) -> bool {
        let Some(message) = self.messages.get_mut(local_id) else {
            return false;
        };
        if let Some(remote_id) = created {
            message.remote_id = Some(remote_id);
        }
        let remote_id = message.remote_id.clone().unwrap_or_default();
        if let Some(parent) = self.chats.get(&message.chat_id) {
            message.remote_chat_id = parent.remote_id.clone();
        }
        let unchanged = self.queue.complete(local_id, revision);
        if unchanged {
            message.sync_status = SyncStatus::Synced;
            message.sync_error = None;
        }
        self.touch();
        if !unchanged {
            tracing::debug!(message = local_id, remote = %remote_id, "message changed during sync");
            return false;
        }

        tracing::debug!(message = local_id, remote = %remote_id, "message synced");
        self.emit(SyncEvent::synced(RecordKind::Message, local_id, &remote_id));
        true
    }

    /// Records a failed attempt and its backoff.
    pub fn apply_sync_failure(&mut self, kind: RecordKind, local_id: &str, error: &str) -> RetryOutcome {
        let now_ms = self.clock.now_ms();
        let outcome = self.queue.record_failure(local_id, now_ms, &self.retry);
        let attempts = match outcome {
            RetryOutcome::Retry { attempts, .. } | RetryOutcome::Exhausted { attempts } => attempts,
            RetryOutcome::NotQueued => return outcome,
        };

        match kind {
            RecordKind::Chat => {
                if let Some(chat) = self.chats.get_mut(local_id) {
                    chat.sync_status = SyncStatus::Failed;
                    chat.sync_error = Some(error.to_string());
                }
            }
            RecordKind::Message => {
                if let Some(message) = self.messages.get_mut(local_id) {
                    message.sync_status = SyncStatus::Failed;
                    message.sync_error = Some(error.to_string());
                }
            }
        }
        self.touch();

        let permanent = matches!(outcome, RetryOutcome::Exhausted { .. });
        if permanent {
            tracing::warn!(record = local_id, kind = %kind, attempts, "giving up on sync: {}", error);
        } else {
            tracing::warn!(record = local_id, kind = %kind, attempts, "sync attempt failed: {}", error);
        }
        self.emit(SyncEvent::sync_failed(kind, local_id, error, attempts, permanent));
        outcome
    }

    /// Forgets the remote id of a chat the remote no longer knows, so the next
    /// attempt creates it again.
    pub fn forget_remote_chat(&mut self, local_id: &str) {
        let Some(chat) = self.chats.get_mut(local_id) else {
            return;
        };
        tracing::warn!(chat = local_id, remote = ?chat.remote_id, "remote lost chat, re-creating");
        chat.remote_id = None;
        chat.sync_status = SyncStatus::Pending;
        for message in self.messages.values_mut().filter(|m| m.chat_id == local_id) {
            message.remote_chat_id = None;
            if message.remote_id.take().is_some() {
                message.sync_status = SyncStatus::Pending;
                self.queue.enqueue(RecordKind::Message, &message.local_id);
            }
        }
        self.queue.enqueue(RecordKind::Chat, local_id);
        self.touch();
    }

    /// Forgets the remote id of a message the remote no longer knows.
    pub fn forget_remote_message(&mut self, local_id: &str) {
        let Some(message) = self.messages.get_mut(local_id) else {
            return;
        };
        tracing::warn!(message = local_id, remote = ?message.remote_id, "remote lost message, re-creating");
        message.remote_id = None;
        message.sync_status = SyncStatus::Pending;
        self.queue.enqueue(RecordKind::Message, local_id);
        self.touch();
    }

    /// Handles a message whose parent chat the remote does not know.
    ///
    /// The message waits without spending retries; the parent goes back to
    /// pending so it is created again.
    pub fn apply_parent_missing(&mut self, message_local_id: &str) {
        let Some(chat_id) = self.messages.get(message_local_id).map(|m| m.chat_id.clone()) else {
            return;
        };
        self.forget_remote_chat(&chat_id);
    }
}

/// Sorts messages by creation time, ties broken by local id.
pub(crate) fn sort_conversation(messages: &mut [LocalMessage]) {
    messages.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.local_id.cmp(&b.local_id))
    });
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
