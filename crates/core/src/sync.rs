// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync passes against a remote backend.
//!
//! A pass drains the due part of the queue: chats first, then the messages
//! that are due once the chat phase has finished, so a chat created in this
//! pass lets its messages go out in the same pass. Only one pass runs at a
//! time; a second caller gets [`SyncOutcome::Busy`].
//!
//! The store lock is only taken between remote calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard};

use crate::error::{Error, Result};
use crate::events::{SyncEvent, SyncReport};
use crate::model::RecordKind;
use crate::queue::RetryOutcome;
use crate::reconcile::MergeReport;
use crate::remote::{Remote, RemoteError, RemoteResult};
use crate::store::{ChatRequest, ChatSyncResult, LocalStore, MessagePlan, SharedStore};

/// Result of [`SyncEngine::run_pass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Another pass was already running.
    Busy,
    /// The engine is offline; nothing was attempted.
    Offline,
    Completed(SyncReport),
}

/// Clears the busy flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Pushes queued local changes to a [`Remote`] and pulls server state back.
pub struct SyncEngine {
    store: SharedStore,
    remote: Arc<dyn Remote>,
    syncing: AtomicBool,
    online: AtomicBool,
}

impl SyncEngine {
    pub fn new(store: SharedStore, remote: Arc<dyn Remote>) -> Self {
        SyncEngine {
            store,
            remote,
            syncing: AtomicBool::new(false),
            online: AtomicBool::new(true),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn Remote> {
        &self.remote
    }

    /// Records a connectivity change. Returns true if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous != online {
            tracing::info!(online, "connectivity changed");
        }
        previous != online
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, LocalStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SyncEvent) {
        let events = Arc::clone(self.lock().events());
        events.emit(&event);
    }

    /// Runs one pass over the due queue items.
    pub async fn run_pass(&self) -> SyncOutcome {
        if !self.is_online() {
            tracing::debug!("offline, skipping sync pass");
            return SyncOutcome::Offline;
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("sync pass already running");
            return SyncOutcome::Busy;
        }
        let _guard = PassGuard(&self.syncing);

        self.emit(SyncEvent::SyncStarted);
        let mut report = SyncReport::default();

        let chats: Vec<String> = due_ids(&self.lock(), RecordKind::Chat);
        for local_id in &chats {
            self.sync_chat(local_id, &mut report).await;
        }

        let messages: Vec<String> = due_ids(&self.lock(), RecordKind::Message);
        for local_id in &messages {
            self.sync_message(local_id, &mut report).await;
        }

        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                synced = report.synced,
                failed = report.failed,
                deferred = report.deferred,
                exhausted = report.exhausted,
                "sync pass complete"
            );
        } else if report.deferred > 0 {
            tracing::debug!(deferred = report.deferred, "sync pass only deferred messages");
        }
        self.emit(SyncEvent::SyncCompleted(report));
        SyncOutcome::Completed(report)
    }

    async fn sync_chat(&self, local_id: &str, report: &mut SyncReport) {
        let (request, revision) = {
            let store = self.lock();
            (store.chat_request(local_id), store.queued_revision(local_id))
        };
        let Some(request) = request else {
            self.lock().drop_queue_item(local_id);
            return;
        };

        report.attempted += 1;
        tracing::debug!(chat = local_id, "pushing chat");
        let result = self.push_chat(local_id, request).await;

        let orphan = {
            let mut store = self.lock();
            match result {
                Ok(created) => match store.apply_chat_synced(local_id, created, revision) {
                    ChatSyncResult::Applied => {
                        report.synced += 1;
                        None
                    }
                    ChatSyncResult::Orphaned { remote_id } => Some(remote_id),
                    ChatSyncResult::Ignored | ChatSyncResult::Changed => None,
                },
                Err(e) => {
                    record_failure(&mut store, RecordKind::Chat, local_id, &e, report);
                    None
                }
            }
        };

        if let Some(remote_id) = orphan {
            self.propagate_delete(&remote_id).await;
        }
    }

    /// Sends a chat create or update. Returns the new remote id on create.
    ///
    /// An update the remote rejects as not found re-creates the chat.
    async fn push_chat(&self, local_id: &str, request: ChatRequest) -> RemoteResult<Option<String>> {
        let (remote_id, patch) = match request {
            ChatRequest::Create(chat) => return self.remote.create_chat(chat).await.map(Some),
            ChatRequest::Update { remote_id, patch } => (remote_id, patch),
        };

        match self.remote.update_chat(&remote_id, patch).await {
            Ok(()) => Ok(None),
            Err(e) if e.is_not_found() => {
                let recreate = {
                    let mut store = self.lock();
                    store.forget_remote_chat(local_id);
                    store.chat_request(local_id)
                };
                match recreate {
                    Some(ChatRequest::Create(chat)) => self.remote.create_chat(chat).await.map(Some),
                    _ => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn sync_message(&self, local_id: &str, report: &mut SyncReport) {
        let (plan, revision) = {
            let store = self.lock();
            (store.message_plan(local_id), store.queued_revision(local_id))
        };
        match plan {
            MessagePlan::Missing => self.lock().drop_queue_item(local_id),
            MessagePlan::AwaitingParent => {
                tracing::debug!(message = local_id, "waiting for parent chat");
                report.deferred += 1;
            }
            MessagePlan::ParentFailed => {
                tracing::trace!(message = local_id, "parent chat failed, skipping");
            }
            MessagePlan::Create {
                remote_chat_id,
                message,
            } => {
                report.attempted += 1;
                tracing::debug!(message = local_id, chat = %remote_chat_id, "pushing message");
                let result = self.remote.create_message(&remote_chat_id, message).await;
                let mut store = self.lock();
                match result {
                    Ok(remote_id) => {
                        if store.apply_message_synced(local_id, Some(remote_id), revision) {
                            report.synced += 1;
                        }
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::warn!(message = local_id, chat = %remote_chat_id, "parent chat missing remotely");
                        store.apply_parent_missing(local_id);
                        report.deferred += 1;
                    }
                    Err(e) => record_failure(&mut store, RecordKind::Message, local_id, &e, report),
                }
            }
            MessagePlan::Update { remote_id, patch } => {
                report.attempted += 1;
                let result = self.remote.update_message(&remote_id, patch).await;
                let mut store = self.lock();
                match result {
                    Ok(()) => {
                        if store.apply_message_synced(local_id, None, revision) {
                            report.synced += 1;
                        }
                    }
                    Err(e) if e.is_not_found() => store.forget_remote_message(local_id),
                    Err(e) => record_failure(&mut store, RecordKind::Message, local_id, &e, report),
                }
            }
        }
    }

    /// Fetches the server's chats and messages and merges them locally.
    pub async fn pull(&self, profile_id: Option<&str>) -> Result<MergeReport> {
        if !self.is_online() {
            return Err(Error::Remote(RemoteError::Network(
                "offline".to_string(),
            )));
        }

        let chats = self.remote.list_chats(profile_id).await?;
        let mut report = self.lock().merge_remote_chats(&chats);

        for chat in &chats {
            let deleted = self.lock().is_deleted(&chat.id);
            if deleted {
                continue;
            }
            match self.remote.list_messages(&chat.id).await {
                Ok(messages) => {
                    let merged = self.lock().merge_remote_messages(&chat.id, &messages);
                    report += merged;
                }
                // Deleted between the two listings
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            chats = chats.len(),
            inserted = report.inserted,
            linked = report.linked,
            updated = report.updated,
            "pulled remote state"
        );
        Ok(report)
    }

    /// Deletes a chat remotely, logging instead of failing.
    ///
    /// Not-found and unauthorized replies count as success.
    pub async fn propagate_delete(&self, remote_id: &str) {
        match self.remote.delete_chat(remote_id).await {
            Ok(()) => tracing::debug!(remote = remote_id, "deleted remote chat"),
            Err(e) if e.is_not_found() || e.is_unauthorized() => {
                tracing::debug!(remote = remote_id, "remote chat already gone: {}", e)
            }
            Err(e) => tracing::warn!(remote = remote_id, "failed to delete remote chat: {}", e),
        }
    }

    /// Deletes every remote chat, logging instead of failing.
    pub async fn propagate_delete_all(&self) {
        match self.remote.delete_all_chats().await {
            Ok(()) => tracing::debug!("deleted all remote chats"),
            Err(e) if e.is_not_found() || e.is_unauthorized() => {}
            Err(e) => tracing::warn!("failed to delete remote chats: {}", e),
        }
    }
}

fn due_ids(store: &LocalStore, kind: RecordKind) -> Vec<String> {
    store
        .due_items()
        .into_iter()
        .filter(|item| item.kind == kind)
        .map(|item| item.local_id)
        .collect()
}

fn record_failure(
    store: &mut LocalStore,
    kind: RecordKind,
    local_id: &str,
    error: &RemoteError,
    report: &mut SyncReport,
) {
    match store.apply_sync_failure(kind, local_id, &error.to_string()) {
        RetryOutcome::Retry { .. } => report.failed += 1,
        RetryOutcome::Exhausted { .. } => report.exhausted += 1,
        RetryOutcome::NotQueued => {}
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
