// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle notifications for hosts and UIs.
//!
//! Listeners run synchronously on the emitting thread, after the bus lock is
//! released. A panicking listener is logged and skipped; the remaining
//! listeners and the emitting operation continue.
//!
//! Listeners must not call back into the store that emitted the event; hand
//! the event off (channel, task) instead.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::model::RecordKind;

/// Counts reported at the end of a sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Queue items attempted against the remote.
    pub attempted: usize,
    /// Records confirmed by the remote.
    pub synced: usize,
    /// Attempts that failed and stay queued.
    pub failed: usize,
    /// Messages waiting on their parent chat.
    pub deferred: usize,
    /// Records that exhausted the retry budget during this pass.
    pub exhausted: usize,
}

/// A lifecycle transition of local chat state.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    ChatCreated {
        local_id: String,
    },
    ChatUpdated {
        local_id: String,
    },
    ChatSynced {
        local_id: String,
        remote_id: String,
    },
    ChatSyncFailed {
        local_id: String,
        error: String,
        attempts: u32,
        /// True once the retry budget is spent; emitted at most once per record.
        permanent: bool,
    },
    ChatDeleted {
        local_id: String,
        remote_id: Option<String>,
    },
    AllChatsDeleted {
        count: usize,
    },
    MessageCreated {
        local_id: String,
        chat_id: String,
    },
    MessageUpdated {
        local_id: String,
    },
    MessageSynced {
        local_id: String,
        remote_id: String,
    },
    MessageSyncFailed {
        local_id: String,
        error: String,
        attempts: u32,
        permanent: bool,
    },
    SyncStarted,
    SyncCompleted(SyncReport),
    DataLoaded {
        identity: Option<String>,
        chats: usize,
        messages: usize,
    },
}

impl SyncEvent {
    /// Returns the stable event name.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::ChatCreated { .. } => "chat-created",
            SyncEvent::ChatUpdated { .. } => "chat-updated",
            SyncEvent::ChatSynced { .. } => "chat-synced",
            SyncEvent::ChatSyncFailed { .. } => "chat-sync-failed",
            SyncEvent::ChatDeleted { .. } => "chat-deleted",
            SyncEvent::AllChatsDeleted { .. } => "all-chats-deleted",
            SyncEvent::MessageCreated { .. } => "message-created",
            SyncEvent::MessageUpdated { .. } => "message-updated",
            SyncEvent::MessageSynced { .. } => "message-synced",
            SyncEvent::MessageSyncFailed { .. } => "message-sync-failed",
            SyncEvent::SyncStarted => "sync-started",
            SyncEvent::SyncCompleted(_) => "sync-completed",
            SyncEvent::DataLoaded { .. } => "data-loaded",
        }
    }

    /// Builds the synced event for a record kind.
    pub fn synced(kind: RecordKind, local_id: &str, remote_id: &str) -> Self {
        match kind {
            RecordKind::Chat => SyncEvent::ChatSynced {
                local_id: local_id.to_string(),
                remote_id: remote_id.to_string(),
            },
            RecordKind::Message => SyncEvent::MessageSynced {
                local_id: local_id.to_string(),
                remote_id: remote_id.to_string(),
            },
        }
    }

    /// Builds the sync-failed event for a record kind.
    pub fn sync_failed(
        kind: RecordKind,
        local_id: &str,
        error: &str,
        attempts: u32,
        permanent: bool,
    ) -> Self {
        let local_id = local_id.to_string();
        let error = error.to_string();
        match kind {
            RecordKind::Chat => SyncEvent::ChatSyncFailed {
                local_id,
                error,
                attempts,
                permanent,
            },
            RecordKind::Message => SyncEvent::MessageSyncFailed {
                local_id,
                error,
                attempts,
                permanent,
            },
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Publish/subscribe hub for [`SyncEvent`]s.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for every event.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Delivers `event` to every listener registered at the time of the call.
    pub fn emit(&self, event: &SyncEvent) {
        let snapshot: Vec<Listener> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!("listener panicked while handling {}", event.name());
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
