// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Folding authoritative server snapshots into local state.
//!
//! Merge rules:
//! - Ids in the deleted set are never re-materialized
//! - Chats: server wins for shared fields (title, mode, profile, timestamps,
//!   archive/share), local bookkeeping (local id, sync status) is kept
//! - Messages match by remote id, then by local id, then (unsynced only) by
//!   identical chat, role and content; each local message is claimed at most
//!   once per merge
//! - Unmatched server records are inserted as synced with their remote id as
//!   local id
//!
//! Merges never enqueue sync work and are idempotent: merging the same
//! snapshot twice changes nothing the second time.

use std::collections::HashSet;

use crate::events::SyncEvent;
use crate::model::{LocalChat, LocalMessage, SyncStatus};
use crate::remote::{RemoteChat, RemoteMessage};
use crate::store::LocalStore;

/// Counts of what a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Server records added locally.
    pub inserted: usize,
    /// Local records whose server-owned fields changed.
    pub updated: usize,
    /// Unsynced local records matched to a server record.
    pub linked: usize,
    /// Server records ignored because they were deleted locally.
    pub skipped_deleted: usize,
}

impl MergeReport {
    /// Returns true if the merge changed local state.
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.linked > 0
    }
}

impl std::ops::AddAssign for MergeReport {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.linked += other.linked;
        self.skipped_deleted += other.skipped_deleted;
    }
}

/// Overwrites the server-owned fields of `chat`. Returns true if any changed.
fn overwrite_chat(chat: &mut LocalChat, remote: &RemoteChat) -> bool {
    let last_message_at = match (chat.last_message_at, remote.last_message_at) {
        (Some(local), Some(server)) => Some(local.max(server)),
        (local, server) => local.or(server),
    };

    let before = chat.clone();
    chat.mode.clone_from(&remote.mode);
    chat.title.clone_from(&remote.title);
    chat.profile_id.clone_from(&remote.profile_id);
    chat.created_at = remote.created_at;
    chat.updated_at = remote.updated_at;
    chat.last_message_at = last_message_at;
    chat.is_archived = remote.is_archived;
    chat.is_public = remote.is_public;
    chat.share_token.clone_from(&remote.share_token);
    chat.shared_at = remote.shared_at;
    if chat.remote_id.is_none() {
        chat.remote_id = Some(remote.id.clone());
    }

    *chat != before
}

impl LocalStore {
    /// Merges a server chat list into local state.
    pub fn merge_remote_chats(&mut self, remote: &[RemoteChat]) -> MergeReport {
        let mut report = MergeReport::default();
        let now = self.now();

        for server in remote {
            if self.deleted.contains(&server.id) {
                report.skipped_deleted += 1;
                continue;
            }

            if let Some(local_id) = self.resolve_chat(&server.id) {
                let Some(chat) = self.chats.get_mut(&local_id) else {
                    continue;
                };
                if overwrite_chat(chat, server) {
                    report.updated += 1;
                    self.emit(SyncEvent::ChatUpdated { local_id });
                }
                continue;
            }

            let chat = LocalChat {
                remote_id: Some(server.id.clone()),
                last_message_at: server.last_message_at,
                is_archived: server.is_archived,
                is_public: server.is_public,
                share_token: server.share_token.clone(),
                shared_at: server.shared_at,
                sync_status: SyncStatus::Synced,
                last_sync_at: Some(now),
                updated_at: server.updated_at,
                ..LocalChat::new(
                    server.id.clone(),
                    server.mode.clone(),
                    server.title.clone(),
                    server.profile_id.clone(),
                    server.created_at,
                )
            };
            self.chats.insert(server.id.clone(), chat);
            report.inserted += 1;
            self.emit(SyncEvent::ChatSynced {
                local_id: server.id.clone(),
                remote_id: server.id.clone(),
            });
        }

        if report.changed() {
            self.touch();
        }
        tracing::debug!(
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped_deleted,
            "merged remote chats"
        );
        report
    }

    /// Merges the server message list of one chat into local state.
    ///
    /// `chat_id` may be the chat's local or remote id. Unknown and deleted
    /// chats are left alone.
    pub fn merge_remote_messages(&mut self, chat_id: &str, remote: &[RemoteMessage]) -> MergeReport {
        let mut report = MergeReport::default();
        if self.deleted.contains(chat_id) {
            return report;
        }
        let Some(local_chat_id) = self.resolve_chat(chat_id) else {
            return report;
        };
        let remote_chat_id = self
            .chats
            .get(&local_chat_id)
            .and_then(|c| c.remote_id.clone());

        let mut claimed: HashSet<String> = HashSet::new();
        let mut newest = None;

        for server in remote {
            if self.deleted.contains(&server.id) {
                report.skipped_deleted += 1;
                continue;
            }
            newest = newest.max(Some(server.created_at));

            // Already linked: only mutable fields can change.
            if let Some(local_id) = self.linked_message(&server.id) {
                claimed.insert(local_id.clone());
                let queued = self.queue.contains(&local_id);
                if let Some(message) = self.messages.get_mut(&local_id) {
                    if !queued && message.is_favorite != server.is_favorite {
                        message.is_favorite = server.is_favorite;
                        report.updated += 1;
                        self.emit(SyncEvent::MessageUpdated { local_id });
                    }
                }
                continue;
            }

            let candidate = self
                .messages
                .get(&server.id)
                .filter(|m| m.chat_id == local_chat_id && m.remote_id.is_none())
                .map(|m| m.local_id.clone())
                .or_else(|| self.content_match(&local_chat_id, server, &claimed));

            if let Some(local_id) = candidate {
                claimed.insert(local_id.clone());
                if let Some(message) = self.messages.get_mut(&local_id) {
                    message.remote_id = Some(server.id.clone());
                    message.remote_chat_id.clone_from(&remote_chat_id);
                    message.sync_status = SyncStatus::Synced;
                    message.sync_error = None;
                }
                self.queue.remove(&local_id);
                report.linked += 1;
                tracing::debug!(message = %local_id, remote = %server.id, "linked message to server copy");
                self.emit(SyncEvent::MessageSynced {
                    local_id,
                    remote_id: server.id.clone(),
                });
                continue;
            }

            let local_id = if self.messages.contains_key(&server.id) {
                self.fresh_message_id()
            } else {
                server.id.clone()
            };
            let message = LocalMessage {
                local_id: local_id.clone(),
                remote_id: Some(server.id.clone()),
                chat_id: local_chat_id.clone(),
                remote_chat_id: remote_chat_id.clone(),
                role: server.role,
                content: server.content.clone(),
                metadata: server.metadata.clone(),
                created_at: server.created_at,
                is_favorite: server.is_favorite,
                sync_status: SyncStatus::Synced,
                sync_error: None,
            };
            claimed.insert(local_id.clone());
            self.messages.insert(local_id.clone(), message);
            report.inserted += 1;
            self.emit(SyncEvent::MessageSynced {
                local_id,
                remote_id: server.id.clone(),
            });
        }

        if let (Some(newest), Some(chat)) = (newest, self.chats.get_mut(&local_chat_id)) {
            if chat.last_message_at.map_or(true, |at| at < newest) {
                chat.last_message_at = Some(newest);
                report.updated += 1;
            }
        }

        if report.changed() {
            self.touch();
        }
        tracing::debug!(
            chat = %local_chat_id,
            inserted = report.inserted,
            linked = report.linked,
            updated = report.updated,
            "merged remote messages"
        );
        report
    }

    /// Local id of the message already linked to `remote_id`.
    fn linked_message(&self, remote_id: &str) -> Option<String> {
        self.messages
            .values()
            .find(|m| m.remote_id.as_deref() == Some(remote_id))
            .map(|m| m.local_id.clone())
    }

    /// Oldest unclaimed, unsynced local message with the same role and content.
    fn content_match(
        &self,
        local_chat_id: &str,
        server: &RemoteMessage,
        claimed: &HashSet<String>,
    ) -> Option<String> {
        self.messages
            .values()
            .filter(|m| {
                m.chat_id == local_chat_id
                    && m.remote_id.is_none()
                    && m.role == server.role
                    && m.content == server.content
                    && !claimed.contains(&m.local_id)
            })
            .min_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.local_id.cmp(&b.local_id))
            })
            .map(|m| m.local_id.clone())
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
