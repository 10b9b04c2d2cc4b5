// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-process implementation of the remote backend.
//!
//! Backs the reference server and the sync tests. Connectivity and failures
//! can be injected: [`MemoryRemote::set_online`] makes every call fail with a
//! network error, [`MemoryRemote::fail_next`] fails the next N calls, and
//! [`MemoryRemote::lose_chat`] drops a chat the way a server-side cleanup
//! would.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::{ClockSource, SystemClock};
use crate::id::IdGenerator;
use crate::remote::{
    NewRemoteChat, NewRemoteMessage, Remote, RemoteChat, RemoteChatPatch, RemoteError,
    RemoteFuture, RemoteMessage, RemoteMessagePatch, RemoteResult,
};

const CHAT_ID_PREFIX: &str = "rc";
const MESSAGE_ID_PREFIX: &str = "rm";

#[derive(Debug, Default)]
struct State {
    chats: BTreeMap<String, RemoteChat>,
    messages: BTreeMap<String, RemoteMessage>,
    online: bool,
    fail_next: usize,
    calls: Vec<&'static str>,
}

/// A remote backend held entirely in memory.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn ClockSource>,
    ids: Arc<IdGenerator>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        MemoryRemote {
            state: Arc::new(Mutex::new(State {
                online: true,
                ..State::default()
            })),
            clock,
            ids: Arc::new(IdGenerator::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces all records, e.g. when restoring from disk.
    pub fn restore(&self, chats: Vec<RemoteChat>, messages: Vec<RemoteMessage>) {
        let mut state = self.lock();
        state.chats = chats.into_iter().map(|c| (c.id.clone(), c)).collect();
        state.messages = messages.into_iter().map(|m| (m.id.clone(), m)).collect();
    }

    /// All chats ordered by id.
    pub fn chats(&self) -> Vec<RemoteChat> {
        self.lock().chats.values().cloned().collect()
    }

    /// All messages ordered by id.
    pub fn messages(&self) -> Vec<RemoteMessage> {
        self.lock().messages.values().cloned().collect()
    }

    pub fn chat(&self, id: &str) -> Option<RemoteChat> {
        self.lock().chats.get(id).cloned()
    }

    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Makes the next `count` calls fail with a network error.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Removes a chat and its messages without the caller asking for it.
    pub fn lose_chat(&self, id: &str) {
        let mut state = self.lock();
        state.chats.remove(id);
        state.messages.retain(|_, m| m.chat_id != id);
    }

    /// Names of the calls received so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// Runs `op` against the state unless offline or a failure is injected.
    fn call<T, F>(&self, name: &'static str, op: F) -> RemoteResult<T>
    where
        F: FnOnce(&mut State, &Self) -> RemoteResult<T>,
    {
        let mut state = self.lock();
        state.calls.push(name);
        if !state.online {
            return Err(RemoteError::Network("remote unreachable".to_string()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(RemoteError::Network("injected failure".to_string()));
        }
        op(&mut state, self)
    }

    fn respond<T: Send + 'static>(result: RemoteResult<T>) -> RemoteFuture<'static, T> {
        Box::pin(async move { result })
    }
}

fn chat_not_found(id: &str) -> RemoteError {
    RemoteError::NotFound(format!("chat {id}"))
}

impl Remote for MemoryRemote {
    fn create_chat(&self, chat: NewRemoteChat) -> RemoteFuture<'_, String> {
        Self::respond(self.call("create_chat", |state, this| {
            let now = this.clock.now();
            let id = this.ids.generate(CHAT_ID_PREFIX, this.clock.now_ms(), |id| {
                state.chats.contains_key(id)
            });
            state.chats.insert(
                id.clone(),
                RemoteChat {
                    id: id.clone(),
                    mode: chat.mode,
                    title: chat.title,
                    profile_id: chat.profile_id,
                    created_at: now,
                    updated_at: now,
                    last_message_at: None,
                    is_archived: false,
                    is_public: false,
                    share_token: None,
                    shared_at: None,
                },
            );
            Ok(id)
        }))
    }

    fn update_chat(&self, remote_id: &str, patch: RemoteChatPatch) -> RemoteFuture<'_, ()> {
        Self::respond(self.call("update_chat", |state, this| {
            let chat = state
                .chats
                .get_mut(remote_id)
                .ok_or_else(|| chat_not_found(remote_id))?;
            chat.title = patch.title;
            chat.is_archived = patch.is_archived;
            chat.is_public = patch.is_public;
            chat.share_token = patch.share_token;
            chat.shared_at = patch.shared_at;
            chat.updated_at = this.clock.now();
            Ok(())
        }))
    }

    fn create_message(
        &self,
        remote_chat_id: &str,
        message: NewRemoteMessage,
    ) -> RemoteFuture<'_, String> {
        Self::respond(self.call("create_message", |state, this| {
            let now = this.clock.now();
            let chat = state
                .chats
                .get_mut(remote_chat_id)
                .ok_or_else(|| chat_not_found(remote_chat_id))?;
            chat.last_message_at = Some(now);

            let id = this.ids.generate(MESSAGE_ID_PREFIX, this.clock.now_ms(), |id| {
                state.messages.contains_key(id)
            });
            state.messages.insert(
                id.clone(),
                RemoteMessage {
                    id: id.clone(),
                    chat_id: remote_chat_id.to_string(),
                    role: message.role,
                    content: message.content,
                    metadata: message.metadata,
                    created_at: now,
                    is_favorite: message.is_favorite,
                },
            );
            Ok(id)
        }))
    }

    fn update_message(&self, remote_id: &str, patch: RemoteMessagePatch) -> RemoteFuture<'_, ()> {
        Self::respond(self.call("update_message", |state, _| {
            let message = state
                .messages
                .get_mut(remote_id)
                .ok_or_else(|| RemoteError::NotFound(format!("message {remote_id}")))?;
            message.is_favorite = patch.is_favorite;
            Ok(())
        }))
    }

    fn delete_chat(&self, remote_id: &str) -> RemoteFuture<'_, ()> {
        Self::respond(self.call("delete_chat", |state, _| {
            state
                .chats
                .remove(remote_id)
                .ok_or_else(|| chat_not_found(remote_id))?;
            state.messages.retain(|_, m| m.chat_id != remote_id);
            Ok(())
        }))
    }

    fn delete_all_chats(&self) -> RemoteFuture<'_, ()> {
        Self::respond(self.call("delete_all_chats", |state, _| {
            state.chats.clear();
            state.messages.clear();
            Ok(())
        }))
    }

    fn list_chats(&self, profile_id: Option<&str>) -> RemoteFuture<'_, Vec<RemoteChat>> {
        Self::respond(self.call("list_chats", |state, _| {
            let mut chats: Vec<RemoteChat> = state
                .chats
                .values()
                .filter(|c| profile_id.map_or(true, |p| c.profile_id.as_deref() == Some(p)))
                .cloned()
                .collect();
            chats.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(chats)
        }))
    }

    fn list_messages(&self, remote_chat_id: &str) -> RemoteFuture<'_, Vec<RemoteMessage>> {
        Self::respond(self.call("list_messages", |state, _| {
            if !state.chats.contains_key(remote_chat_id) {
                return Err(chat_not_found(remote_chat_id));
            }
            let mut messages: Vec<RemoteMessage> = state
                .messages
                .values()
                .filter(|m| m.chat_id == remote_chat_id)
                .cloned()
                .collect();
            messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            Ok(messages)
        }))
    }
}

#[cfg(test)]
#[path = "memory_remote_tests.rs"]
mod tests;
