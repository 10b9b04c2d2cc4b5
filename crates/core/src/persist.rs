// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted layout of local chat state.
//!
//! Each identity owns four keys, each holding a JSON array:
//!
//! ```text
//! chatsync:<identity>:chats     [LocalChat]
//! chatsync:<identity>:messages  [LocalMessage]
//! chatsync:<identity>:queue     [SyncQueueItem]
//! chatsync:<identity>:deleted   [String]
//! ```
//!
//! Signed-out state uses the identity `anonymous`.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::kv::KvStore;
use crate::model::{LocalChat, LocalMessage};
use crate::queue::SyncQueueItem;

const KEY_PREFIX: &str = "chatsync";
const ANONYMOUS: &str = "anonymous";

/// Storage keys for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub chats: String,
    pub messages: String,
    pub queue: String,
    pub deleted: String,
}

impl StorageKeys {
    pub fn for_identity(identity: Option<&str>) -> Self {
        let scope = identity.filter(|s| !s.is_empty()).unwrap_or(ANONYMOUS);
        StorageKeys {
            chats: format!("{KEY_PREFIX}:{scope}:chats"),
            messages: format!("{KEY_PREFIX}:{scope}:messages"),
            queue: format!("{KEY_PREFIX}:{scope}:queue"),
            deleted: format!("{KEY_PREFIX}:{scope}:deleted"),
        }
    }
}

/// Everything persisted for one identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub chats: Vec<LocalChat>,
    pub messages: Vec<LocalMessage>,
    pub queue: Vec<SyncQueueItem>,
    pub deleted: Vec<String>,
}

/// Reads one collection. Missing or unreadable collections come back empty.
fn load_collection<T: DeserializeOwned>(kv: &dyn KvStore, key: &str) -> Vec<T> {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!("failed to read {}: {}", key, e);
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("discarding corrupted collection {}: {}", key, e);
            Vec::new()
        }
    }
}

fn save_collection<T: Serialize>(kv: &mut dyn KvStore, key: &str, records: &[T]) -> Result<()> {
    let json = serde_json::to_string(records)?;
    kv.set(key, &json)
}

/// Loads the state stored under `keys`.
pub fn load(kv: &dyn KvStore, keys: &StorageKeys) -> PersistedState {
    PersistedState {
        chats: load_collection(kv, &keys.chats),
        messages: load_collection(kv, &keys.messages),
        queue: load_collection(kv, &keys.queue),
        deleted: load_collection(kv, &keys.deleted),
    }
}

/// Writes the state under `keys`.
pub fn save(kv: &mut dyn KvStore, keys: &StorageKeys, state: &PersistedState) -> Result<()> {
    save_collection(kv, &keys.chats, &state.chats)?;
    save_collection(kv, &keys.messages, &state.messages)?;
    save_collection(kv, &keys.queue, &state.queue)?;
    save_collection(kv, &keys.deleted, &state.deleted)?;
    Ok(())
}

/// Removes everything stored under `keys`.
pub fn erase(kv: &mut dyn KvStore, keys: &StorageKeys) -> Result<()> {
    kv.remove(&keys.chats)?;
    kv.remove(&keys.messages)?;
    kv.remove(&keys.queue)?;
    kv.remove(&keys.deleted)?;
    Ok(())
}

/// Trailing debounce for persistence writes.
///
/// Every mutation calls [`Debouncer::touch`]; a flush is due once no mutation
/// happened for `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    delay: Duration,
    last_touch_ms: Option<u64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            last_touch_ms: None,
        }
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_touch_ms = Some(now_ms);
    }

    pub fn is_dirty(&self) -> bool {
        self.last_touch_ms.is_some()
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_touch_ms {
            Some(last) => u128::from(now_ms.saturating_sub(last)) >= self.delay.as_millis(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.last_touch_ms = None;
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
