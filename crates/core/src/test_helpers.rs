// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for store, reconcile and sync tests.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::clock::{datetime_from_ms, ManualClock};
use crate::events::{EventBus, SyncEvent};
use crate::kv::MemoryKv;
use crate::queue::RetryPolicy;
use crate::remote::{RemoteChat, RemoteMessage};
use crate::model::Role;
use crate::store::{LocalStore, StoreOptions};

/// Start time used by every fixture clock.
pub const T0: u64 = 1_700_000_000_000;

/// A store over in-memory storage with a manual clock and an event recorder.
pub struct Harness {
    pub clock: ManualClock,
    pub kv: MemoryKv,
    pub events: Arc<EventBus>,
    seen: Arc<Mutex<Vec<SyncEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        let events = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        events.subscribe(move |e: &SyncEvent| sink.lock().unwrap().push(e.clone()));
        Harness {
            clock: ManualClock::new(T0),
            kv: MemoryKv::new(),
            events,
            seen,
        }
    }

    pub fn options() -> StoreOptions {
        StoreOptions {
            retry: RetryPolicy {
                initial_delay: std::time::Duration::from_millis(1_000),
                max_delay: std::time::Duration::from_millis(8_000),
                max_retries: 3,
            },
            persist_debounce: std::time::Duration::from_millis(1_000),
        }
    }

    pub fn open(&self, identity: Option<&str>) -> LocalStore {
        LocalStore::open(
            Box::new(self.kv.clone()),
            Arc::new(self.clock.clone()),
            Arc::clone(&self.events),
            identity,
            Self::options(),
        )
    }

    pub fn advance_ms(&self, ms: u64) {
        self.clock.advance(std::time::Duration::from_millis(ms));
    }

    pub fn recorded(&self) -> Vec<SyncEvent> {
        self.seen.lock().unwrap().clone()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.recorded().iter().map(SyncEvent::name).collect()
    }

    pub fn reset_events(&self) {
        self.seen.lock().unwrap().clear();
    }
}

pub fn at(offset_ms: u64) -> DateTime<Utc> {
    datetime_from_ms(T0 + offset_ms)
}

pub fn remote_chat(id: &str, title: &str) -> RemoteChat {
    RemoteChat {
        id: id.to_string(),
        mode: "general".to_string(),
        title: title.to_string(),
        profile_id: None,
        created_at: at(0),
        updated_at: at(0),
        last_message_at: None,
        is_archived: false,
        is_public: false,
        share_token: None,
        shared_at: None,
    }
}

pub fn remote_message(id: &str, chat_id: &str, role: Role, content: &str, offset_ms: u64) -> RemoteMessage {
    RemoteMessage {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        role,
        content: content.to_string(),
        metadata: serde_json::Value::Null,
        created_at: at(offset_ms),
        is_favorite: false,
    }
}
