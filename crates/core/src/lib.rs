// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! chatsync-core: local-first chat and message synchronization
//!
//! This crate provides the data model, the durable local store with its sync
//! queue, the reconciler, lifecycle events, persistence backends, the remote
//! backend contract and the wire protocol shared by the chatsync client and
//! the reference server.

pub mod clock;
pub mod db;
pub mod document;
pub mod error;
pub mod events;
pub mod id;
pub mod jsonl;
pub mod kv;
pub mod memory_remote;
pub mod model;
pub mod persist;
pub mod protocol;
pub mod queue;
pub mod reconcile;
pub mod remote;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_helpers;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use db::SqliteKv;
pub use error::{Error, Result};
pub use events::{EventBus, ListenerId, SyncEvent, SyncReport};
pub use kv::{FileKv, KvStore, MemoryKv};
pub use memory_remote::MemoryRemote;
pub use model::{LocalChat, LocalMessage, RecordKind, Role, SyncStatus};
pub use queue::{RetryPolicy, SyncQueue, SyncQueueItem};
pub use reconcile::MergeReport;
pub use remote::{Remote, RemoteChat, RemoteError, RemoteMessage, RemoteResult};
pub use store::{DeletedChat, LocalStore, SharedStore, StoreOptions, SyncSummary};
pub use sync::{SyncEngine, SyncOutcome};
