// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync queue with exponential backoff bookkeeping.
//!
//! Every local record awaiting confirmation from the remote has exactly one
//! [`SyncQueueItem`]. An item is due when
//! `now - last_retry_at >= min(initial_delay * 2^retry_count, max_delay)`.
//! Items that exhaust the retry budget leave the queue.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::RecordKind;

/// A pending reconciliation task for one local record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub local_id: String,
    #[serde(default)]
    pub retry_count: u32,
    /// Time of the last failed attempt in milliseconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<u64>,
    /// Bumped by every local edit made while the item is queued.
    #[serde(default)]
    pub revision: u64,
}

impl SyncQueueItem {
    pub fn new(kind: RecordKind, local_id: impl Into<String>) -> Self {
        SyncQueueItem {
            kind,
            local_id: local_id.into(),
            retry_count: 0,
            last_retry_at: None,
            revision: 0,
        }
    }
}

/// Backoff parameters for sync attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// Failures after which an item leaves the queue.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Returns `min(initial_delay * 2^retry_count, max_delay)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Returns true if `item` may be attempted at `now_ms`.
    pub fn is_due(&self, item: &SyncQueueItem, now_ms: u64) -> bool {
        match item.last_retry_at {
            None => true,
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last);
                u128::from(elapsed) >= self.delay_for(item.retry_count).as_millis()
            }
        }
    }
}

/// What happened to an item after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The item stays queued and becomes due again after `next_delay`.
    Retry { attempts: u32, next_delay: Duration },
    /// The retry budget is spent; the item left the queue.
    Exhausted { attempts: u32 },
    /// The item was not queued (deleted or already exhausted).
    NotQueued,
}

/// Ordered set of queue items, at most one per local id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncQueue {
    items: Vec<SyncQueueItem>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from persisted items, dropping duplicate ids.
    pub fn from_items(items: Vec<SyncQueueItem>) -> Self {
        let mut queue = SyncQueue::new();
        for item in items {
            if !queue.contains(&item.local_id) {
                queue.items.push(item);
            }
        }
        queue
    }

    /// Adds an item for `local_id`.
    ///
    /// Returns false if the record is already queued; its bookkeeping is kept.
    pub fn enqueue(&mut self, kind: RecordKind, local_id: &str) -> bool {
        if self.contains(local_id) {
            return false;
        }
        self.items.push(SyncQueueItem::new(kind, local_id));
        true
    }

    /// Queues `local_id`, or bumps the revision of its existing item so an
    /// attempt already in flight does not complete it.
    pub fn mark_changed(&mut self, kind: RecordKind, local_id: &str) {
        match self.items.iter_mut().find(|i| i.local_id == local_id) {
            Some(item) => item.revision = item.revision.wrapping_add(1),
            None => self.items.push(SyncQueueItem::new(kind, local_id)),
        }
    }

    /// Current revision of a queued record; 0 when not queued.
    pub fn revision(&self, local_id: &str) -> u64 {
        self.get(local_id).map_or(0, |i| i.revision)
    }

    /// Removes the item for `local_id` if it is still at `revision`.
    ///
    /// Returns false when the record changed after the attempt started; the
    /// item then stays queued.
    pub fn complete(&mut self, local_id: &str, revision: u64) -> bool {
        match self.get(local_id) {
            Some(item) if item.revision != revision => false,
            Some(_) => {
                self.remove(local_id);
                true
            }
            None => true,
        }
    }

    pub fn contains(&self, local_id: &str) -> bool {
        self.items.iter().any(|i| i.local_id == local_id)
    }

    pub fn get(&self, local_id: &str) -> Option<&SyncQueueItem> {
        self.items.iter().find(|i| i.local_id == local_id)
    }

    pub fn remove(&mut self, local_id: &str) -> Option<SyncQueueItem> {
        let pos = self.items.iter().position(|i| i.local_id == local_id)?;
        Some(self.items.remove(pos))
    }

    /// Removes every item whose id is in `local_ids`.
    pub fn remove_all<'a>(&mut self, local_ids: impl IntoIterator<Item = &'a str>) {
        let ids: std::collections::HashSet<&str> = local_ids.into_iter().collect();
        self.items.retain(|i| !ids.contains(i.local_id.as_str()));
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[SyncQueueItem] {
        &self.items
    }

    /// Returns the items due at `now_ms`, chats before messages, each group
    /// in enqueue order.
    pub fn due(&self, policy: &RetryPolicy, now_ms: u64) -> Vec<SyncQueueItem> {
        let mut due: Vec<SyncQueueItem> = self
            .items
            .iter()
            .filter(|i| policy.is_due(i, now_ms))
            .cloned()
            .collect();
        // Stable sort keeps enqueue order within each kind
        due.sort_by_key(|i| i.kind);
        due
    }

    /// Records a failed attempt.
    pub fn record_failure(
        &mut self,
        local_id: &str,
        now_ms: u64,
        policy: &RetryPolicy,
    ) -> RetryOutcome {
        let Some(item) = self.items.iter_mut().find(|i| i.local_id == local_id) else {
            return RetryOutcome::NotQueued;
        };

        item.retry_count = item.retry_count.saturating_add(1);
        item.last_retry_at = Some(now_ms);
        let attempts = item.retry_count;

        if attempts >= policy.max_retries {
            self.remove(local_id);
            return RetryOutcome::Exhausted { attempts };
        }

        RetryOutcome::Retry {
            attempts,
            next_delay: policy.delay_for(attempts),
        }
    }

    /// Clears retry bookkeeping so the item is due immediately.
    pub fn reset(&mut self, local_id: &str) -> bool {
        match self.items.iter_mut().find(|i| i.local_id == local_id) {
            Some(item) => {
                item.retry_count = 0;
                item.last_retry_at = None;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
