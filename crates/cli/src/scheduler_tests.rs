// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::StoreFixture;
use std::sync::atomic::{AtomicUsize, Ordering};

use chatsync_core::remote::{
    NewRemoteChat, NewRemoteMessage, RemoteChat, RemoteChatPatch, RemoteFuture, RemoteMessage,
    RemoteMessagePatch,
};
use chatsync_core::{KvStore, MemoryRemote, Remote, SyncEvent};

const CHATS_KEY: &str = "chatsync:anonymous:chats";

fn config() -> SchedulerConfig {
    SchedulerConfig {
        interval: Duration::from_secs(3600),
        mutation_delay: Duration::from_millis(500),
        persist_tick: Duration::from_millis(100),
    }
}

fn start(fixture: &StoreFixture) -> (MemoryRemote, SchedulerHandle) {
    let backend = MemoryRemote::new();
    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&fixture.store),
        Arc::new(backend.clone()),
    ));
    (backend, spawn(engine, config()))
}

/// Lets the scheduler run its startup pass.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn create_chat(fixture: &StoreFixture, title: &str) -> String {
    fixture
        .store
        .lock()
        .unwrap()
        .create_chat("general", title, None)
        .local_id
}

#[tokio::test(start_paused = true)]
async fn mutation_triggers_a_batched_pass() {
    let fixture = StoreFixture::new();
    let (backend, handle) = start(&fixture);
    settle().await;

    create_chat(&fixture, "Trip");
    handle.notify_mutation();
    create_chat(&fixture, "Food");
    handle.notify_mutation();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(backend.chats().is_empty());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(backend.chats().len(), 2);
    assert_eq!(
        backend.calls().into_iter().filter(|c| *c == "create_chat").count(),
        2
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn offline_defers_until_connectivity_returns() {
    let fixture = StoreFixture::new();
    let (backend, handle) = start(&fixture);
    settle().await;

    handle.set_online(false);
    let chat_id = create_chat(&fixture, "Trip");
    handle.notify_mutation();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(backend.chats().is_empty());

    handle.set_online(true);
    settle().await;
    assert_eq!(backend.chats().len(), 1);
    assert!(fixture
        .store
        .lock()
        .unwrap()
        .get_chat(&chat_id)
        .unwrap()
        .is_synced());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn foreground_runs_a_pass() {
    let fixture = StoreFixture::new();
    let (backend, handle) = start(&fixture);
    settle().await;

    create_chat(&fixture, "Trip");
    handle.foreground();
    settle().await;

    assert_eq!(backend.chats().len(), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pull_merges_server_chats() {
    let fixture = StoreFixture::new();
    let (backend, handle) = start(&fixture);
    settle().await;

    let remote_id = backend
        .create_chat(NewRemoteChat {
            mode: "general".into(),
            title: "From phone".into(),
            profile_id: None,
        })
        .await
        .unwrap();
    handle.pull();
    settle().await;

    let store = fixture.store.lock().unwrap();
    let chat = store.get_chat(&remote_id).unwrap();
    assert_eq!(chat.title, "From phone");
    assert!(chat.is_synced());
    drop(store);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn persist_tick_waits_for_the_debounce() {
    let fixture = StoreFixture::new();
    let (_backend, handle) = start(&fixture);
    settle().await;

    let chat_id = create_chat(&fixture, "Trip");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(fixture.kv.get(CHATS_KEY).unwrap().is_none());

    fixture.clock.advance(Duration::from_secs(2));
    tokio::time::sleep(Duration::from_millis(300)).await;
    let saved = fixture.kv.get(CHATS_KEY).unwrap().unwrap();
    assert!(saved.contains(&chat_id));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_immediately() {
    let fixture = StoreFixture::new();
    let (_backend, handle) = start(&fixture);
    settle().await;

    let chat_id = create_chat(&fixture, "Trip");
    handle.shutdown().await;

    let saved = fixture.kv.get(CHATS_KEY).unwrap().unwrap();
    assert!(saved.contains(&chat_id));
}

/// Takes a second to create each chat.
struct SlowRemote {
    inner: MemoryRemote,
}

impl Remote for SlowRemote {
    fn create_chat(&self, chat: NewRemoteChat) -> RemoteFuture<'_, String> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            self.inner.create_chat(chat).await
        })
    }

    fn update_chat(&self, remote_id: &str, patch: RemoteChatPatch) -> RemoteFuture<'_, ()> {
        self.inner.update_chat(remote_id, patch)
    }

    fn create_message(
        &self,
        remote_chat_id: &str,
        message: NewRemoteMessage,
    ) -> RemoteFuture<'_, String> {
        self.inner.create_message(remote_chat_id, message)
    }

    fn update_message(&self, remote_id: &str, patch: RemoteMessagePatch) -> RemoteFuture<'_, ()> {
        self.inner.update_message(remote_id, patch)
    }

    fn delete_chat(&self, remote_id: &str) -> RemoteFuture<'_, ()> {
        self.inner.delete_chat(remote_id)
    }

    fn delete_all_chats(&self) -> RemoteFuture<'_, ()> {
        self.inner.delete_all_chats()
    }

    fn list_chats(&self, profile_id: Option<&str>) -> RemoteFuture<'_, Vec<RemoteChat>> {
        self.inner.list_chats(profile_id)
    }

    fn list_messages(&self, remote_chat_id: &str) -> RemoteFuture<'_, Vec<RemoteMessage>> {
        self.inner.list_messages(remote_chat_id)
    }
}

#[tokio::test(start_paused = true)]
async fn triggers_during_a_pass_do_not_pile_up() {
    let fixture = StoreFixture::new();
    let passes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&passes);
    let events = Arc::clone(fixture.store.lock().unwrap().events());
    events.subscribe(move |e: &SyncEvent| {
        if matches!(e, SyncEvent::SyncStarted) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    let backend = MemoryRemote::new();
    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&fixture.store),
        Arc::new(SlowRemote {
            inner: backend.clone(),
        }),
    ));
    let handle = spawn(engine, config());
    settle().await;
    let startup = passes.load(Ordering::SeqCst);

    create_chat(&fixture, "Trip");
    handle.foreground();
    settle().await;
    assert_eq!(passes.load(Ordering::SeqCst), startup + 1);

    for _ in 0..3 {
        handle.foreground();
        handle.set_online(true);
    }
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(backend.chats().len(), 1);
    assert_eq!(passes.load(Ordering::SeqCst), startup + 1);
    handle.shutdown().await;
}
