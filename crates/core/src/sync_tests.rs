// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::panic)]

use super::*;
use crate::memory_remote::MemoryRemote;
use crate::model::{Role, SyncStatus};
use crate::remote::{
    NewRemoteChat, NewRemoteMessage, RemoteChat, RemoteChatPatch, RemoteFuture, RemoteMessage,
    RemoteMessagePatch,
};
use crate::test_helpers::Harness;
use serde_json::Value;

fn setup() -> (Harness, MemoryRemote, SyncEngine) {
    let h = Harness::new();
    let remote = MemoryRemote::new();
    let store = h.open(Some("alice")).into_shared();
    let engine = SyncEngine::new(store, Arc::new(remote.clone()));
    (h, remote, engine)
}

fn completed(outcome: SyncOutcome) -> SyncReport {
    match outcome {
        SyncOutcome::Completed(report) => report,
        other => panic!("expected a completed pass, got {other:?}"),
    }
}

#[tokio::test]
async fn offline_work_syncs_in_order() {
    let (h, remote, engine) = setup();
    let (chat_id, message_ids) = {
        let mut store = engine.store().lock().unwrap();
        let chat = store.create_chat("general", "Trip Planning", None);
        let mut ids = Vec::new();
        for content in ["first", "second", "third"] {
            h.advance_ms(10);
            let msg = store
                .add_message(&chat.local_id, Role::User, content, Value::Null, None)
                .unwrap();
            ids.push(msg.local_id);
        }
        (chat.local_id, ids)
    };

    let report = completed(engine.run_pass().await);

    assert_eq!(report.attempted, 4);
    assert_eq!(report.synced, 4);
    assert_eq!(
        remote.calls(),
        vec!["create_chat", "create_message", "create_message", "create_message"]
    );
    let store = engine.store().lock().unwrap();
    let chat = store.get_chat(&chat_id).unwrap();
    assert_eq!(chat.sync_status, SyncStatus::Synced);
    let remote_chat_id = chat.remote_id.clone().unwrap();
    let contents: Vec<String> = remote.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents.len(), 3);
    for id in &message_ids {
        let message = store.get_message(id).unwrap();
        assert!(message.is_synced());
        assert_eq!(message.remote_chat_id.as_deref(), Some(remote_chat_id.as_str()));
    }
    assert!(store.queue().is_empty());
}

#[tokio::test]
async fn offline_engine_skips_pass() {
    let (_h, remote, engine) = setup();
    engine.store().lock().unwrap().create_chat("general", "a", None);

    assert!(engine.set_online(false));
    assert!(!engine.set_online(false));
    assert_eq!(engine.run_pass().await, SyncOutcome::Offline);

    assert!(remote.calls().is_empty());
    let store = engine.store().lock().unwrap();
    assert_eq!(store.queue().items()[0].retry_count, 0);
}

#[tokio::test]
async fn concurrent_pass_is_busy() {
    let (_h, remote, engine) = setup();
    engine.store().lock().unwrap().create_chat("general", "a", None);
    engine.syncing.store(true, Ordering::SeqCst);

    assert_eq!(engine.run_pass().await, SyncOutcome::Busy);
    assert!(remote.calls().is_empty());

    engine.syncing.store(false, Ordering::SeqCst);
    completed(engine.run_pass().await);
    assert!(!engine.is_syncing());
}

#[tokio::test]
async fn failed_chat_defers_messages_and_backs_off() {
    let (h, remote, engine) = setup();
    {
        let mut store = engine.store().lock().unwrap();
        let chat = store.create_chat("general", "a", None);
        store
            .add_message(&chat.local_id, Role::User, "hi", Value::Null, None)
            .unwrap();
    }
    remote.fail_next(1);

    let first = completed(engine.run_pass().await);
    assert_eq!(first.failed, 1);
    assert_eq!(first.deferred, 1);

    let second = completed(engine.run_pass().await);
    assert_eq!(second.attempted, 0);
    assert_eq!(second.deferred, 1);

    h.advance_ms(2_000);
    let third = completed(engine.run_pass().await);
    assert_eq!(third.synced, 2);
    assert!(engine.store().lock().unwrap().queue().is_empty());
}

#[tokio::test]
async fn exhausted_record_fails_permanently_once() {
    let (h, remote, engine) = setup();
    let chat_id = engine
        .store()
        .lock()
        .unwrap()
        .create_chat("general", "a", None)
        .local_id;
    remote.fail_next(100);

    let mut exhausted = 0;
    for _ in 0..6 {
        exhausted += completed(engine.run_pass().await).exhausted;
        h.advance_ms(10_000);
    }

    assert_eq!(exhausted, 1);
    assert_eq!(remote.calls().len(), 3);
    let permanent = h
        .recorded()
        .into_iter()
        .filter(|e| matches!(e, SyncEvent::ChatSyncFailed { permanent: true, .. }))
        .count();
    assert_eq!(permanent, 1);
    let store = engine.store().lock().unwrap();
    assert_eq!(store.get_chat(&chat_id).unwrap().sync_status, SyncStatus::Failed);
}

#[tokio::test]
async fn messages_behind_exhausted_chat_wait_quietly() {
    let (h, remote, engine) = setup();
    let (chat_id, message_id) = {
        let mut store = engine.store().lock().unwrap();
        let chat = store.create_chat("general", "a", None);
        let message = store
            .add_message(&chat.local_id, Role::User, "hi", Value::Null, None)
            .unwrap();
        (chat.local_id, message.local_id)
    };
    remote.fail_next(3);
    for _ in 0..3 {
        completed(engine.run_pass().await);
        h.advance_ms(10_000);
    }
    assert_eq!(
        engine.store().lock().unwrap().message_plan(&message_id),
        MessagePlan::ParentFailed
    );

    let idle = completed(engine.run_pass().await);
    assert_eq!(idle.attempted, 0);
    assert_eq!(idle.deferred, 0);
    assert!(engine.store().lock().unwrap().queue().contains(&message_id));

    assert!(engine.store().lock().unwrap().retry_sync(&chat_id).unwrap());
    let report = completed(engine.run_pass().await);
    assert_eq!(report.synced, 2);
    assert!(engine.store().lock().unwrap().queue().is_empty());
}

#[tokio::test]
async fn lost_parent_is_recreated() {
    let (_h, remote, engine) = setup();
    let chat_id = engine
        .store()
        .lock()
        .unwrap()
        .create_chat("general", "a", None)
        .local_id;
    completed(engine.run_pass().await);
    let first_remote_id = engine
        .store()
        .lock()
        .unwrap()
        .get_chat(&chat_id)
        .unwrap()
        .remote_id
        .clone()
        .unwrap();

    remote.lose_chat(&first_remote_id);
    engine
        .store()
        .lock()
        .unwrap()
        .add_message(&chat_id, Role::User, "hello?", Value::Null, None)
        .unwrap();

    let report = completed(engine.run_pass().await);
    assert_eq!(report.deferred, 1);
    assert_eq!(report.failed, 0);
    {
        let store = engine.store().lock().unwrap();
        let chat = store.get_chat(&chat_id).unwrap();
        assert!(chat.remote_id.is_none());
        assert_eq!(chat.sync_status, SyncStatus::Pending);
    }

    let report = completed(engine.run_pass().await);
    assert_eq!(report.synced, 2);
    let store = engine.store().lock().unwrap();
    let chat = store.get_chat(&chat_id).unwrap();
    let new_remote_id = chat.remote_id.clone().unwrap();
    assert_ne!(new_remote_id, first_remote_id);
    assert_eq!(remote.messages()[0].chat_id, new_remote_id);
}

#[tokio::test]
async fn edits_push_updates() {
    let (_h, remote, engine) = setup();
    let (chat_id, message_id) = {
        let mut store = engine.store().lock().unwrap();
        let chat = store.create_chat("general", "draft", None);
        let msg = store
            .add_message(&chat.local_id, Role::Assistant, "answer", Value::Null, None)
            .unwrap();
        (chat.local_id, msg.local_id)
    };
    completed(engine.run_pass().await);

    {
        let mut store = engine.store().lock().unwrap();
        store.update_chat_title(&chat_id, "final").unwrap();
        store.set_message_favorite(&message_id, true).unwrap();
    }
    let report = completed(engine.run_pass().await);

    assert_eq!(report.synced, 2);
    assert_eq!(remote.chats()[0].title, "final");
    assert!(remote.messages()[0].is_favorite);
    assert!(remote.calls().ends_with(&["update_chat", "update_message"]));
}

#[tokio::test]
async fn update_of_lost_chat_recreates_it() {
    let (_h, remote, engine) = setup();
    let chat_id = engine
        .store()
        .lock()
        .unwrap()
        .create_chat("general", "a", None)
        .local_id;
    completed(engine.run_pass().await);
    let old = remote.chats()[0].id.clone();
    remote.lose_chat(&old);

    engine
        .store()
        .lock()
        .unwrap()
        .update_chat_title(&chat_id, "b")
        .unwrap();
    let report = completed(engine.run_pass().await);

    assert_eq!(report.synced, 1);
    let chats = remote.chats();
    assert_eq!(chats.len(), 1);
    assert_ne!(chats[0].id, old);
    assert_eq!(chats[0].title, "b");
}

/// Deletes the local chat while its create request is in flight.
struct DeleteDuringCreate {
    inner: MemoryRemote,
    store: SharedStore,
}

impl Remote for DeleteDuringCreate {
    fn create_chat(&self, chat: NewRemoteChat) -> RemoteFuture<'_, String> {
        let ids: Vec<String> = self
            .store
            .lock()
            .unwrap()
            .get_chats(None, None)
            .into_iter()
            .map(|c| c.local_id)
            .collect();
        for id in ids {
            self.store.lock().unwrap().delete_chat(&id).unwrap();
        }
        self.inner.create_chat(chat)
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

/// Edits local records while their create requests are in flight: every
/// chat is renamed and every message starred.
struct EditDuringCreate {
    inner: MemoryRemote,
    store: SharedStore,
}

impl Remote for EditDuringCreate {
    fn create_chat(&self, chat: NewRemoteChat) -> RemoteFuture<'_, String> {
        let mut store = self.store.lock().unwrap();
        for local in store.get_chats(None, None) {
            store.update_chat_title(&local.local_id, "Renamed").unwrap();
        }
        drop(store);
        self.inner.create_chat(chat)
    }

    fn update_chat(&self, remote_id: &str, patch: RemoteChatPatch) -> RemoteFuture<'_, ()> {
        self.inner.update_chat(remote_id, patch)
    }

    fn create_message(
        &self,
        remote_chat_id: &str,
        message: NewRemoteMessage,
    ) -> RemoteFuture<'_, String> {
        let mut store = self.store.lock().unwrap();
        for chat in store.get_chats(None, None) {
            for local in store.get_messages_for_chat(&chat.local_id) {
                store.set_message_favorite(&local.local_id, true).unwrap();
            }
        }
        drop(store);
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

#[tokio::test]
async fn edits_during_create_are_pushed_afterwards() {
    let h = Harness::new();
    let inner = MemoryRemote::new();
    let store = h.open(Some("alice")).into_shared();
    let remote = EditDuringCreate {
        inner: inner.clone(),
        store: Arc::clone(&store),
    };
    let engine = SyncEngine::new(Arc::clone(&store), Arc::new(remote));
    let (chat_id, message_id) = {
        let mut store = store.lock().unwrap();
        let chat = store.create_chat("general", "Trip Planning", None);
        let message = store
            .add_message(&chat.local_id, Role::User, "hi", Value::Null, None)
            .unwrap();
        (chat.local_id, message.local_id)
    };

    let first = completed(engine.run_pass().await);
    assert_eq!(first.synced, 0);
    {
        let store = store.lock().unwrap();
        let chat = store.get_chat(&chat_id).unwrap();
        assert!(chat.remote_id.is_some());
        assert_eq!(chat.sync_status, SyncStatus::Pending);
        assert!(store.queue().contains(&chat_id));
    }

    let second = completed(engine.run_pass().await);
    assert_eq!(second.synced, 1);
    assert_eq!(inner.chats()[0].title, "Renamed");
    {
        let store = store.lock().unwrap();
        let message = store.get_message(&message_id).unwrap();
        assert!(message.remote_id.is_some());
        assert_eq!(message.sync_status, SyncStatus::Pending);
        assert!(store.queue().contains(&message_id));
    }

    let third = completed(engine.run_pass().await);
    assert_eq!(third.synced, 1);
    assert!(inner.messages()[0].is_favorite);
    assert_eq!(
        inner.calls(),
        vec!["create_chat", "update_chat", "create_message", "update_message"]
    );

    let store = store.lock().unwrap();
    assert!(store.get_chat(&chat_id).unwrap().is_synced());
    assert!(store.get_message(&message_id).unwrap().is_synced());
    assert!(store.queue().is_empty());
}

#[tokio::test]
async fn chat_deleted_in_flight_is_deleted_remotely() {
    let h = Harness::new();
    let inner = MemoryRemote::new();
    let store = h.open(None).into_shared();
    store.lock().unwrap().create_chat("general", "short-lived", None);
    let remote = DeleteDuringCreate {
        inner: inner.clone(),
        store: Arc::clone(&store),
    };
    let engine = SyncEngine::new(Arc::clone(&store), Arc::new(remote));

    let report = completed(engine.run_pass().await);

    assert_eq!(report.synced, 0);
    assert_eq!(inner.calls(), vec!["create_chat", "delete_chat"]);
    assert!(inner.chats().is_empty());
    let store = store.lock().unwrap();
    assert!(store.get_chats(None, None).is_empty());
    assert_eq!(store.queue().len(), 0);
}

#[tokio::test]
async fn pull_merges_server_state() {
    let (_h, remote, engine) = setup();
    let chat_id = remote
        .create_chat(NewRemoteChat {
            mode: "general".into(),
            title: "from another device".into(),
            profile_id: None,
        })
        .await
        .unwrap();
    remote
        .create_message(
            &chat_id,
            NewRemoteMessage {
                role: Role::User,
                content: "hello".into(),
                metadata: Value::Null,
                is_favorite: false,
            },
        )
        .await
        .unwrap();

    let report = engine.pull(None).await.unwrap();
    assert_eq!(report.inserted, 2);

    let again = engine.pull(None).await.unwrap();
    assert!(!again.changed());

    let store = engine.store().lock().unwrap();
    assert_eq!(store.get_messages_for_chat(&chat_id).len(), 1);
    assert!(store.queue().is_empty());
}

#[tokio::test]
async fn pull_does_not_revive_deleted_chats() {
    let (_h, remote, engine) = setup();
    let chat_id = engine
        .store()
        .lock()
        .unwrap()
        .create_chat("general", "a", None)
        .local_id;
    completed(engine.run_pass().await);

    // Remote delete fails, so the server still has the chat
    remote.fail_next(1);
    let deleted = engine.store().lock().unwrap().delete_chat(&chat_id).unwrap();
    engine.propagate_delete(deleted.remote_id.as_deref().unwrap()).await;
    assert_eq!(remote.chats().len(), 1);

    let report = engine.pull(None).await.unwrap();

    assert_eq!(report.skipped_deleted, 1);
    assert!(engine.store().lock().unwrap().get_chats(None, None).is_empty());
}

#[tokio::test]
async fn pull_while_offline_fails() {
    let (_h, _remote, engine) = setup();
    engine.set_online(false);

    let err = engine.pull(None).await.unwrap_err();

    assert!(matches!(err, Error::Remote(RemoteError::Network(_))));
}

#[tokio::test]
async fn propagate_delete_tolerates_missing_chat() {
    let (_h, remote, engine) = setup();

    engine.propagate_delete("rc-missing").await;
    engine.propagate_delete_all().await;

    assert_eq!(remote.calls(), vec!["delete_chat", "delete_all_chats"]);
}

#[tokio::test]
async fn pass_emits_start_and_completion() {
    let (h, _remote, engine) = setup();
    h.reset_events();

    let report = completed(engine.run_pass().await);

    assert_eq!(report, SyncReport::default());
    assert_eq!(h.event_names(), vec!["sync-started", "sync-completed"]);
}
