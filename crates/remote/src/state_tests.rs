// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chatsync_core::remote::{NewRemoteChat, NewRemoteMessage};
use chatsync_core::Role;
use serde_json::Value;

fn create_chat(title: &str) -> Request {
    Request::CreateChat {
        chat: NewRemoteChat {
            mode: "general".into(),
            title: title.into(),
            profile_id: None,
        },
    }
}

#[tokio::test]
async fn records_survive_a_restart() {
    let temp = tempfile::tempdir().unwrap();

    let state = ServerState::open(temp.path()).unwrap();
    let chat_id = state.handle(create_chat("Trip")).await.into_created().unwrap();
    state
        .handle(Request::CreateMessage {
            chat_id: chat_id.clone(),
            message: NewRemoteMessage {
                role: Role::User,
                content: "hello".into(),
                metadata: Value::Null,
                is_favorite: false,
            },
        })
        .await
        .into_created()
        .unwrap();

    let reopened = ServerState::open(temp.path()).unwrap();
    assert_eq!(reopened.backend().chats().len(), 1);
    assert_eq!(reopened.backend().chats()[0].id, chat_id);
    assert_eq!(reopened.backend().messages()[0].content, "hello");
}

#[tokio::test]
async fn deletes_are_persisted() {
    let temp = tempfile::tempdir().unwrap();
    let state = ServerState::open(temp.path()).unwrap();
    let chat_id = state.handle(create_chat("Trip")).await.into_created().unwrap();

    state
        .handle(Request::DeleteChat { id: chat_id })
        .await
        .into_done()
        .unwrap();

    let reopened = ServerState::open(temp.path()).unwrap();
    assert!(reopened.backend().chats().is_empty());
}

#[tokio::test]
async fn reads_do_not_write_files() {
    let temp = tempfile::tempdir().unwrap();
    let state = ServerState::open(temp.path()).unwrap();

    state
        .handle(Request::ListChats { profile_id: None })
        .await
        .into_chats()
        .unwrap();

    assert!(!temp.path().join(CHATS_FILE).exists());
}

#[tokio::test]
async fn in_memory_state_serves_requests() {
    let state = ServerState::in_memory();
    state.handle(create_chat("Trip")).await.into_created().unwrap();

    let chats = state
        .handle(Request::ListChats { profile_id: None })
        .await
        .into_chats()
        .unwrap();
    assert_eq!(chats.len(), 1);
}
