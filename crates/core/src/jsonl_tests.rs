// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    id: u32,
    name: String,
}

fn record(id: u32, name: &str) -> Record {
    Record {
        id,
        name: name.into(),
    }
}

#[test]
fn read_all_returns_empty_for_missing_file() {
    let dir = TempDir::new().unwrap();

    let records: Vec<Record> = read_all(&dir.path().join("missing.jsonl")).unwrap();

    assert!(records.is_empty());
}

#[test]
fn write_then_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chats.jsonl");

    write_all(&path, &[record(1, "first"), record(2, "second")]).unwrap();

    let records: Vec<Record> = read_all(&path).unwrap();
    assert_eq!(records, vec![record(1, "first"), record(2, "second")]);
    assert!(!dir.path().join("chats.jsonl.tmp").exists());
}

#[test]
fn write_all_replaces_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chats.jsonl");
    write_all(&path, &[record(1, "first")]).unwrap();

    write_all(&path, &[record(2, "replaced")]).unwrap();

    let records: Vec<Record> = read_all(&path).unwrap();
    assert_eq!(records, vec![record(2, "replaced")]);
}

#[test]
fn read_all_skips_empty_and_malformed_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("messages.jsonl");
    std::fs::write(
        &path,
        "{\"id\":1,\"name\":\"a\"}\n\n{\"id\":\n{\"id\":2,\"name\":\"b\"}\n",
    )
    .unwrap();

    let records: Vec<Record> = read_all(&path).unwrap();

    assert_eq!(records, vec![record(1, "a"), record(2, "b")]);
}
