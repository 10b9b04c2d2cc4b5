// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// A chatsync command bound to `temp` as its data directory.
pub fn chatsync(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("chatsync");
    cmd.env("CHATSYNC_DIR", temp.path()).env_remove("RUST_LOG");
    cmd
}

/// Runs `args` and returns trimmed stdout.
pub fn stdout_of(temp: &TempDir, args: &[&str]) -> String {
    let output = chatsync(temp).args(args).output().unwrap();
    assert!(
        output.status.success(),
        "chatsync {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Creates a chat and returns its local id.
pub fn create_chat(temp: &TempDir, title: &str) -> String {
    stdout_of(temp, &["new", title])
}

/// Adds a message and returns its local id.
pub fn send(temp: &TempDir, chat: &str, content: &str) -> String {
    stdout_of(temp, &["send", chat, content])
}
