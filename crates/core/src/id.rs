// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local identifier generation.
//!
//! Ids have the form `{prefix}-{hash}` where hash is the first 12 hex chars of
//! SHA256(prefix, time, sequence, nonce). The nonce differs per generator so
//! two devices creating records in the same millisecond do not collide.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

/// Prefix for locally created chats.
pub const CHAT_PREFIX: &str = "chat";
/// Prefix for locally created messages.
pub const MESSAGE_PREFIX: &str = "msg";

/// Produces unique record ids and share tokens.
#[derive(Debug)]
pub struct IdGenerator {
    nonce: u64,
    seq: AtomicU64,
}

impl IdGenerator {
    /// Creates a generator with a random per-process nonce.
    pub fn new() -> Self {
        let mut hasher = RandomState::new().build_hasher();
        hasher.write_u64(std::process::id() as u64);
        Self::with_nonce(hasher.finish())
    }

    /// Creates a generator with a fixed nonce.
    pub fn with_nonce(nonce: u64) -> Self {
        IdGenerator {
            nonce,
            seq: AtomicU64::new(0),
        }
    }

    fn digest(&self, prefix: &str, now_ms: u64) -> Vec<u8> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let input = format!("{prefix}:{now_ms}:{seq}:{}", self.nonce);
        Sha256::digest(input.as_bytes()).to_vec()
    }

    /// Generates an id that `exists` does not already know about.
    ///
    /// Collisions get an incrementing suffix.
    pub fn generate<F>(&self, prefix: &str, now_ms: u64, exists: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        let hash = self.digest(prefix, now_ms);
        let base_id = format!("{}-{}", prefix, hex::encode(&hash[..6]));

        if !exists(&base_id) {
            return base_id;
        }

        let mut suffix = 2;
        loop {
            let id = format!("{}-{}", base_id, suffix);
            if !exists(&id) {
                return id;
            }
            suffix += 1;
        }
    }

    /// Generates an opaque 32 hex char token for public share links.
    pub fn share_token(&self, chat_id: &str, now_ms: u64) -> String {
        let hash = self.digest(chat_id, now_ms);
        hex::encode(&hash[..16])
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
