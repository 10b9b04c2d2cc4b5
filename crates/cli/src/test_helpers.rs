// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the client tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chatsync_core::protocol::{handle_request, ClientMessage, Reply, ServerMessage};
use chatsync_core::{
    EventBus, LocalStore, ManualClock, MemoryKv, MemoryRemote, SharedStore, StoreOptions,
};

use crate::transport::{Transport, TransportError, TransportFuture};

pub const T0: u64 = 1_700_000_000_000;

/// In-process transport answering requests from a [`MemoryRemote`].
pub struct MockTransport {
    remote: MemoryRemote,
    connected: bool,
    incoming: VecDeque<ServerMessage>,
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    connects: Arc<AtomicUsize>,
    /// Replies queued before the real one, e.g. stale answers.
    injected: Arc<Mutex<VecDeque<ServerMessage>>>,
    /// Never answer; recv waits forever.
    pub silent: bool,
    pub refuse_connections: bool,
}

impl MockTransport {
    pub fn new(remote: MemoryRemote) -> Self {
        MockTransport {
            remote,
            connected: false,
            incoming: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            connects: Arc::new(AtomicUsize::new(0)),
            injected: Arc::new(Mutex::new(VecDeque::new())),
            silent: false,
            refuse_connections: false,
        }
    }

    /// Handle to the messages sent so far.
    pub fn sent(&self) -> Arc<Mutex<Vec<ClientMessage>>> {
        Arc::clone(&self.sent)
    }

    pub fn connects(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connects)
    }

    /// Queues a reply delivered before the answer to the next request.
    pub fn inject(&self, request_id: u64, reply: Reply) {
        self.injected
            .lock()
            .unwrap()
            .push_back(ServerMessage::new(request_id, reply));
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _url: &str) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if self.refuse_connections {
                return Err(TransportError::ConnectionFailed("refused".into()));
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.connected = false;
            self.incoming.clear();
            Ok(())
        })
    }

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            self.sent.lock().unwrap().push(msg.clone());
            if self.silent {
                return Ok(());
            }
            let injected: Vec<ServerMessage> = self.injected.lock().unwrap().drain(..).collect();
            self.incoming.extend(injected);
            let reply = handle_request(&self.remote, msg.request).await;
            self.incoming
                .push_back(ServerMessage::new(msg.request_id, reply));
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move {
            if !self.connected {
                return Err(TransportError::ConnectionClosed);
            }
            match self.incoming.pop_front() {
                Some(msg) => Ok(Some(msg)),
                None => std::future::pending().await,
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// A store over shared memory storage and a manual clock.
pub struct StoreFixture {
    pub kv: MemoryKv,
    pub clock: ManualClock,
    pub store: SharedStore,
}

impl StoreFixture {
    pub fn new() -> Self {
        let kv = MemoryKv::new();
        let clock = ManualClock::new(T0);
        let store = LocalStore::open(
            Box::new(kv.clone()),
            Arc::new(clock.clone()),
            Arc::new(EventBus::new()),
            None,
            StoreOptions::default(),
        )
        .into_shared();
        StoreFixture { kv, clock, store }
    }
}
