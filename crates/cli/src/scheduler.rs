// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background sync scheduling.
//!
//! The scheduler is a tokio task that runs sync passes:
//!
//! - periodically, every `interval`
//! - after a mutation, once the batching delay has passed
//! - when connectivity comes back
//! - when the host returns to the foreground
//!
//! Triggers that arrive while a pass runs do not queue up further passes.
//! A faster tick persists the store once its debounce period has passed.
//! [`SchedulerHandle::shutdown`] stops the task and performs a final flush.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use chatsync_core::{SyncEngine, SyncOutcome};

use crate::config::SyncSettings;

const TRIGGER_CAPACITY: usize = 64;
const PERSIST_TICK: Duration = Duration::from_millis(250);

/// Reasons to wake the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Local state changed.
    Mutation,
    /// Connectivity changed.
    Online(bool),
    /// The host came back to the foreground.
    Foreground,
    /// Refresh from the server, then push.
    Pull,
    /// Flush and stop.
    Shutdown,
}

/// Timing for the scheduler loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub mutation_delay: Duration,
    pub persist_tick: Duration,
}

impl From<&SyncSettings> for SchedulerConfig {
    fn from(settings: &SyncSettings) -> Self {
        SchedulerConfig {
            interval: settings.interval(),
            mutation_delay: settings.mutation_delay(),
            persist_tick: PERSIST_TICK,
        }
    }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    tx: mpsc::Sender<Trigger>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Sends a trigger without waiting.
    ///
    /// A full channel already holds enough work to cause a pass, so the
    /// trigger is dropped.
    pub fn notify(&self, trigger: Trigger) {
        if let Err(mpsc::error::TrySendError::Closed(trigger)) = self.tx.try_send(trigger) {
            tracing::debug!(?trigger, "scheduler stopped, trigger dropped");
        }
    }

    pub fn notify_mutation(&self) {
        self.notify(Trigger::Mutation);
    }

    pub fn set_online(&self, online: bool) {
        self.notify(Trigger::Online(online));
    }

    pub fn foreground(&self) {
        self.notify(Trigger::Foreground);
    }

    pub fn pull(&self) {
        self.notify(Trigger::Pull);
    }

    /// Stops the scheduler after a final flush and waits for it to finish.
    pub async fn shutdown(self) {
        if self.tx.send(Trigger::Shutdown).await.is_err() {
            tracing::debug!("scheduler already stopped");
        }
        if let Err(e) = self.task.await {
            tracing::warn!("scheduler task failed: {}", e);
        }
    }
}

/// Spawns the scheduler on the current tokio runtime.
pub fn spawn(engine: Arc<SyncEngine>, config: SchedulerConfig) -> SchedulerHandle {
    let (tx, rx) = mpsc::channel(TRIGGER_CAPACITY);
    let task = tokio::spawn(run(engine, config, rx));
    SchedulerHandle { tx, task }
}

/// Work chosen by one turn of the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Idle,
    Pass,
    PullThenPass,
    Stop,
}

async fn run(engine: Arc<SyncEngine>, config: SchedulerConfig, mut rx: mpsc::Receiver<Trigger>) {
    let mut periodic = tokio::time::interval(config.interval);
    periodic.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut persist = tokio::time::interval(config.persist_tick);
    persist.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut batch_deadline: Option<Instant> = None;

    tracing::debug!(interval = ?config.interval, "scheduler started");
    'scheduler: loop {
        let pending_batch = batch_deadline;
        let batch = async move {
            match pending_batch {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        let mut action = tokio::select! {
            _ = periodic.tick() => Action::Pass,
            _ = persist.tick() => {
                flush_if_due(&engine);
                Action::Idle
            }
            _ = batch => {
                batch_deadline = None;
                Action::Pass
            }
            trigger = rx.recv() => match trigger {
                Some(trigger) => accept(&engine, trigger, &mut batch_deadline, config.mutation_delay),
                None => Action::Stop,
            },
        };

        loop {
            match action {
                Action::Idle => break,
                Action::Stop => break 'scheduler,
                Action::Pass => run_pass(&engine).await,
                Action::PullThenPass => {
                    if let Err(e) = engine.pull(None).await {
                        tracing::warn!("refresh from server failed: {}", e);
                    }
                    run_pass(&engine).await;
                }
            }
            action = drain_backlog(&engine, &mut rx, &mut batch_deadline, config.mutation_delay);
        }
    }

    let result = engine
        .store()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .flush();
    if let Err(e) = result {
        tracing::warn!("final flush failed: {}", e);
    }
    tracing::debug!("scheduler stopped");
}

/// Maps a trigger to the work it asks for.
fn accept(
    engine: &SyncEngine,
    trigger: Trigger,
    batch_deadline: &mut Option<Instant>,
    mutation_delay: Duration,
) -> Action {
    match trigger {
        Trigger::Mutation => {
            if batch_deadline.is_none() {
                *batch_deadline = Some(Instant::now() + mutation_delay);
            }
            Action::Idle
        }
        Trigger::Online(online) => {
            if engine.set_online(online) && online {
                Action::Pass
            } else {
                Action::Idle
            }
        }
        Trigger::Foreground => Action::Pass,
        Trigger::Pull => Action::PullThenPass,
        Trigger::Shutdown => Action::Stop,
    }
}

/// Takes the triggers that queued up while a pass ran.
///
/// Foreground requests are served by the pass that just finished. Mutations
/// still start a batch, a connectivity restore still earns one more pass,
/// and pull and shutdown are kept.
fn drain_backlog(
    engine: &SyncEngine,
    rx: &mut mpsc::Receiver<Trigger>,
    batch_deadline: &mut Option<Instant>,
    mutation_delay: Duration,
) -> Action {
    let mut next = Action::Idle;
    while let Ok(trigger) = rx.try_recv() {
        let restores = trigger == Trigger::Online(true);
        match accept(engine, trigger, batch_deadline, mutation_delay) {
            Action::Stop => return Action::Stop,
            Action::PullThenPass => next = Action::PullThenPass,
            Action::Pass if restores && next == Action::Idle => next = Action::Pass,
            Action::Pass | Action::Idle => {}
        }
    }
    next
}

async fn run_pass(engine: &SyncEngine) {
    match engine.run_pass().await {
        SyncOutcome::Completed(report) => {
            tracing::debug!(
                attempted = report.attempted,
                synced = report.synced,
                "scheduled pass done"
            )
        }
        SyncOutcome::Busy => tracing::debug!("pass skipped, another is running"),
        SyncOutcome::Offline => tracing::debug!("pass skipped, offline"),
    }
}

fn flush_if_due(engine: &SyncEngine) {
    let result = engine
        .store()
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .flush_if_due();
    if let Err(e) = result {
        tracing::warn!("persisting local state failed: {}", e);
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
