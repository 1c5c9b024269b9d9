// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-namespace sync loop.
//!
//! A single task waits on the stop token, the periodic timer, mirror change
//! notifications and sync-soon requests, and runs one pass at a time. Passes
//! for a namespace never overlap because only this task runs them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pass::{PassOutcome, Reconciler};

/// What woke the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Timer,
    Notify,
    SyncSoon,
}

/// Counters describing a namespace's passes.
#[derive(Debug, Default)]
pub struct SyncStats {
    passes: AtomicU64,
    failed_passes: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_commit: Mutex<Option<String>>,
}

/// Point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatsSnapshot {
    pub passes: u64,
    pub failed_passes: u64,
    pub max_in_flight: usize,
    pub last_commit: Option<String>,
}

/// Marks a pass in flight until dropped, so an abandoned pass is released.
struct InFlight<'a> {
    stats: &'a SyncStats,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SyncStats {
    fn begin(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight { stats: self }
    }

    fn finish(&self, ok: bool) {
        self.passes.fetch_add(1, Ordering::SeqCst);
        if !ok {
            self.failed_passes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Passes currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn set_last_commit(&self, commit: &str) {
        *self.last_commit.lock() = Some(commit.to_string());
    }

    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            passes: self.passes.load(Ordering::SeqCst),
            failed_passes: self.failed_passes.load(Ordering::SeqCst),
            max_in_flight: self.max_in_flight.load(Ordering::SeqCst),
            last_commit: self.last_commit.lock().clone(),
        }
    }
}

/// Sync loop for one namespace.
pub struct SyncLoop {
    reconciler: Reconciler,
    interval: Duration,
    notify: mpsc::Receiver<()>,
    soon: mpsc::Receiver<()>,
    stats: Arc<SyncStats>,
    /// Desired commit seen by the last pass, used to filter notifications.
    last_marker: Option<String>,
}

impl SyncLoop {
    pub fn new(
        reconciler: Reconciler,
        interval: Duration,
        notify: mpsc::Receiver<()>,
        soon: mpsc::Receiver<()>,
        stats: Arc<SyncStats>,
    ) -> Self {
        Self { reconciler, interval, notify, soon, stats, last_marker: None }
    }

    /// Run until `stop` fires. A pass in progress is abandoned on stop, which
    /// releases its checkout.
    pub async fn run(mut self, stop: CancellationToken) {
        let ns = self.reconciler.namespace().to_string();
        info!(namespace = %ns, interval = ?self.interval, "sync loop started");

        let timer = sleep(self.interval);
        tokio::pin!(timer);

        loop {
            let trigger = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                Some(()) = self.soon.recv() => Trigger::SyncSoon,
                Some(()) = self.notify.recv() => Trigger::Notify,
                _ = &mut timer => Trigger::Timer,
            };

            if trigger == Trigger::Notify && !self.marker_moved().await {
                continue;
            }

            debug!(namespace = %ns, ?trigger, "starting pass");
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = self.pass() => {}
            }
            timer.as_mut().reset(Instant::now() + self.interval);
        }

        info!(namespace = %ns, "sync loop stopped");
    }

    /// Whether the desired marker differs from the one the last pass saw.
    async fn marker_moved(&self) -> bool {
        match self.reconciler.desired_commit().await {
            Ok(Some(commit)) => self.last_marker.as_deref() != Some(commit.as_str()),
            Ok(None) => false,
            Err(e) => {
                warn!(namespace = %self.reconciler.namespace(), error = %e, "resolving marker");
                false
            }
        }
    }

    async fn pass(&mut self) {
        let stats = Arc::clone(&self.stats);
        let _in_flight = stats.begin();
        let result = self.reconciler.run().await;
        let ns = self.reconciler.namespace();
        let ok = match result {
            Ok(PassOutcome::Idle) => true,
            Ok(PassOutcome::Synced(report)) => {
                self.stats.set_last_commit(&report.commit);
                self.last_marker = Some(report.commit);
                true
            }
            Err(e) => {
                warn!(namespace = %ns, error = %e, "sync pass failed");
                false
            }
        };
        stats.finish(ok);
    }
}

#[cfg(test)]
#[path = "sync_loop_tests.rs"]
mod tests;
