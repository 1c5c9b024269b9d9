// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for the engine.

use std::sync::Arc;
use std::time::Duration;

use kagent_core::{Packet, SyncEvent};
use tokio::sync::mpsc;

use super::{EngineSettings, Reconciler};
use crate::adapters::{FakeClusterApplier, FakeGitRepo};
use crate::syncer::Syncer;

pub(crate) const MARKER: &str = "kagent-desired";
pub(crate) const PROGRESS: &str = "kagent-applied";

pub(crate) fn settings() -> EngineSettings {
    EngineSettings {
        sync_interval: Duration::from_secs(300),
        git_timeout: Duration::from_secs(5),
        marker_tag: MARKER.to_string(),
        progress_tag: PROGRESS.to_string(),
        manifest_root: ".".to_string(),
    }
}

/// Manifest for a ConfigMap named `name` with one data entry.
pub(crate) fn config_map(name: &str, value: &str) -> String {
    format!(
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {}\ndata:\n  value: {}\n",
        name, value
    )
}

/// Engine wired to fakes.
pub(crate) struct TestEngine {
    pub repo: FakeGitRepo,
    pub cluster: FakeClusterApplier,
    pub syncer: Syncer,
    pub responses_tx: mpsc::Sender<Packet>,
    pub responses: mpsc::Receiver<Packet>,
}

impl TestEngine {
    pub(crate) fn new() -> Self {
        let repo = FakeGitRepo::new();
        let cluster = FakeClusterApplier::new();
        let syncer = Syncer::new(Arc::new(cluster.clone()));
        let (responses_tx, responses) = mpsc::channel(64);
        Self { repo, cluster, syncer, responses_tx, responses }
    }

    pub(crate) fn reconciler(&self, namespace: &str) -> Reconciler {
        Reconciler::new(
            namespace,
            Arc::new(self.repo.clone()),
            self.syncer.clone(),
            self.responses_tx.clone(),
            settings(),
        )
    }

    /// Every sync event emitted so far.
    pub(crate) fn drain_events(&mut self) -> Vec<(Packet, SyncEvent)> {
        let mut events = Vec::new();
        while let Ok(packet) = self.responses.try_recv() {
            let event: SyncEvent = packet.decode().unwrap();
            events.push((packet, event));
        }
        events
    }
}
