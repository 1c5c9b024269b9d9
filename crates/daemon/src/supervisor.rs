// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner of every managed namespace's mirror and sync loop.
//!
//! Adding a namespace opens its mirror, starts the mirror watcher and the
//! sync loop under a child cancellation token, and records the handles.
//! Removing one cancels the token and waits for both tasks to exit before
//! the entry disappears, so no pass can outlive its namespace.

use std::collections::BTreeMap;
use std::sync::Arc;

use kagent_core::{EnvParas, Packet};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::git::{GitError, GitRepo, RepoFactory};
use crate::engine::{EngineSettings, Reconciler, SyncLoop, SyncStats, SyncStatsSnapshot};
use crate::syncer::Syncer;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("namespace {0} is already managed")]
    AlreadyManaged(String),

    #[error("namespace {0} is not managed")]
    NotManaged(String),

    #[error("environment has no namespace")]
    MissingNamespace,

    #[error("opening repository for {namespace}: {source}")]
    Open {
        namespace: String,
        #[source]
        source: GitError,
    },
}

/// Read-only view of a managed namespace.
#[derive(Clone)]
pub struct NamespaceHandle {
    pub env: EnvParas,
    pub repo: Arc<dyn GitRepo>,
    stats: Arc<SyncStats>,
}

impl NamespaceHandle {
    pub fn stats(&self) -> SyncStatsSnapshot {
        self.stats.snapshot()
    }
}

struct NamespaceEntry {
    handle: NamespaceHandle,
    soon: mpsc::Sender<()>,
    stop: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Registry of managed namespaces.
pub struct NamespaceSupervisor {
    factory: Arc<dyn RepoFactory>,
    syncer: Syncer,
    responses: mpsc::Sender<Packet>,
    settings: EngineSettings,
    shutdown: CancellationToken,
    entries: Mutex<BTreeMap<String, NamespaceEntry>>,
}

impl NamespaceSupervisor {
    pub fn new(
        factory: Arc<dyn RepoFactory>,
        syncer: Syncer,
        responses: mpsc::Sender<Packet>,
        settings: EngineSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let entries = Mutex::new(BTreeMap::new());
        Self { factory, syncer, responses, settings, shutdown, entries }
    }

    /// Start managing `env.namespace`.
    pub fn add(&self, env: EnvParas) -> Result<NamespaceHandle, SupervisorError> {
        let namespace = env.namespace.clone();
        if namespace.is_empty() {
            return Err(SupervisorError::MissingNamespace);
        }

        let mut entries = self.entries.lock();
        if entries.contains_key(&namespace) {
            return Err(SupervisorError::AlreadyManaged(namespace));
        }

        let repo = self
            .factory
            .open(&env)
            .map_err(|source| SupervisorError::Open { namespace: namespace.clone(), source })?;
        let stop = self.shutdown.child_token();
        let stats = Arc::new(SyncStats::default());
        let (notify_tx, notify_rx) = mpsc::channel(1);
        let (soon_tx, soon_rx) = mpsc::channel(1);

        let reconciler = Reconciler::new(
            namespace.clone(),
            Arc::clone(&repo),
            self.syncer.clone(),
            self.responses.clone(),
            self.settings.clone(),
        );
        let sync_loop = SyncLoop::new(
            reconciler,
            self.settings.sync_interval,
            notify_rx,
            soon_rx,
            Arc::clone(&stats),
        );

        let watcher = {
            let repo = Arc::clone(&repo);
            let stop = stop.clone();
            tokio::spawn(async move { repo.watch(stop, notify_tx).await })
        };
        let sync_task = tokio::spawn(sync_loop.run(stop.clone()));

        let handle = NamespaceHandle { env, repo, stats };
        entries.insert(
            namespace.clone(),
            NamespaceEntry {
                handle: handle.clone(),
                soon: soon_tx,
                stop,
                tasks: vec![watcher, sync_task],
            },
        );
        info!(%namespace, "namespace added");
        Ok(handle)
    }

    /// Stop managing `namespace`, waiting for its tasks to exit.
    pub async fn remove(&self, namespace: &str) -> Result<EnvParas, SupervisorError> {
        let (stop, tasks) = {
            let mut entries = self.entries.lock();
            let entry = entries
                .get_mut(namespace)
                .ok_or_else(|| SupervisorError::NotManaged(namespace.to_string()))?;
            if entry.tasks.is_empty() {
                // Another remove is already draining this entry
                return Err(SupervisorError::NotManaged(namespace.to_string()));
            }
            (entry.stop.clone(), std::mem::take(&mut entry.tasks))
        };

        stop.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(%namespace, error = %e, "namespace task ended abnormally");
            }
        }

        let entry = self.entries.lock().remove(namespace);
        info!(%namespace, "namespace removed");
        entry
            .map(|e| e.handle.env)
            .ok_or_else(|| SupervisorError::NotManaged(namespace.to_string()))
    }

    pub fn get(&self, namespace: &str) -> Option<NamespaceHandle> {
        self.entries.lock().get(namespace).map(|e| e.handle.clone())
    }

    /// Ask `namespace` to reconcile soon. Coalesces with a request that is
    /// already pending.
    pub fn sync_soon(&self, namespace: &str) -> Result<(), SupervisorError> {
        let entries = self.entries.lock();
        let Some(entry) = entries.get(namespace) else {
            return Err(SupervisorError::NotManaged(namespace.to_string()));
        };
        match entry.soon.try_send(()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!(%namespace, "sync already requested");
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                return Err(SupervisorError::NotManaged(namespace.to_string()));
            }
        }
        Ok(())
    }

    /// Managed namespaces in name order.
    pub fn namespaces(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Remove every namespace.
    pub async fn shutdown(&self) {
        for namespace in self.namespaces() {
            if let Err(e) = self.remove(&namespace).await {
                debug!(%namespace, error = %e, "already removed");
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
