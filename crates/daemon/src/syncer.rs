// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster sync applier.
//!
//! Every apply and delete in the process goes through one [`Syncer`], which
//! holds a single lock across the whole batch. Namespaces may compute their
//! batches concurrently, but only one batch touches the cluster at a time.

use std::sync::Arc;

use kagent_core::{ObjectIdentity, Resource, SyncAction, SyncDef};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::adapters::cluster::{
    Change, ChangeAction, ClusterApplier, ClusterError, ResourceFailure, SyncErrors,
};

/// Serialized front door to the cluster applier.
#[derive(Clone)]
pub struct Syncer {
    applier: Arc<dyn ClusterApplier>,
    apply_lock: Arc<Mutex<()>>,
}

impl Syncer {
    pub fn new(applier: Arc<dyn ClusterApplier>) -> Self {
        Self { applier, apply_lock: Arc::new(Mutex::new(())) }
    }

    /// Execute every action in `def` against the cluster.
    ///
    /// Actions whose bytes do not parse into an object identity are recorded
    /// as failures and skipped; the rest are still executed.
    pub async fn sync(&self, namespace: &str, def: SyncDef) -> Result<(), SyncErrors> {
        let mut failures = Vec::new();
        let mut changes = Vec::with_capacity(def.len());

        for action in def.into_actions() {
            let (action, resource) = match action {
                SyncAction::Apply(resource) => (ChangeAction::Apply, resource),
                SyncAction::Delete(resource) => (ChangeAction::Delete, resource),
            };
            match ObjectIdentity::parse(&resource.bytes) {
                Ok(identity) => changes.push(Change { action, identity, resource }),
                Err(e) => {
                    warn!(%namespace, id = %resource.id, error = %e, "unparseable object");
                    failures.push(ResourceFailure { resource, error: e.to_string() });
                }
            }
        }

        if !changes.is_empty() {
            let _guard = self.apply_lock.lock().await;
            debug!(%namespace, changes = changes.len(), "applying batch");
            if let Err(errors) = self.applier.apply(namespace, &changes).await {
                failures.extend(errors.0);
            }
        }

        SyncErrors(failures).into_result()
    }

    /// Live managed objects in `namespace`. Reads do not take the apply lock.
    pub async fn export(&self, namespace: &str) -> Result<Vec<Resource>, ClusterError> {
        self.applier.export(namespace).await
    }
}

#[cfg(test)]
#[path = "syncer_tests.rs"]
mod tests;
