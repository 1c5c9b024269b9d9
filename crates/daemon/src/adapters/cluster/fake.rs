// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory cluster for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kagent_core::{Resource, ResourceId};
use parking_lot::Mutex;

use super::{Change, ChangeAction, ClusterApplier, ClusterError, ResourceFailure, SyncErrors};

/// Recorded cluster operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    Apply { namespace: String, id: String },
    Delete { namespace: String, id: String },
    Export { namespace: String },
}

#[derive(Default)]
struct FakeClusterState {
    live: HashMap<String, BTreeMap<ResourceId, Resource>>,
    failing: HashSet<String>,
    calls: Vec<ClusterCall>,
    fail_export: bool,
    delay: Option<Duration>,
}

/// Fake cluster applier
#[derive(Clone, Default)]
pub struct FakeClusterApplier {
    inner: Arc<Mutex<FakeClusterState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeClusterApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a live object.
    pub fn insert(&self, namespace: &str, resource: Resource) {
        self.inner
            .lock()
            .live
            .entry(namespace.to_string())
            .or_default()
            .insert(resource.id.clone(), resource);
    }

    /// Make every operation on `id` fail.
    pub fn fail_resource(&self, id: &str) {
        self.inner.lock().failing.insert(id.to_string());
    }

    pub fn fail_export(&self, fail: bool) {
        self.inner.lock().fail_export = fail;
    }

    /// Make every apply call take `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().delay = Some(delay);
    }

    pub fn live(&self, namespace: &str) -> Vec<Resource> {
        let state = self.inner.lock();
        state.live.get(namespace).map(|m| m.values().cloned().collect()).unwrap_or_default()
    }

    pub fn live_ids(&self, namespace: &str) -> Vec<String> {
        self.live(namespace).into_iter().map(|r| r.id.to_string()).collect()
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.inner.lock().calls.clone()
    }

    /// Highest number of concurrent apply calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterApplier for FakeClusterApplier {
    async fn apply(&self, namespace: &str, changes: &[Change]) -> Result<(), SyncErrors> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.inner.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut failures = Vec::new();
        {
            let mut state = self.inner.lock();
            for change in changes {
                let id = change.resource.id.to_string();
                let ns = namespace.to_string();
                let call = match change.action {
                    ChangeAction::Apply => ClusterCall::Apply { namespace: ns, id: id.clone() },
                    ChangeAction::Delete => ClusterCall::Delete { namespace: ns, id: id.clone() },
                };
                state.calls.push(call);
                if state.failing.contains(&id) {
                    failures.push(ResourceFailure {
                        resource: change.resource.clone(),
                        error: "injected failure".to_string(),
                    });
                    continue;
                }
                let live = state.live.entry(namespace.to_string()).or_default();
                match change.action {
                    ChangeAction::Apply => {
                        live.insert(change.resource.id.clone(), change.resource.clone());
                    }
                    ChangeAction::Delete => {
                        live.remove(&change.resource.id);
                    }
                }
            }
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        SyncErrors(failures).into_result()
    }

    async fn export(&self, namespace: &str) -> Result<Vec<Resource>, ClusterError> {
        let mut state = self.inner.lock();
        state.calls.push(ClusterCall::Export { namespace: namespace.to_string() });
        if state.fail_export {
            return Err(ClusterError::Decode("injected export failure".to_string()));
        }
        Ok(state.live.get(namespace).map(|m| m.values().cloned().collect()).unwrap_or_default())
    }
}
