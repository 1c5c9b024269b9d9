// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster applier adapters.
//!
//! The applier executes a change set against the live cluster and lists the
//! objects this agent manages. Ordering and locking live in the syncer; the
//! applier only executes and reports per-object failures.

mod kubernetes;

pub use kubernetes::KubeApplier;

#[cfg(test)]
mod fake;
#[cfg(test)]
pub use fake::{ClusterCall, FakeClusterApplier};

use async_trait::async_trait;
use kagent_core::{ObjectIdentity, Resource};
use thiserror::Error;

/// Label marking objects owned by this agent.
pub const MANAGED_LABEL: &str = "kagent.io/managed";
/// Label carrying the commit an object was applied from.
pub const COMMIT_LABEL: &str = "kagent.io/commit";
/// Label carrying the agent version that applied an object.
pub const VERSION_LABEL: &str = "kagent.io/agent-version";
/// Annotation holding the object's own resource id. Controllers copy labels
/// onto the objects they create but never this annotation.
pub const RESOURCE_ID_ANNOTATION: &str = "kagent.io/resource-id";

/// Errors talking to the cluster.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("kubernetes api error: {0}")]
    Api(#[from] kube::Error),

    #[error("unknown api version {0}")]
    InvalidApiVersion(String),

    #[error("failed to decode object: {0}")]
    Decode(String),
}

/// What to do with one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Apply,
    Delete,
}

/// One object-level operation with its identity already parsed.
#[derive(Debug, Clone)]
pub struct Change {
    pub action: ChangeAction,
    pub identity: ObjectIdentity,
    pub resource: Resource,
}

/// A resource that failed to sync and why.
#[derive(Debug, Clone)]
pub struct ResourceFailure {
    pub resource: Resource,
    pub error: String,
}

/// Aggregate of per-resource failures. Never empty when returned as an error.
#[derive(Debug, Clone, Error)]
#[error("{} resource(s) failed to sync", .0.len())]
pub struct SyncErrors(pub Vec<ResourceFailure>);

impl SyncErrors {
    pub fn failures(&self) -> &[ResourceFailure] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok` when nothing failed.
    pub fn into_result(self) -> Result<(), SyncErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Executes change sets against the live cluster.
#[async_trait]
pub trait ClusterApplier: Send + Sync + 'static {
    /// Apply every change, continuing past failures.
    async fn apply(&self, namespace: &str, changes: &[Change]) -> Result<(), SyncErrors>;

    /// Every live object in `namespace` carrying the managed label.
    async fn export(&self, namespace: &str) -> Result<Vec<Resource>, ClusterError>;
}
