// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One reconciliation pass for one namespace.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use kagent_core::command::GIT_OPS_SYNC_EVENT;
use kagent_core::{
    env_key, FileCommit, Packet, PacketError, Resource, ResourceCommit, SyncEvent,
    SyncResourceError,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::manifests::{self, ManifestSet};
use super::{diff, EngineSettings};
use crate::adapters::cluster::{
    ClusterError, COMMIT_LABEL, MANAGED_LABEL, RESOURCE_ID_ANNOTATION, VERSION_LABEL,
};
use crate::adapters::git::{Checkout, GitError, GitRepo};
use crate::env::AGENT_VERSION;
use crate::syncer::Syncer;

/// Errors that end a pass early.
///
/// Anything before the event is emitted leaves both tags untouched.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("resolving {tag}: {source}")]
    Resolve {
        tag: String,
        #[source]
        source: GitError,
    },

    #[error("checkout of {commit}: {source}")]
    Checkout {
        commit: String,
        #[source]
        source: GitError,
    },

    #[error("listing live objects: {0}")]
    Export(#[from] ClusterError),

    #[error(transparent)]
    Encode(#[from] PacketError),

    #[error("response queue closed")]
    ResponsesClosed,

    #[error("moving {tag} to {commit}: {source}")]
    Push {
        tag: String,
        commit: String,
        #[source]
        source: GitError,
    },
}

/// What a pass did.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// No desired marker yet; nothing to reconcile.
    Idle,
    Synced(PassReport),
}

#[derive(Debug, Clone)]
pub struct PassReport {
    /// Desired commit the pass reconciled towards.
    pub commit: String,
    /// Progress commit before the pass, `None` on initial sync.
    pub previous: Option<String>,
    pub event: SyncEvent,
    pub applied: usize,
    pub deleted: usize,
    pub tag_moved: bool,
}

/// Runs reconciliation passes for one namespace.
pub struct Reconciler {
    namespace: String,
    repo: Arc<dyn GitRepo>,
    syncer: Syncer,
    responses: mpsc::Sender<Packet>,
    settings: EngineSettings,
}

impl Reconciler {
    pub fn new(
        namespace: impl Into<String>,
        repo: Arc<dyn GitRepo>,
        syncer: Syncer,
        responses: mpsc::Sender<Packet>,
        settings: EngineSettings,
    ) -> Self {
        Self { namespace: namespace.into(), repo, syncer, responses, settings }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Commit the desired marker points at, or `None` when there is no
    /// marker (or no mirror) yet.
    pub async fn desired_commit(&self) -> Result<Option<String>, PassError> {
        let tag = &self.settings.marker_tag;
        match self.repo.revision(tag, self.settings.git_timeout).await {
            Ok(commit) => Ok(Some(commit)),
            Err(GitError::UnknownRevision(_) | GitError::NotReady) => Ok(None),
            Err(source) => Err(PassError::Resolve { tag: tag.clone(), source }),
        }
    }

    async fn progress_commit(&self) -> Result<Option<String>, PassError> {
        let tag = &self.settings.progress_tag;
        match self.repo.revision(tag, self.settings.git_timeout).await {
            Ok(commit) => Ok(Some(commit)),
            Err(GitError::UnknownRevision(_)) => Ok(None),
            Err(source) => Err(PassError::Resolve { tag: tag.clone(), source }),
        }
    }

    /// Run one pass.
    ///
    /// Emits exactly one sync event once the checkout succeeds, then moves the
    /// progress tag if the desired commit is new.
    pub async fn run(&self) -> Result<PassOutcome, PassError> {
        let timeout = self.settings.git_timeout;
        let ns = self.namespace.as_str();

        let Some(desired) = self.desired_commit().await? else {
            debug!(namespace = %ns, tag = %self.settings.marker_tag, "no desired marker yet");
            return Ok(PassOutcome::Idle);
        };
        let previous = self.progress_commit().await?;
        let started_at = Utc::now();

        let checkout = self
            .repo
            .checkout(&desired, timeout)
            .await
            .map_err(|source| PassError::Checkout { commit: desired.clone(), source })?;

        let manifests = manifests::load(checkout.dir(), &self.settings.manifest_root, ns);
        let changed = self
            .changed_files(checkout.as_ref(), &manifests, previous.as_deref(), &desired)
            .await;

        let mut event = SyncEvent::new(started_at, started_at);
        event.metadata.commit = desired.clone();
        for failed in &manifests.errors {
            event.metadata.errors.push(SyncResourceError {
                id: String::new(),
                path: failed.path.clone(),
                commit: desired.clone(),
                error: failed.error.clone(),
            });
        }

        let applies = self
            .label_changed(checkout.as_ref(), &manifests, &changed, &desired, &mut event)
            .await;
        let live = self.syncer.export(ns).await?;
        let def = diff::plan(&manifests.resources, applies, live, manifests.is_complete());
        if !manifests.is_complete() {
            let errors = manifests.errors.len();
            warn!(namespace = %ns, errors, "manifest errors, skipping deletions");
        }

        let applied = def.applies().count();
        let deleted = def.deletes().count();
        event.resource_ids = def.actions().iter().map(|a| a.resource().id.clone()).collect();

        if let Err(errors) = self.syncer.sync(ns, def).await {
            for failure in errors.0 {
                event.metadata.errors.push(SyncResourceError {
                    id: failure.resource.id.to_string(),
                    path: failure.resource.source.clone(),
                    commit: commit_of(&failure.resource).unwrap_or(&desired).to_string(),
                    error: failure.error,
                });
            }
        }

        event.ended_at = Utc::now();
        let packet = Packet::with_json(env_key(ns), GIT_OPS_SYNC_EVENT, &event)?;
        self.responses.send(packet).await.map_err(|_| PassError::ResponsesClosed)?;

        info!(
            namespace = %ns,
            commit = %desired,
            applied,
            deleted,
            errors = event.metadata.errors.len(),
            "sync pass complete"
        );

        let tag_moved = previous.as_deref() != Some(desired.as_str());
        if tag_moved {
            let tag = &self.settings.progress_tag;
            let message = format!("kagent {} synced {}", AGENT_VERSION, desired);
            let pushed = checkout.move_tag_and_push(&desired, tag, &message, timeout).await;
            if let Err(source) = pushed {
                return Err(PassError::Push { tag: tag.clone(), commit: desired, source });
            }
            drop(checkout);
            if let Err(e) = self.repo.refresh(timeout).await {
                warn!(namespace = %ns, error = %e, "refresh after push failed");
            }
        }

        Ok(PassOutcome::Synced(PassReport {
            commit: desired,
            previous,
            event,
            applied,
            deleted,
            tag_moved,
        }))
    }

    /// Manifest files that changed since `previous`: every file on initial
    /// sync, none when already at `desired`.
    async fn changed_files(
        &self,
        checkout: &dyn Checkout,
        manifests: &ManifestSet,
        previous: Option<&str>,
        desired: &str,
    ) -> Vec<String> {
        let previous = match previous {
            None => return manifests.files.clone(),
            Some(previous) if previous == desired => return Vec::new(),
            Some(previous) => previous,
        };

        let root = manifests::normalize_root(&self.settings.manifest_root);
        let subdir = if root.is_empty() { "." } else { root.as_str() };
        let timeout = self.settings.git_timeout;
        match checkout.changed_files(previous, desired, subdir, timeout).await {
            Ok(paths) => {
                let paths: BTreeSet<String> = paths.into_iter().collect();
                // Deleted files have nothing to apply
                manifests.files.iter().filter(|f| paths.contains(*f)).cloned().collect()
            }
            Err(e) => {
                let ns = &self.namespace;
                warn!(namespace = %ns, %previous, error = %e, "diff failed, syncing all files");
                manifests.files.clone()
            }
        }
    }

    /// Label and annotate every resource from a changed file with ownership
    /// and provenance, recording file and resource commits on `event`.
    async fn label_changed(
        &self,
        checkout: &dyn Checkout,
        manifests: &ManifestSet,
        changed: &[String],
        desired: &str,
        event: &mut SyncEvent,
    ) -> Vec<Resource> {
        let mut labeled = Vec::new();
        for file in changed {
            let commit = match checkout.last_commit(file, self.settings.git_timeout).await {
                Ok(commit) => commit,
                Err(e) => {
                    event.metadata.errors.push(SyncResourceError {
                        id: String::new(),
                        path: file.clone(),
                        commit: desired.to_string(),
                        error: e.to_string(),
                    });
                    desired.to_string()
                }
            };

            for resource in manifests.from_file(file) {
                let labels = [
                    (MANAGED_LABEL, "true"),
                    (COMMIT_LABEL, commit.as_str()),
                    (VERSION_LABEL, AGENT_VERSION),
                ];
                let owned = resource.with_labels(&labels).and_then(|r| {
                    let id = r.id.to_string();
                    r.with_annotations(&[(RESOURCE_ID_ANNOTATION, id.as_str())])
                });
                match owned {
                    Ok(resource) => {
                        event.metadata.resource_commits.push(ResourceCommit {
                            resource_id: resource.id.clone(),
                            file: file.clone(),
                            commit: commit.clone(),
                        });
                        labeled.push(resource);
                    }
                    Err(e) => event.metadata.errors.push(SyncResourceError {
                        id: resource.id.to_string(),
                        path: file.clone(),
                        commit: commit.clone(),
                        error: e.to_string(),
                    }),
                }
            }
            event.metadata.file_commits.push(FileCommit { file: file.clone(), commit });
        }
        labeled
    }
}

fn commit_of(resource: &Resource) -> Option<&str> {
    resource.meta.labels.get(COMMIT_LABEL).map(String::as_str)
}

#[cfg(test)]
#[path = "pass_tests.rs"]
mod tests;
