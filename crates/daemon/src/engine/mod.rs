// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation engine.
//!
//! Each managed namespace runs one [`SyncLoop`] that decides when to
//! reconcile and one [`Reconciler`] that performs a pass: check out the
//! desired commit, work out which manifests changed since the progress tag,
//! converge the cluster, emit a sync event and advance the progress tag.

mod diff;
mod manifests;
mod pass;
mod sync_loop;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use pass::{PassError, PassOutcome, PassReport, Reconciler};
pub use sync_loop::{SyncLoop, SyncStats, SyncStatsSnapshot, Trigger};

use std::time::Duration;

/// Settings shared by every namespace's engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Time between periodic passes.
    pub sync_interval: Duration,
    /// Deadline for each git operation.
    pub git_timeout: Duration,
    /// Tag the control plane moves to the desired commit.
    pub marker_tag: String,
    /// Tag this agent moves after reconciling.
    pub progress_tag: String,
    /// Directory holding manifests, relative to the repository root.
    pub manifest_root: String,
}

impl EngineSettings {
    /// Settings from the environment tunables.
    pub fn from_env() -> Self {
        Self {
            sync_interval: crate::env::sync_interval(),
            git_timeout: crate::env::git_timeout(),
            marker_tag: crate::env::marker_tag(),
            progress_tag: crate::env::progress_tag(),
            manifest_root: crate::env::manifest_root(),
        }
    }
}
