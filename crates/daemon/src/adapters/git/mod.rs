// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git mirror adapters.
//!
//! Each managed namespace owns one [`GitRepo`]: a local mirror of the remote
//! that is kept fresh in the background and hands out isolated working
//! [`Checkout`]s on demand.
//!
//! # Module layout
//!
//! - [`mirror`]: `git` CLI mirror and its factory
//! - [`checkout`]: disposable working clone of a mirror

mod checkout;
mod mirror;

pub use checkout::CliCheckout;
pub use mirror::{CliMirror, CliRepoFactory};

#[cfg(test)]
mod fake;
#[cfg(test)]
pub use fake::{FakeCheckout, FakeGitRepo, FakeRepoFactory, GitCall};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kagent_core::EnvParas;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapters::subprocess::SubprocessError;

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The named revision does not exist (yet). Expected on first sync.
    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    #[error("mirror is not cloned yet")]
    NotReady,

    #[error("git {op} failed: {stderr}")]
    Command { op: &'static str, stderr: String },

    #[error(transparent)]
    Subprocess(#[from] SubprocessError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local mirror of one remote repository.
#[async_trait]
pub trait GitRepo: Send + Sync + 'static {
    /// Keep the mirror fresh until `stop` fires.
    ///
    /// Sends on `notify` (without blocking) whenever the mirrored refs change.
    /// Returns once `stop` is cancelled.
    async fn watch(&self, stop: CancellationToken, notify: mpsc::Sender<()>);

    /// Fetch from the remote now.
    async fn refresh(&self, timeout: Duration) -> Result<(), GitError>;

    /// Resolve `tag` to a commit id.
    ///
    /// Returns [`GitError::UnknownRevision`] when the tag does not exist.
    async fn revision(&self, tag: &str, timeout: Duration) -> Result<String, GitError>;

    /// Produce an isolated working checkout at `reference`.
    ///
    /// The checkout is removed from disk when dropped.
    async fn checkout(
        &self,
        reference: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Checkout>, GitError>;
}

/// Disposable working clone, safe to mutate.
#[async_trait]
pub trait Checkout: Send + Sync {
    /// Root of the working tree.
    fn dir(&self) -> &Path;

    /// Files under `subdir` that differ between `from` and `to`, relative to
    /// the repository root.
    async fn changed_files(
        &self,
        from: &str,
        to: &str,
        subdir: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, GitError>;

    /// Last commit touching `path` (relative to the repository root).
    async fn last_commit(&self, path: &str, timeout: Duration) -> Result<String, GitError>;

    /// Point `tag` at `reference` and publish the move to the remote.
    async fn move_tag_and_push(
        &self,
        reference: &str,
        tag: &str,
        message: &str,
        timeout: Duration,
    ) -> Result<(), GitError>;
}

/// Opens the [`GitRepo`] backing an environment.
pub trait RepoFactory: Send + Sync + 'static {
    fn open(&self, env: &EnvParas) -> Result<Arc<dyn GitRepo>, GitError>;
}

/// Check a command result and turn a failed exit into [`GitError::Command`].
pub(crate) fn check_output(
    op: &'static str,
    output: std::process::Output,
) -> Result<String, GitError> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(GitError::Command { op, stderr })
    }
}
