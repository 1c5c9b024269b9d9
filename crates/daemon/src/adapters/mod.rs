// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapters for external I/O

pub mod cluster;
pub mod git;
pub mod subprocess;
pub mod transport;

pub use cluster::{ClusterApplier, ClusterError, KubeApplier, SyncErrors};
pub use git::{Checkout, CliRepoFactory, GitError, GitRepo, RepoFactory};
pub use transport::{Transport, TransportConfig, TransportError};

// Test support - only compiled for tests
#[cfg(test)]
pub use cluster::{ClusterCall, FakeClusterApplier};
#[cfg(test)]
pub use git::{FakeGitRepo, FakeRepoFactory, GitCall};
