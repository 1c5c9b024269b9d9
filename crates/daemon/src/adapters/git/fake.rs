// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory git repository for tests.
//!
//! Commits are full file trees; checkouts materialize the tree into a real
//! temporary directory so manifest loading reads actual files.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kagent_core::EnvParas;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Checkout, GitError, GitRepo, RepoFactory};

/// Recorded git operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Refresh,
    Revision(String),
    Checkout(String),
    Push { reference: String, tag: String },
}

type Tree = BTreeMap<String, String>;

#[derive(Default)]
struct FakeGitState {
    commits: Vec<(String, Tree)>,
    tags: HashMap<String, String>,
    calls: Vec<GitCall>,
    fail_checkout: bool,
    fail_push: bool,
    checkout_delay: Option<Duration>,
    notify: Option<mpsc::Sender<()>>,
}

impl FakeGitState {
    fn tree(&self, commit: &str) -> Option<&Tree> {
        self.commits.iter().find(|(id, _)| id == commit).map(|(_, tree)| tree)
    }

    fn head_tree(&self) -> Tree {
        self.commits.last().map(|(_, t)| t.clone()).unwrap_or_default()
    }
}

/// Fake git repository
#[derive(Clone, Default)]
pub struct FakeGitRepo {
    inner: Arc<Mutex<FakeGitState>>,
}

impl FakeGitRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit `files` on top of the current tree, returning the commit id.
    pub fn commit(&self, files: &[(&str, &str)]) -> String {
        let mut state = self.inner.lock();
        let mut tree = state.head_tree();
        for (path, contents) in files {
            tree.insert(path.to_string(), contents.to_string());
        }
        let id = format!("c{:040}", state.commits.len() + 1);
        state.commits.push((id.clone(), tree));
        id
    }

    /// Commit removing `paths`.
    pub fn remove(&self, paths: &[&str]) -> String {
        let mut state = self.inner.lock();
        let mut tree = state.head_tree();
        for path in paths {
            tree.remove(*path);
        }
        let id = format!("c{:040}", state.commits.len() + 1);
        state.commits.push((id.clone(), tree));
        id
    }

    pub fn set_tag(&self, tag: &str, commit: &str) {
        self.inner.lock().tags.insert(tag.to_string(), commit.to_string());
    }

    pub fn tag(&self, tag: &str) -> Option<String> {
        self.inner.lock().tags.get(tag).cloned()
    }

    pub fn fail_checkout(&self, fail: bool) {
        self.inner.lock().fail_checkout = fail;
    }

    pub fn fail_push(&self, fail: bool) {
        self.inner.lock().fail_push = fail;
    }

    /// Make every checkout take `delay` before returning.
    pub fn set_checkout_delay(&self, delay: Duration) {
        self.inner.lock().checkout_delay = Some(delay);
    }

    /// Fire the watcher's change notification, as if the remote moved.
    pub fn notify_change(&self) -> bool {
        let tx = self.inner.lock().notify.clone();
        tx.is_some_and(|tx| tx.try_send(()).is_ok())
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.inner.lock().calls.clone()
    }

    pub fn pushes(&self) -> Vec<GitCall> {
        self.calls().into_iter().filter(|c| matches!(c, GitCall::Push { .. })).collect()
    }
}

#[async_trait]
impl GitRepo for FakeGitRepo {
    async fn watch(&self, stop: CancellationToken, notify: mpsc::Sender<()>) {
        self.inner.lock().notify = Some(notify);
        stop.cancelled().await;
        self.inner.lock().notify = None;
    }

    async fn refresh(&self, _timeout: Duration) -> Result<(), GitError> {
        self.inner.lock().calls.push(GitCall::Refresh);
        Ok(())
    }

    async fn revision(&self, tag: &str, _timeout: Duration) -> Result<String, GitError> {
        let mut state = self.inner.lock();
        state.calls.push(GitCall::Revision(tag.to_string()));
        state.tags.get(tag).cloned().ok_or_else(|| GitError::UnknownRevision(tag.to_string()))
    }

    async fn checkout(
        &self,
        reference: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn Checkout>, GitError> {
        let delay = {
            let mut state = self.inner.lock();
            state.calls.push(GitCall::Checkout(reference.to_string()));
            if state.fail_checkout {
                return Err(GitError::Command { op: "clone", stderr: "injected".to_string() });
            }
            state.checkout_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (history, tree) = {
            let state = self.inner.lock();
            let tree = state
                .tree(reference)
                .cloned()
                .ok_or_else(|| GitError::UnknownRevision(reference.to_string()))?;
            let pos = state.commits.iter().position(|(id, _)| id == reference).unwrap_or(0);
            (state.commits[..=pos].to_vec(), tree)
        };

        let dir = tempfile::tempdir()?;
        for (path, contents) in &tree {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, contents)?;
        }
        Ok(Box::new(FakeCheckout { dir, history, repo: self.clone() }))
    }
}

/// Checkout produced by [`FakeGitRepo`]
pub struct FakeCheckout {
    dir: TempDir,
    history: Vec<(String, Tree)>,
    repo: FakeGitRepo,
}

impl FakeCheckout {
    fn tree(&self, commit: &str) -> Option<&Tree> {
        self.history.iter().find(|(id, _)| id == commit).map(|(_, t)| t)
    }
}

#[async_trait]
impl Checkout for FakeCheckout {
    fn dir(&self) -> &Path {
        self.dir.path()
    }

    async fn changed_files(
        &self,
        from: &str,
        to: &str,
        subdir: &str,
        _timeout: Duration,
    ) -> Result<Vec<String>, GitError> {
        let from_tree =
            self.tree(from).ok_or_else(|| GitError::UnknownRevision(from.to_string()))?;
        let to_tree = self.tree(to).ok_or_else(|| GitError::UnknownRevision(to.to_string()))?;
        let prefix = subdir.trim_start_matches("./").trim_matches('/');
        let mut changed: Vec<String> = from_tree
            .keys()
            .chain(to_tree.keys())
            .filter(|p| from_tree.get(*p) != to_tree.get(*p))
            .filter(|p| prefix.is_empty() || prefix == "." || p.starts_with(prefix))
            .cloned()
            .collect();
        changed.sort();
        changed.dedup();
        Ok(changed)
    }

    async fn last_commit(&self, path: &str, _timeout: Duration) -> Result<String, GitError> {
        let mut last = None;
        let mut previous: Option<&String> = None;
        for (id, tree) in &self.history {
            let current = tree.get(path);
            if current.is_some() && current != previous {
                last = Some(id.clone());
            }
            previous = current;
        }
        last.ok_or_else(|| GitError::UnknownRevision(path.to_string()))
    }

    async fn move_tag_and_push(
        &self,
        reference: &str,
        tag: &str,
        _message: &str,
        _timeout: Duration,
    ) -> Result<(), GitError> {
        let mut state = self.repo.inner.lock();
        state.calls.push(GitCall::Push { reference: reference.to_string(), tag: tag.to_string() });
        if state.fail_push {
            return Err(GitError::Command { op: "push", stderr: "injected".to_string() });
        }
        state.tags.insert(tag.to_string(), reference.to_string());
        Ok(())
    }
}

/// Factory handing out one [`FakeGitRepo`] per namespace.
#[derive(Clone, Default)]
pub struct FakeRepoFactory {
    repos: Arc<Mutex<HashMap<String, FakeGitRepo>>>,
    fail_open: Arc<Mutex<bool>>,
}

impl FakeRepoFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repo for `namespace`, created on first use.
    pub fn repo(&self, namespace: &str) -> FakeGitRepo {
        self.repos.lock().entry(namespace.to_string()).or_default().clone()
    }

    pub fn fail_open(&self, fail: bool) {
        *self.fail_open.lock() = fail;
    }
}

impl RepoFactory for FakeRepoFactory {
    fn open(&self, env: &EnvParas) -> Result<Arc<dyn GitRepo>, GitError> {
        if *self.fail_open.lock() {
            return Err(GitError::Io(std::io::Error::other("injected open failure")));
        }
        Ok(Arc::new(self.repo(&env.namespace)))
    }
}
