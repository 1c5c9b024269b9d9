// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bare mirror maintained with the `git` CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kagent_core::EnvParas;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::checkout::CliCheckout;
use super::{check_output, Checkout, GitError, GitRepo, RepoFactory};
use crate::adapters::subprocess::run_with_timeout;

/// Builds a `git` command with prompts disabled and, when a key is
/// configured, ssh pinned to that key.
pub(crate) fn git_command(key_path: Option<&Path>) -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0").env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
    if let Some(key) = key_path {
        cmd.env(
            "GIT_SSH_COMMAND",
            format!(
                "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null",
                key.display()
            ),
        );
    }
    cmd
}

/// Mirror of one environment's repository under `<work_dir>/<namespace>`.
pub struct CliMirror {
    namespace: String,
    url: String,
    root: PathBuf,
    key_path: Option<PathBuf>,
    poll_interval: Duration,
    timeout: Duration,
    // Serializes clone/fetch against the on-disk mirror.
    fetch_lock: Mutex<()>,
}

impl CliMirror {
    pub fn new(
        namespace: impl Into<String>,
        url: impl Into<String>,
        root: PathBuf,
        key_path: Option<PathBuf>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            url: url.into(),
            root,
            key_path,
            poll_interval,
            timeout,
            fetch_lock: Mutex::new(()),
        }
    }

    fn mirror_path(&self) -> PathBuf {
        self.root.join("mirror.git")
    }

    fn is_cloned(&self) -> bool {
        self.mirror_path().join("HEAD").exists()
    }

    fn git(&self) -> Command {
        git_command(self.key_path.as_deref())
    }

    async fn ensure_cloned(&self, timeout: Duration) -> Result<(), GitError> {
        if self.is_cloned() {
            return Ok(());
        }
        let path = self.mirror_path();
        if path.exists() {
            tokio::fs::remove_dir_all(&path).await?;
        }
        info!(namespace = %self.namespace, url = %self.url, "cloning mirror");
        let mut cmd = self.git();
        cmd.arg("clone").arg("--mirror").arg("--quiet").arg(&self.url).arg(&path);
        let result = run_with_timeout(cmd, timeout, "git clone --mirror")
            .await
            .map_err(GitError::from)
            .and_then(|output| check_output("clone", output));
        if let Err(e) = result {
            // Leave no half-written mirror behind for the next attempt
            let _ = tokio::fs::remove_dir_all(&path).await;
            return Err(e);
        }
        Ok(())
    }

    /// Snapshot of every mirrored ref, used to detect remote movement.
    async fn refs_snapshot(&self, timeout: Duration) -> Result<String, GitError> {
        let mut cmd = self.git();
        cmd.arg("-C")
            .arg(self.mirror_path())
            .args(["for-each-ref", "--format=%(objectname) %(refname)"]);
        let output = run_with_timeout(cmd, timeout, "git for-each-ref").await?;
        check_output("for-each-ref", output)
    }
}

#[async_trait]
impl GitRepo for CliMirror {
    async fn watch(&self, stop: CancellationToken, notify: mpsc::Sender<()>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_refs: Option<String> = None;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.refresh(self.timeout).await {
                warn!(namespace = %self.namespace, error = %e, "mirror refresh failed");
                continue;
            }

            match self.refs_snapshot(self.timeout).await {
                Ok(refs) if last_refs.as_deref() != Some(refs.as_str()) => {
                    debug!(namespace = %self.namespace, "mirror refs changed");
                    last_refs = Some(refs);
                    // Capacity-1 channel: a pending notification already covers this change
                    let _ = notify.try_send(());
                }
                Ok(_) => {}
                Err(e) => warn!(namespace = %self.namespace, error = %e, "failed to list refs"),
            }
        }
        debug!(namespace = %self.namespace, "mirror watcher stopped");
    }

    async fn refresh(&self, timeout: Duration) -> Result<(), GitError> {
        let _guard = self.fetch_lock.lock().await;
        if !self.is_cloned() {
            return self.ensure_cloned(timeout).await;
        }
        let mut cmd = self.git();
        cmd.arg("-C").arg(self.mirror_path()).args(["fetch", "--prune", "--quiet", "origin"]);
        let output = run_with_timeout(cmd, timeout, "git fetch").await?;
        check_output("fetch", output).map(|_| ())
    }

    async fn revision(&self, tag: &str, timeout: Duration) -> Result<String, GitError> {
        if !self.is_cloned() {
            return Err(GitError::NotReady);
        }
        let mut cmd = self.git();
        cmd.arg("-C")
            .arg(self.mirror_path())
            .args(["rev-parse", "--verify", "--quiet"])
            .arg(format!("refs/tags/{}^{{commit}}", tag));
        let output = run_with_timeout(cmd, timeout, "git rev-parse").await?;
        parse_revision(tag, output)
    }

    async fn checkout(
        &self,
        reference: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Checkout>, GitError> {
        if !self.is_cloned() {
            return Err(GitError::NotReady);
        }
        let parent = self.root.join("checkouts");
        tokio::fs::create_dir_all(&parent).await?;
        let checkout = CliCheckout::create(
            &self.mirror_path(),
            &parent,
            reference,
            self.url.clone(),
            self.key_path.clone(),
            timeout,
        )
        .await?;
        Ok(Box::new(checkout))
    }
}

/// Interpret `git rev-parse --verify --quiet` output.
///
/// `--quiet` makes a missing ref exit non-zero with empty stderr.
pub(crate) fn parse_revision(
    tag: &str,
    output: std::process::Output,
) -> Result<String, GitError> {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if output.status.success() && !stdout.is_empty() {
        return Ok(stdout);
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        Err(GitError::UnknownRevision(tag.to_string()))
    } else {
        Err(GitError::Command { op: "rev-parse", stderr })
    }
}

/// Creates one [`CliMirror`] per environment under a shared work directory.
pub struct CliRepoFactory {
    work_dir: PathBuf,
    poll_interval: Duration,
    timeout: Duration,
}

impl CliRepoFactory {
    pub fn new(work_dir: PathBuf, poll_interval: Duration, timeout: Duration) -> Self {
        Self { work_dir, poll_interval, timeout }
    }
}

impl RepoFactory for CliRepoFactory {
    fn open(&self, env: &EnvParas) -> Result<Arc<dyn GitRepo>, GitError> {
        let root = self.work_dir.join(&env.namespace);
        std::fs::create_dir_all(&root)?;
        let key_path = if env.git_rsa_key.trim().is_empty() {
            None
        } else {
            Some(write_key(&root, &env.git_rsa_key)?)
        };
        Ok(Arc::new(CliMirror::new(
            env.namespace.clone(),
            env.git_url.clone(),
            root,
            key_path,
            self.poll_interval,
            self.timeout,
        )))
    }
}

fn write_key(root: &Path, key: &str) -> Result<PathBuf, GitError> {
    let path = root.join("identity");
    let mut contents = key.trim_end().to_string();
    contents.push('\n');
    std::fs::write(&path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(path)
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod tests;
