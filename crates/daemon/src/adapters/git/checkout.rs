// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disposable working clone of a mirror.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;

use super::mirror::git_command;
use super::{check_output, Checkout, GitError};
use crate::adapters::subprocess::run_with_timeout;

const TAGGER_NAME: &str = "kagent";
const TAGGER_EMAIL: &str = "kagent@localhost";

/// Working clone living in a temporary directory.
///
/// Dropping the checkout removes the directory, so the clone is released on
/// every exit path of the caller.
pub struct CliCheckout {
    dir: TempDir,
    upstream_url: String,
    key_path: Option<PathBuf>,
}

impl CliCheckout {
    /// Clone `mirror` into a fresh directory under `parent` and detach at
    /// `reference`.
    pub(crate) async fn create(
        mirror: &Path,
        parent: &Path,
        reference: &str,
        upstream_url: String,
        key_path: Option<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, GitError> {
        let dir = tempfile::Builder::new().prefix("checkout-").tempdir_in(parent)?;
        let checkout = Self { dir, upstream_url, key_path };

        let mut cmd = checkout.git_at(false);
        cmd.args(["clone", "--quiet", "--no-checkout"]).arg(mirror).arg(checkout.dir.path());
        check_output("clone", run_with_timeout(cmd, timeout, "git clone").await?)?;

        let mut cmd = checkout.git_at(true);
        cmd.args(["checkout", "--quiet", "--detach", reference]);
        check_output("checkout", run_with_timeout(cmd, timeout, "git checkout").await?)?;

        Ok(checkout)
    }

    fn git_at(&self, in_tree: bool) -> Command {
        let mut cmd = git_command(self.key_path.as_deref());
        if in_tree {
            cmd.arg("-C").arg(self.dir.path());
        }
        cmd
    }
}

#[async_trait]
impl Checkout for CliCheckout {
    fn dir(&self) -> &Path {
        self.dir.path()
    }

    async fn changed_files(
        &self,
        from: &str,
        to: &str,
        subdir: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, GitError> {
        let mut cmd = self.git_at(true);
        cmd.args(["diff", "--name-only", "--no-renames", from, to, "--", subdir]);
        let stdout = check_output("diff", run_with_timeout(cmd, timeout, "git diff").await?)?;
        Ok(parse_name_list(&stdout))
    }

    async fn last_commit(&self, path: &str, timeout: Duration) -> Result<String, GitError> {
        let mut cmd = self.git_at(true);
        cmd.args(["log", "-n", "1", "--pretty=format:%H", "--", path]);
        let stdout = check_output("log", run_with_timeout(cmd, timeout, "git log").await?)?;
        let commit = stdout.trim();
        if commit.is_empty() {
            return Err(GitError::UnknownRevision(path.to_string()));
        }
        Ok(commit.to_string())
    }

    async fn move_tag_and_push(
        &self,
        reference: &str,
        tag: &str,
        message: &str,
        timeout: Duration,
    ) -> Result<(), GitError> {
        let mut cmd = self.git_at(true);
        cmd.arg("-c")
            .arg(format!("user.name={}", TAGGER_NAME))
            .arg("-c")
            .arg(format!("user.email={}", TAGGER_EMAIL))
            .args(["tag", "--force", "--annotate", "--message", message, tag, reference]);
        check_output("tag", run_with_timeout(cmd, timeout, "git tag").await?)?;

        let mut cmd = self.git_at(true);
        cmd.args(["push", "--force", "--quiet", &self.upstream_url])
            .arg(format!("refs/tags/{}", tag));
        check_output("push", run_with_timeout(cmd, timeout, "git push").await?)?;
        Ok(())
    }
}

/// Split `git diff --name-only` output into paths.
pub(crate) fn parse_name_list(stdout: &str) -> Vec<String> {
    stdout.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()
}
