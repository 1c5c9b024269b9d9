// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup, periodic status, shutdown.

mod startup;
pub use startup::{shutdown_signal, start_with, startup, Daemon};

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::adapters::{ClusterError, TransportConfig};
use crate::engine::EngineSettings;

/// Command-line arguments, each with an environment fallback.
#[derive(Debug, Clone, Parser)]
#[command(name = "kagentd", version, about = "Kubernetes gitops agent")]
pub struct Args {
    /// Control plane WebSocket endpoint (ws:// or wss://)
    #[arg(long, env = "KAGENT_URL")]
    pub url: String,

    /// Bearer token presented to the control plane
    #[arg(long, env = "KAGENT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Identifier of the cluster this agent manages
    #[arg(long, env = "KAGENT_CLUSTER_ID")]
    pub cluster_id: String,

    /// Directory holding repository mirrors and checkouts
    #[arg(long, env = "KAGENT_WORK_DIR")]
    pub work_dir: Option<PathBuf>,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub url: String,
    pub token: Option<String>,
    pub cluster_id: String,
    /// Root for per-namespace git mirrors
    pub work_dir: PathBuf,
    pub channel_capacity: usize,
    pub replay_capacity: usize,
    pub status_interval: Duration,
    pub git_poll_interval: Duration,
    pub engine: EngineSettings,
}

impl Config {
    /// Combine arguments with the environment tunables.
    pub fn load(args: Args) -> Result<Self, LifecycleError> {
        if !(args.url.starts_with("ws://") || args.url.starts_with("wss://")) {
            return Err(LifecycleError::InvalidUrl(args.url));
        }
        if args.cluster_id.trim().is_empty() {
            return Err(LifecycleError::MissingClusterId);
        }
        let work_dir = args.work_dir.unwrap_or_else(|| std::env::temp_dir().join("kagent"));
        Ok(Self {
            url: args.url,
            token: args.token.filter(|t| !t.is_empty()),
            cluster_id: args.cluster_id,
            work_dir,
            channel_capacity: crate::env::channel_capacity(),
            replay_capacity: crate::env::replay_capacity(),
            status_interval: crate::env::status_interval(),
            git_poll_interval: crate::env::git_poll_interval(),
            engine: EngineSettings::from_env(),
        })
    }

    pub fn transport(&self) -> TransportConfig {
        let mut config =
            TransportConfig::new(self.url.clone(), self.token.clone(), self.cluster_id.clone());
        config.replay_capacity = self.replay_capacity;
        config
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("control plane url must use ws:// or wss://, got {0}")]
    InvalidUrl(String),

    #[error("cluster id is empty")]
    MissingClusterId,

    #[error("cluster client: {0}")]
    Cluster(#[from] ClusterError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
