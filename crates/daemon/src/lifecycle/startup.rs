// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup, status reporting and shutdown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kagent_core::CrChan;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::{Config, LifecycleError};
use crate::adapters::{CliRepoFactory, ClusterApplier, KubeApplier, RepoFactory, Transport};
use crate::dispatch::{status_packet, AgentState, CommandRegistry, Dispatcher, HandlerCtx};
use crate::supervisor::NamespaceSupervisor;
use crate::syncer::Syncer;

/// A running daemon.
pub struct Daemon {
    pub ctx: Arc<HandlerCtx>,
    shutdown: CancellationToken,
    handlers: TaskTracker,
    tasks: Vec<JoinHandle<()>>,
}

/// Start the daemon against the cluster it runs in.
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&config.work_dir)?;
    let applier = KubeApplier::new().await?;
    let factory = CliRepoFactory::new(
        config.work_dir.clone(),
        config.git_poll_interval,
        config.engine.git_timeout,
    );
    info!(
        url = %config.url,
        cluster_id = %config.cluster_id,
        work_dir = %config.work_dir.display(),
        "starting kagent"
    );
    Ok(start_with(config, Arc::new(applier), Arc::new(factory)))
}

/// Wire every component around the given collaborators and spawn the
/// dispatch loop, transport and status reporter.
pub fn start_with(
    config: &Config,
    applier: Arc<dyn ClusterApplier>,
    factory: Arc<dyn RepoFactory>,
) -> Daemon {
    let shutdown = CancellationToken::new();
    let (chan, receivers) = CrChan::new(config.channel_capacity);
    let syncer = Syncer::new(applier);
    let supervisor = Arc::new(NamespaceSupervisor::new(
        factory,
        syncer.clone(),
        chan.responses().clone(),
        config.engine.clone(),
        shutdown.clone(),
    ));
    let ctx = Arc::new(HandlerCtx {
        agent: AgentState::new(),
        supervisor,
        syncer,
        chan: chan.clone(),
        cluster_id: config.cluster_id.clone(),
        started_at: Instant::now(),
        shutdown: shutdown.clone(),
    });

    let handlers = TaskTracker::new();
    let dispatcher =
        Dispatcher::new(CommandRegistry::standard(), Arc::clone(&ctx), handlers.clone());
    let transport =
        Transport::new(config.transport(), chan.commands().clone(), receivers.responses);

    let tasks = vec![
        tokio::spawn(dispatcher.run(receivers.commands)),
        tokio::spawn(transport.run(shutdown.clone())),
        tokio::spawn(report_status(Arc::clone(&ctx), config.status_interval)),
    ];
    Daemon { ctx, shutdown, handlers, tasks }
}

impl Daemon {
    /// Token that stops the daemon when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop everything and wait for it to exit.
    ///
    /// Namespaces are removed first so no pass outlives the process, then
    /// in-flight handlers and the long-running tasks are awaited.
    pub async fn shutdown(self) {
        info!("shutting down");
        self.shutdown.cancel();
        self.ctx.supervisor.shutdown().await;

        self.handlers.close();
        self.handlers.wait().await;
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "task ended abnormally");
            }
        }
        info!("shutdown complete");
    }
}

/// Publish an `agent_status` packet every `interval`.
async fn report_status(ctx: Arc<HandlerCtx>, interval: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let packet = match status_packet(&ctx) {
            Ok(packet) => packet,
            Err(e) => {
                error!(error = %e, "encoding status");
                continue;
            }
        };
        tokio::select! {
            _ = ctx.shutdown.cancelled() => break,
            sent = ctx.chan.responses().send(packet) => {
                if sent.is_err() {
                    break;
                }
                debug!("status published");
            }
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "installing SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "installing SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
