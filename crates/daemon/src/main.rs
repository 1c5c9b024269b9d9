// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! kagentd: Kubernetes gitops agent.

use anyhow::Context;
use clap::Parser;
use kagent_daemon::lifecycle::{self, Args, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = Config::load(args).context("invalid configuration")?;
    let daemon = lifecycle::startup(&config).await.context("startup failed")?;

    let stop = daemon.shutdown_token();
    tokio::select! {
        _ = lifecycle::shutdown_signal() => {}
        _ = stop.cancelled() => {}
    }
    daemon.shutdown().await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_new(kagent_daemon::env::log_filter())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
}
