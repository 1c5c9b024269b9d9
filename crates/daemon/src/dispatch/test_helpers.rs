// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler context wired to fakes.

use std::sync::Arc;
use std::time::Instant;

use kagent_core::{CrChan, EnvParas, Packet};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{AgentState, CommandHandler, HandlerCtx, Outcome};
use crate::adapters::{FakeClusterApplier, FakeRepoFactory};
use crate::engine::test_helpers::settings;
use crate::supervisor::NamespaceSupervisor;
use crate::syncer::Syncer;

pub(crate) struct Harness {
    pub factory: FakeRepoFactory,
    pub cluster: FakeClusterApplier,
    pub ctx: Arc<HandlerCtx>,
    pub commands: mpsc::Receiver<Packet>,
    pub responses: mpsc::Receiver<Packet>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let (chan, receivers) = CrChan::new(64);
        let factory = FakeRepoFactory::new();
        let cluster = FakeClusterApplier::new();
        let syncer = Syncer::new(Arc::new(cluster.clone()));
        let shutdown = CancellationToken::new();
        let supervisor = Arc::new(NamespaceSupervisor::new(
            Arc::new(factory.clone()),
            syncer.clone(),
            chan.responses().clone(),
            settings(),
            shutdown.clone(),
        ));
        let ctx = Arc::new(HandlerCtx {
            agent: AgentState::new(),
            supervisor,
            syncer,
            chan,
            cluster_id: "test-cluster".to_string(),
            started_at: Instant::now(),
            shutdown,
        });
        Self {
            factory,
            cluster,
            ctx,
            commands: receivers.commands,
            responses: receivers.responses,
        }
    }

    pub(crate) async fn handle(&self, handler: &dyn CommandHandler, packet: Packet) -> Outcome {
        handler.handle(&self.ctx, packet).await
    }

    pub(crate) async fn shutdown(&self) {
        self.ctx.shutdown.cancel();
        self.ctx.supervisor.shutdown().await;
    }
}

pub(crate) fn env(namespace: &str) -> EnvParas {
    EnvParas {
        namespace: namespace.to_string(),
        env_id: 1,
        git_rsa_key: String::new(),
        git_url: format!("git@host:{}.git", namespace),
        releases: vec![],
    }
}

pub(crate) fn command<T: Serialize>(key: &str, packet_type: &str, payload: &T) -> Packet {
    Packet::with_json(key, packet_type, payload).unwrap()
}

/// The single response in `outcome`.
pub(crate) fn response(outcome: &Outcome) -> &Packet {
    outcome.response.as_ref().expect("handler produced no response")
}
