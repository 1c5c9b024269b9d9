// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent status: answered to `status_report` and published periodically.

use async_trait::async_trait;
use kagent_core::command::{AGENT_STATUS, STATUS_KEY};
use kagent_core::{Packet, PacketError};
use serde::{Deserialize, Serialize};

use super::ctx::HandlerCtx;
use super::registry::{reply_json, CommandHandler, Outcome};
use crate::engine::SyncStatsSnapshot;
use crate::env::AGENT_VERSION;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub agent_version: String,
    pub cluster_id: String,
    pub initialized: bool,
    pub uptime_secs: u64,
    pub command_queue: usize,
    pub response_queue: usize,
    pub namespaces: Vec<NamespaceStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStatus {
    pub namespace: String,
    pub env_id: i64,
    pub git_url: String,
    #[serde(flatten)]
    pub stats: SyncStatsSnapshot,
}

impl StatusReport {
    pub fn collect(ctx: &HandlerCtx) -> Self {
        let (command_queue, response_queue) = ctx.chan.current_queue_size();
        let namespaces = ctx
            .agent
            .envs()
            .into_iter()
            .map(|env| NamespaceStatus {
                stats: ctx.supervisor.get(&env.namespace).map(|h| h.stats()).unwrap_or_default(),
                namespace: env.namespace,
                env_id: env.env_id,
                git_url: env.git_url,
            })
            .collect();
        Self {
            agent_version: AGENT_VERSION.to_string(),
            cluster_id: ctx.cluster_id.clone(),
            initialized: ctx.agent.is_initialized(),
            uptime_secs: ctx.started_at.elapsed().as_secs(),
            command_queue,
            response_queue,
            namespaces,
        }
    }
}

/// Unsolicited status packet under the process-wide key.
pub fn status_packet(ctx: &HandlerCtx) -> Result<Packet, PacketError> {
    Packet::with_json(STATUS_KEY, AGENT_STATUS, &StatusReport::collect(ctx))
}

pub struct StatusHandler;

#[async_trait]
impl CommandHandler for StatusHandler {
    async fn handle(&self, ctx: &HandlerCtx, packet: Packet) -> Outcome {
        let report = StatusReport::collect(ctx);
        Outcome::respond(reply_json(&packet, AGENT_STATUS, &report))
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
