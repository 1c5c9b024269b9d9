// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command tag to handler table.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use kagent_core::command::{
    failure_type, AGENT_INIT, ENV_CREATE, ENV_DELETE, GIT_OPS_SYNC, RESOURCE_DELETE,
    STATUS_REPORT,
};
use kagent_core::Packet;
use serde::Serialize;

use super::agent::AgentInitHandler;
use super::ctx::HandlerCtx;
use super::env::{EnvCreateHandler, EnvDeleteHandler};
use super::resource::ResourceDeleteHandler;
use super::status::StatusHandler;
use super::sync::SyncHandler;

/// What a handler produced: commands to chain and an optional response.
#[derive(Debug, Default)]
pub struct Outcome {
    pub follow_ups: Vec<Packet>,
    pub response: Option<Packet>,
}

impl Outcome {
    /// Nothing to send.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn respond(response: Packet) -> Self {
        Self { follow_ups: Vec::new(), response: Some(response) }
    }

    pub fn with_follow_up(mut self, packet: Packet) -> Self {
        self.follow_ups.push(packet);
        self
    }
}

/// Handler for one command family.
///
/// Handlers never fail: errors become failure packets in the [`Outcome`].
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: &HandlerCtx, packet: Packet) -> Outcome;
}

/// Read-only after startup; shared between dispatch tasks.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in command.
    pub fn standard() -> Self {
        let table: [(&'static str, Arc<dyn CommandHandler>); 6] = [
            (AGENT_INIT, Arc::new(AgentInitHandler)),
            (ENV_CREATE, Arc::new(EnvCreateHandler)),
            (ENV_DELETE, Arc::new(EnvDeleteHandler)),
            (GIT_OPS_SYNC, Arc::new(SyncHandler)),
            (RESOURCE_DELETE, Arc::new(ResourceDeleteHandler)),
            (STATUS_REPORT, Arc::new(StatusHandler)),
        ];
        let mut registry = Self::new();
        for (tag, handler) in table {
            registry.register(tag, handler);
        }
        registry
    }

    /// Register `handler` for `tag`, replacing any previous handler.
    pub fn register(&mut self, tag: &'static str, handler: Arc<dyn CommandHandler>) -> &mut Self {
        self.handlers.insert(tag, handler);
        self
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(tag).cloned()
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

/// Failure answer to `packet`, keyed for correlation.
///
/// Commands without a failure tag of their own answer `<type>_failed`.
pub(crate) fn failure(packet: &Packet, error: impl Display) -> Packet {
    match failure_type(&packet.packet_type) {
        Some(tag) => packet.failure(tag, error),
        None => packet.failure(format!("{}_failed", packet.packet_type), error),
    }
}

/// Answer `packet` with `packet_type` and a JSON payload.
pub(crate) fn reply_json<T: Serialize>(packet: &Packet, packet_type: &str, value: &T) -> Packet {
    match serde_json::to_string(value) {
        Ok(payload) => packet.reply(packet_type, payload),
        Err(e) => failure(packet, e),
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
