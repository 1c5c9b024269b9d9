// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use kagent_core::Packet;
use tracing::{debug, warn};

use super::ctx::HandlerCtx;
use super::registry::{failure, CommandHandler, Outcome};

/// `git_ops_sync`: ask the namespace in the packet key to reconcile soon.
/// Silent on success.
pub struct SyncHandler;

#[async_trait]
impl CommandHandler for SyncHandler {
    async fn handle(&self, ctx: &HandlerCtx, packet: Packet) -> Outcome {
        let namespace = packet.namespace();
        if namespace.is_empty() {
            warn!(key = %packet.key, "sync request without a namespace");
            return Outcome::respond(failure(&packet, "packet key names no namespace"));
        }
        match ctx.supervisor.sync_soon(namespace) {
            Ok(()) => {
                debug!(%namespace, "sync requested");
                Outcome::none()
            }
            Err(e) => {
                warn!(%namespace, error = %e, "sync request rejected");
                Outcome::respond(failure(&packet, e))
            }
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
