// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker dispatch loop.
//!
//! The loop reads packets off the command queue and runs each registered
//! handler in its own task on a [`TaskTracker`], so handlers for different
//! commands run concurrently and shutdown can wait for all of them. Follow-up
//! commands go back onto the command queue and responses onto the response
//! queue. A handler panic is caught at the task boundary and answered with a
//! failure packet.

mod agent;
mod ctx;
mod env;
mod registry;
mod resource;
mod status;
mod sync;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use agent::{AgentInitHandler, AgentState, InitGuard};
pub use ctx::HandlerCtx;
pub use env::{EnvCreateHandler, EnvDeleteHandler};
pub use registry::{CommandHandler, CommandRegistry, Outcome};
pub use resource::ResourceDeleteHandler;
pub use status::{status_packet, NamespaceStatus, StatusHandler, StatusReport};
pub use sync::SyncHandler;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use kagent_core::Packet;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use registry::failure;

/// Routes inbound commands to their handlers.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    ctx: Arc<HandlerCtx>,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(registry: CommandRegistry, ctx: Arc<HandlerCtx>, tracker: TaskTracker) -> Self {
        Self { registry: Arc::new(registry), ctx, tracker }
    }

    /// Dispatch until the stop signal fires or the command queue closes.
    pub async fn run(self, mut commands: mpsc::Receiver<Packet>) {
        let shutdown = self.ctx.shutdown.clone();
        info!(commands = ?self.registry.tags(), "dispatch loop started");
        loop {
            let packet = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                packet = commands.recv() => match packet {
                    Some(packet) => packet,
                    None => break,
                },
            };
            self.dispatch(packet);
        }
        info!(in_flight = self.tracker.len(), "dispatch loop stopped");
    }

    fn dispatch(&self, packet: Packet) {
        if packet.packet_type.is_empty() {
            warn!(key = %packet.key, "packet without a type, discarding");
            return;
        }
        let Some(handler) = self.registry.get(&packet.packet_type) else {
            warn!(key = %packet.key, packet_type = %packet.packet_type, "no handler registered");
            return;
        };
        debug!(key = %packet.key, packet_type = %packet.packet_type, "dispatching");
        self.tracker.spawn(run_handler(handler, Arc::clone(&self.ctx), packet));
    }
}

async fn run_handler(handler: Arc<dyn CommandHandler>, ctx: Arc<HandlerCtx>, packet: Packet) {
    let origin = Packet::new(packet.key.clone(), packet.packet_type.clone(), String::new());

    let outcome = match AssertUnwindSafe(handler.handle(&ctx, packet)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(key = %origin.key, packet_type = %origin.packet_type, "handler panicked");
            Outcome::respond(failure(&origin, "internal error while handling command"))
        }
    };

    for follow_up in outcome.follow_ups {
        forward(&ctx, ctx.chan.commands(), follow_up, "command").await;
    }
    if let Some(response) = outcome.response {
        forward(&ctx, ctx.chan.responses(), response, "response").await;
    }
}

/// Enqueue `packet`, giving up once shutdown begins.
async fn forward(ctx: &HandlerCtx, queue: &mpsc::Sender<Packet>, packet: Packet, what: &str) {
    let key = packet.key.clone();
    let packet_type = packet.packet_type.clone();
    tokio::select! {
        biased;
        sent = queue.send(packet) => {
            if sent.is_err() {
                warn!(%key, %packet_type, queue = what, "queue closed, dropping packet");
            }
        }
        _ = ctx.shutdown.cancelled() => {
            warn!(%key, %packet_type, queue = what, "shutting down, dropping packet");
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
