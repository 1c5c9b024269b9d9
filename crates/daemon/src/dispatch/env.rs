// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `env_create` and `env_delete`.

use async_trait::async_trait;
use kagent_core::command::{ENV_CREATE_SUCCEEDED, ENV_DELETE_SUCCEEDED, GIT_OPS_SYNC};
use kagent_core::{env_key, EnvDeletePayload, EnvParas, Packet};
use serde::Serialize;
use tracing::{info, warn};

use super::ctx::HandlerCtx;
use super::registry::{failure, reply_json, CommandHandler, Outcome};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvAck<'a> {
    namespace: &'a str,
    env_id: i64,
}

/// Starts managing one environment and chains a prompt first sync.
///
/// Creating an environment that is already managed with identical
/// parameters succeeds without restarting it. Different parameters replace
/// the running namespace.
pub struct EnvCreateHandler;

#[async_trait]
impl CommandHandler for EnvCreateHandler {
    async fn handle(&self, ctx: &HandlerCtx, packet: Packet) -> Outcome {
        let env: EnvParas = match packet.decode() {
            Ok(env) => env,
            Err(e) => return Outcome::respond(failure(&packet, e)),
        };
        let namespace = env.namespace.clone();
        let ack = EnvAck { namespace: &namespace, env_id: env.env_id };

        if let Some(current) = ctx.supervisor.get(&namespace) {
            if current.env == env {
                ctx.agent.upsert_env(env);
                return Outcome::respond(reply_json(&packet, ENV_CREATE_SUCCEEDED, &ack));
            }
            info!(%namespace, "environment changed, restarting namespace");
            if let Err(e) = ctx.supervisor.remove(&namespace).await {
                warn!(%namespace, error = %e, "removing previous environment");
            }
        }

        if let Err(e) = ctx.supervisor.add(env.clone()) {
            warn!(%namespace, key = %packet.key, error = %e, "env create failed");
            return Outcome::respond(failure(&packet, e));
        }
        ctx.agent.upsert_env(env);

        Outcome::respond(reply_json(&packet, ENV_CREATE_SUCCEEDED, &ack))
            .with_follow_up(Packet::new(env_key(&namespace), GIT_OPS_SYNC, ""))
    }
}

/// Stops managing one environment, waiting for its tasks to exit.
pub struct EnvDeleteHandler;

#[async_trait]
impl CommandHandler for EnvDeleteHandler {
    async fn handle(&self, ctx: &HandlerCtx, packet: Packet) -> Outcome {
        let payload: EnvDeletePayload = match packet.decode() {
            Ok(payload) => payload,
            Err(e) => return Outcome::respond(failure(&packet, e)),
        };
        let namespace = match payload.namespace.as_str() {
            "" => packet.namespace().to_string(),
            namespace => namespace.to_string(),
        };

        match ctx.supervisor.remove(&namespace).await {
            Ok(env) => {
                ctx.agent.remove_env(&namespace);
                let ack = EnvAck { namespace: &namespace, env_id: env.env_id };
                Outcome::respond(reply_json(&packet, ENV_DELETE_SUCCEEDED, &ack))
            }
            Err(e) => {
                warn!(%namespace, key = %packet.key, error = %e, "env delete failed");
                Outcome::respond(failure(&packet, e))
            }
        }
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
