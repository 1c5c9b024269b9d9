// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent coordinator state and the `agent_init` command.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use kagent_core::command::{AGENT_INIT_SUCCEEDED, ENV_CREATE};
use kagent_core::{env_key, AgentInitPayload, EnvParas, Packet};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use super::ctx::HandlerCtx;
use super::registry::{failure, reply_json, CommandHandler, Outcome};

/// Process-wide agent state owned by the dispatch context.
#[derive(Debug, Default)]
pub struct AgentState {
    initialized: AtomicBool,
    initializing: AtomicBool,
    envs: Mutex<Vec<EnvParas>>,
}

/// Held while an `agent_init` runs. Releases the guard on drop.
pub struct InitGuard<'a> {
    state: &'a AgentState,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        self.state.initializing.store(false, Ordering::Release);
    }
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the init guard, or `None` when another init holds it.
    pub fn try_begin_init(&self) -> Option<InitGuard<'_>> {
        self.initializing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InitGuard { state: self })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Known environments in the order they were first recorded.
    pub fn envs(&self) -> Vec<EnvParas> {
        self.envs.lock().clone()
    }

    pub fn env(&self, namespace: &str) -> Option<EnvParas> {
        self.envs.lock().iter().find(|e| e.namespace == namespace).cloned()
    }

    /// Record `env`, replacing an entry for the same namespace in place.
    pub fn upsert_env(&self, env: EnvParas) {
        let mut envs = self.envs.lock();
        match envs.iter_mut().find(|e| e.namespace == env.namespace) {
            Some(existing) => *existing = env,
            None => envs.push(env),
        }
    }

    pub fn remove_env(&self, namespace: &str) -> Option<EnvParas> {
        let mut envs = self.envs.lock();
        let index = envs.iter().position(|e| e.namespace == namespace)?;
        Some(envs.remove(index))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitSummary {
    namespaces: Vec<String>,
    removed: Vec<String>,
    created: Vec<String>,
}

/// Replaces the managed environment set.
///
/// Namespaces no longer listed are removed here. Envs that differ from the
/// recorded set are chained as `env_create` commands.
pub struct AgentInitHandler;

#[async_trait]
impl CommandHandler for AgentInitHandler {
    async fn handle(&self, ctx: &HandlerCtx, packet: Packet) -> Outcome {
        let payload: AgentInitPayload = match packet.decode() {
            Ok(payload) => payload,
            Err(e) => return Outcome::respond(failure(&packet, e)),
        };
        if let Err(reason) = validate(&payload.envs) {
            warn!(key = %packet.key, %reason, "rejecting agent init");
            return Outcome::respond(failure(&packet, reason));
        }
        let Some(_guard) = ctx.agent.try_begin_init() else {
            warn!(key = %packet.key, "agent init already in progress");
            return Outcome::respond(failure(&packet, "agent initialization already in progress"));
        };

        let wanted: BTreeSet<&str> = payload.envs.iter().map(|e| e.namespace.as_str()).collect();
        let mut removed = Vec::new();
        for namespace in known_namespaces(ctx) {
            if wanted.contains(namespace.as_str()) {
                continue;
            }
            if let Err(e) = ctx.supervisor.remove(&namespace).await {
                warn!(%namespace, error = %e, "removing unlisted namespace");
            }
            ctx.agent.remove_env(&namespace);
            removed.push(namespace);
        }

        let mut follow_ups = Vec::new();
        let mut created = Vec::new();
        for env in &payload.envs {
            if ctx.agent.env(&env.namespace).as_ref() == Some(env) {
                continue;
            }
            match Packet::with_json(env_key(&env.namespace), ENV_CREATE, env) {
                Ok(command) => {
                    follow_ups.push(command);
                    created.push(env.namespace.clone());
                }
                Err(e) => return Outcome::respond(failure(&packet, e)),
            }
        }

        ctx.agent.mark_initialized();
        info!(
            key = %packet.key,
            envs = payload.envs.len(),
            removed = removed.len(),
            created = created.len(),
            "agent initialized"
        );

        let summary = InitSummary {
            namespaces: payload.envs.iter().map(|e| e.namespace.clone()).collect(),
            removed,
            created,
        };
        let mut outcome = Outcome::respond(reply_json(&packet, AGENT_INIT_SUCCEEDED, &summary));
        outcome.follow_ups = follow_ups;
        outcome
    }
}

/// Recorded environments in order, then any supervised namespace the record
/// is missing.
fn known_namespaces(ctx: &HandlerCtx) -> Vec<String> {
    let mut namespaces: Vec<String> = ctx.agent.envs().into_iter().map(|e| e.namespace).collect();
    for namespace in ctx.supervisor.namespaces() {
        if !namespaces.contains(&namespace) {
            namespaces.push(namespace);
        }
    }
    namespaces
}

fn validate(envs: &[EnvParas]) -> Result<(), String> {
    let mut seen = BTreeSet::new();
    for env in envs {
        if env.namespace.is_empty() {
            return Err("environment has no namespace".to_string());
        }
        if env.git_url.is_empty() {
            return Err(format!("environment {} has no git url", env.namespace));
        }
        if !seen.insert(env.namespace.as_str()) {
            return Err(format!("namespace {} listed twice", env.namespace));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
