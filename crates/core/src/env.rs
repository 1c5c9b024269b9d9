// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment bindings and command payloads.

use serde::{Deserialize, Serialize};

/// Binding between a managed namespace and the git repository holding its
/// desired state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvParas {
    pub namespace: String,
    #[serde(default)]
    pub env_id: i64,
    /// Private key used for git over ssh. Empty for anonymous remotes.
    #[serde(default)]
    pub git_rsa_key: String,
    pub git_url: String,
    #[serde(default)]
    pub releases: Vec<String>,
}

/// Payload of `agent_init`: the complete environment set to manage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInitPayload {
    #[serde(default)]
    pub envs: Vec<EnvParas>,
}

/// Payload of `env_delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvDeletePayload {
    pub namespace: String,
}

/// Payload of `resource_delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDeletePayload {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// Falls back to the namespace in the packet key when absent.
    #[serde(default)]
    pub namespace: Option<String>,
}
