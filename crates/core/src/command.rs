// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packet type vocabulary.
//!
//! Inbound command tags select a handler; each command family answers with
//! one tag from a fixed success/failure pair.

/// Replace the managed environment set.
pub const AGENT_INIT: &str = "agent_init";
pub const AGENT_INIT_SUCCEEDED: &str = "agent_init_succeeded";
pub const AGENT_INIT_FAILED: &str = "agent_init_failed";

/// Start managing one environment.
pub const ENV_CREATE: &str = "env_create";
pub const ENV_CREATE_SUCCEEDED: &str = "env_create_succeeded";
pub const ENV_CREATE_FAILED: &str = "env_create_failed";

/// Stop managing one environment.
pub const ENV_DELETE: &str = "env_delete";
pub const ENV_DELETE_SUCCEEDED: &str = "env_delete_succeeded";
pub const ENV_DELETE_FAILED: &str = "env_delete_failed";

/// Ask a namespace to reconcile soon. Silent on success.
pub const GIT_OPS_SYNC: &str = "git_ops_sync";
pub const GIT_OPS_SYNC_FAILED: &str = "git_ops_sync_failed";

/// Delete one live object from a managed namespace.
pub const RESOURCE_DELETE: &str = "resource_delete";
pub const RESOURCE_DELETE_SUCCEEDED: &str = "resource_delete_succeeded";
pub const RESOURCE_DELETE_FAILED: &str = "resource_delete_failed";

/// Report queue sizes and per-namespace sync statistics.
pub const STATUS_REPORT: &str = "status_report";

// Unsolicited events

/// Emitted once per reconciliation pass.
pub const GIT_OPS_SYNC_EVENT: &str = "git_ops_sync_event";
/// Answer to `status_report`, also emitted periodically.
pub const AGENT_STATUS: &str = "agent_status";

/// Key used for process-wide unsolicited events.
pub const STATUS_KEY: &str = "agent:status";

/// Failure tag answering `command`, if the command family defines one.
pub fn failure_type(command: &str) -> Option<&'static str> {
    match command {
        AGENT_INIT => Some(AGENT_INIT_FAILED),
        ENV_CREATE => Some(ENV_CREATE_FAILED),
        ENV_DELETE => Some(ENV_DELETE_FAILED),
        GIT_OPS_SYNC => Some(GIT_OPS_SYNC_FAILED),
        RESOURCE_DELETE => Some(RESOURCE_DELETE_FAILED),
        _ => None,
    }
}
