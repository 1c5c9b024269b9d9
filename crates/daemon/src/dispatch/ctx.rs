// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Instant;

use kagent_core::CrChan;
use tokio_util::sync::CancellationToken;

use super::agent::AgentState;
use crate::supervisor::NamespaceSupervisor;
use crate::syncer::Syncer;

/// Collaborators shared by every command handler.
pub struct HandlerCtx {
    pub agent: AgentState,
    pub supervisor: Arc<NamespaceSupervisor>,
    pub syncer: Syncer,
    pub chan: CrChan,
    pub cluster_id: String,
    pub started_at: Instant,
    /// Process-wide stop signal.
    pub shutdown: CancellationToken,
}
