// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::time::Duration;

/// Agent version stamped onto every applied object.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn duration_ms(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn string_or(var: &str, default: &str) -> String {
    std::env::var(var).ok().filter(|s| !s.is_empty()).unwrap_or_else(|| default.to_string())
}

/// Periodic reconciliation interval per namespace (default 5m).
pub fn sync_interval() -> Duration {
    duration_ms("KAGENT_SYNC_INTERVAL_MS", Duration::from_secs(300))
}

/// How often each git mirror polls its remote (default 1m).
pub fn git_poll_interval() -> Duration {
    duration_ms("KAGENT_GIT_POLL_MS", Duration::from_secs(60))
}

/// Deadline applied to every git network operation (default 2m).
pub fn git_timeout() -> Duration {
    duration_ms("KAGENT_GIT_TIMEOUT_MS", Duration::from_secs(120))
}

/// Interval between unsolicited status packets (default 1m).
pub fn status_interval() -> Duration {
    duration_ms("KAGENT_STATUS_INTERVAL_MS", Duration::from_secs(60))
}

/// Capacity of each queue in the command/response channel pair.
pub fn channel_capacity() -> usize {
    std::env::var("KAGENT_CHANNEL_CAPACITY")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1000)
}

/// Responses kept for replay while the transport is disconnected.
pub fn replay_capacity() -> usize {
    std::env::var("KAGENT_REPLAY_CAPACITY")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1000)
}

/// Tag the control plane moves to publish desired state.
pub fn marker_tag() -> String {
    string_or("KAGENT_MARKER_TAG", "kagent-desired")
}

/// Tag the agent moves after a completed reconciliation.
pub fn progress_tag() -> String {
    string_or("KAGENT_PROGRESS_TAG", "kagent-applied")
}

/// Directory inside each repository holding manifests.
pub fn manifest_root() -> String {
    string_or("KAGENT_MANIFEST_ROOT", ".")
}

/// Log filter directive (default `info`).
pub fn log_filter() -> String {
    string_or("KAGENT_LOG", "info")
}
