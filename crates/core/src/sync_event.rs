// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit record emitted after every reconciliation pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::ResourceId;

/// Event kind for a completed reconciliation pass.
pub const SYNC_EVENT_TYPE: &str = "sync";

/// Outcome of one reconciliation pass, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(rename = "resourceIDs")]
    pub resource_ids: Vec<ResourceId>,
    pub metadata: SyncEventMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEventMetadata {
    /// Commit the pass reconciled towards.
    pub commit: String,
    pub errors: Vec<SyncResourceError>,
    pub file_commits: Vec<FileCommit>,
    pub resource_commits: Vec<ResourceCommit>,
}

/// Failure attributed to one resource (or one manifest file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResourceError {
    /// Empty when the manifest could not be parsed far enough to identify it.
    #[serde(default)]
    pub id: String,
    pub path: String,
    pub commit: String,
    pub error: String,
}

/// Last commit touching a manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCommit {
    pub file: String,
    pub commit: String,
}

/// Commit a resource was applied from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCommit {
    pub resource_id: ResourceId,
    pub file: String,
    pub commit: String,
}

impl SyncEvent {
    pub fn new(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        Self {
            event_type: SYNC_EVENT_TYPE.to_string(),
            started_at,
            ended_at,
            resource_ids: Vec::new(),
            metadata: SyncEventMetadata::default(),
        }
    }
}
