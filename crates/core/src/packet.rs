// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The message envelope exchanged with the control plane.
//!
//! A [`Packet`] is immutable once built. Ownership moves with it through the
//! channel pair: whoever receives it from a queue is its only reader.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key prefix used for namespace-scoped unsolicited events.
pub const ENV_KEY_PREFIX: &str = "env:";

/// Errors decoding or encoding packet payloads.
#[derive(Debug, Error)]
pub enum PacketError {
    #[error("invalid {packet_type} payload: {source}")]
    InvalidPayload {
        packet_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Canonical command/response envelope.
///
/// `packet_type` selects the handler on the way in and describes the outcome
/// on the way out. `payload` is opaque to the envelope; by convention it holds
/// a JSON document whose shape depends on the type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    #[serde(default)]
    pub key: String,
    #[serde(rename = "type")]
    pub packet_type: String,
    #[serde(default)]
    pub payload: String,
}

impl Packet {
    pub fn new(
        key: impl Into<String>,
        packet_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self { key: key.into(), packet_type: packet_type.into(), payload: payload.into() }
    }

    /// Build a packet whose payload is the JSON encoding of `value`.
    pub fn with_json<T: Serialize>(
        key: impl Into<String>,
        packet_type: impl Into<String>,
        value: &T,
    ) -> Result<Self, PacketError> {
        let payload = serde_json::to_string(value).map_err(PacketError::Encode)?;
        Ok(Self::new(key, packet_type, payload))
    }

    /// Reply to this packet, echoing its key for correlation.
    pub fn reply(&self, packet_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(self.key.clone(), packet_type, payload)
    }

    /// Failure reply carrying an opaque error string.
    pub fn failure(&self, packet_type: impl Into<String>, error: impl ToString) -> Self {
        self.reply(packet_type, error.to_string())
    }

    /// Decode the payload as JSON.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PacketError> {
        serde_json::from_str(&self.payload).map_err(|source| PacketError::InvalidPayload {
            packet_type: self.packet_type.clone(),
            source,
        })
    }

    /// Namespace encoded in this packet's key, or `""` when unscoped.
    pub fn namespace(&self) -> &str {
        extract_namespace(&self.key)
    }
}

/// Key for an unsolicited event scoped to `namespace`.
pub fn env_key(namespace: &str) -> String {
    format!("{}{}", ENV_KEY_PREFIX, namespace)
}

/// Extract the namespace from a composite packet key.
///
/// Keys are `.`-separated tokens. The first token containing `env` that also
/// carries a `:` yields the segment right after its first `:`, e.g.
/// `cluster:3.env:team-a.release:web` yields `team-a`. Keys without such a
/// token yield `""`, which callers treat as "not namespace scoped".
pub fn extract_namespace(key: &str) -> &str {
    key.split('.')
        .filter(|token| token.contains("env"))
        .find_map(|token| token.split(':').nth(1))
        .unwrap_or("")
}

#[cfg(test)]
#[path = "packet_tests.rs"]
mod tests;
