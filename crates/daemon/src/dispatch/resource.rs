// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `resource_delete`: remove one live object through the syncer.

use async_trait::async_trait;
use kagent_core::command::RESOURCE_DELETE_SUCCEEDED;
use kagent_core::{Packet, Resource, ResourceDeletePayload, ResourceError, SyncDef};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

use super::ctx::HandlerCtx;
use super::registry::{failure, reply_json, CommandHandler, Outcome};
use crate::adapters::SyncErrors;

/// Source recorded on resources built from a command rather than a file.
const COMMAND_SOURCE: &str = "command";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteAck<'a> {
    resource_id: &'a str,
}

pub struct ResourceDeleteHandler;

#[async_trait]
impl CommandHandler for ResourceDeleteHandler {
    async fn handle(&self, ctx: &HandlerCtx, packet: Packet) -> Outcome {
        let payload: ResourceDeletePayload = match packet.decode() {
            Ok(payload) => payload,
            Err(e) => return Outcome::respond(failure(&packet, e)),
        };
        let namespace = payload
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| packet.namespace().to_string());
        if namespace.is_empty() {
            return Outcome::respond(failure(&packet, "no namespace for resource"));
        }
        if ctx.supervisor.get(&namespace).is_none() {
            return Outcome::respond(failure(
                &packet,
                format!("namespace {} is not managed", namespace),
            ));
        }

        let resource = match target(&payload, &namespace) {
            Ok(resource) => resource,
            Err(e) => return Outcome::respond(failure(&packet, e)),
        };
        let id = resource.id.clone();
        match ctx.syncer.sync(&namespace, SyncDef::new(Vec::new(), vec![resource])).await {
            Ok(()) => {
                info!(%namespace, %id, "resource deleted on request");
                let ack = DeleteAck { resource_id: id.as_str() };
                Outcome::respond(reply_json(&packet, RESOURCE_DELETE_SUCCEEDED, &ack))
            }
            Err(errors) => {
                warn!(%namespace, %id, error = %errors, "resource delete failed");
                Outcome::respond(failure(&packet, describe(&errors)))
            }
        }
    }
}

/// Minimal object naming the resource to delete.
fn target(payload: &ResourceDeletePayload, namespace: &str) -> Result<Resource, ResourceError> {
    let mut metadata = Mapping::new();
    metadata.insert(Value::from("name"), Value::from(payload.name.as_str()));
    metadata.insert(Value::from("namespace"), Value::from(namespace));

    let mut object = Mapping::new();
    object.insert(Value::from("apiVersion"), Value::from(payload.api_version.as_str()));
    object.insert(Value::from("kind"), Value::from(payload.kind.as_str()));
    object.insert(Value::from("metadata"), Value::Mapping(metadata));
    Resource::from_value(COMMAND_SOURCE, Value::Mapping(object), namespace)
}

fn describe(errors: &SyncErrors) -> String {
    errors
        .failures()
        .iter()
        .map(|f| format!("{}: {}", f.resource.id, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
