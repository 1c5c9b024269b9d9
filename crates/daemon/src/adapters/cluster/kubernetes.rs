// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster applier backed by the Kubernetes API via `kube-rs`.
//!
//! Objects are applied with server-side apply under a fixed field manager and
//! deleted with background propagation. Kinds are resolved through API
//! discovery so any installed CRD can be synced.

use async_trait::async_trait;
use kagent_core::{ObjectIdentity, Resource};
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams};
use kube::core::GroupVersionKind;
use kube::discovery::{self, verbs, ApiCapabilities, ApiResource, Discovery, Scope};
use kube::Client;
use serde_yaml::Value;
use tracing::{debug, warn};

use super::{
    Change, ChangeAction, ClusterApplier, ClusterError, ResourceFailure, SyncErrors, MANAGED_LABEL,
    RESOURCE_ID_ANNOTATION,
};

/// Field manager used for server-side apply.
const FIELD_MANAGER: &str = "kagent";

/// Applier talking to the cluster the daemon runs in.
#[derive(Clone)]
pub struct KubeApplier {
    client: Client,
}

impl KubeApplier {
    /// Connect using in-cluster config or the local kubeconfig.
    pub async fn new() -> Result<Self, ClusterError> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn api_for(
        &self,
        identity: &ObjectIdentity,
        namespace: &str,
    ) -> Result<Api<DynamicObject>, ClusterError> {
        let gvk = gvk_of(identity)?;
        let (resource, caps) = discovery::pinned_kind(&self.client, &gvk).await?;
        Ok(self.scoped_api(&resource, &caps, identity.namespace.as_deref().unwrap_or(namespace)))
    }

    fn scoped_api(
        &self,
        resource: &ApiResource,
        caps: &ApiCapabilities,
        namespace: &str,
    ) -> Api<DynamicObject> {
        match caps.scope {
            Scope::Cluster => Api::all_with(self.client.clone(), resource),
            Scope::Namespaced => Api::namespaced_with(self.client.clone(), namespace, resource),
        }
    }

    async fn apply_one(&self, namespace: &str, change: &Change) -> Result<(), ClusterError> {
        let api = self.api_for(&change.identity, namespace).await?;
        let name = &change.identity.name;
        match change.action {
            ChangeAction::Apply => {
                let object = decode_object(&change.resource.bytes)?;
                let params = PatchParams::apply(FIELD_MANAGER).force();
                api.patch(name, &params, &Patch::Apply(&object)).await?;
                debug!(id = %change.resource.id, "applied");
            }
            ChangeAction::Delete => match api.delete(name, &DeleteParams::background()).await {
                Ok(_) => debug!(id = %change.resource.id, "deleted"),
                Err(kube::Error::Api(resp)) if resp.code == 404 => {
                    debug!(id = %change.resource.id, "already gone");
                }
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterApplier for KubeApplier {
    async fn apply(&self, namespace: &str, changes: &[Change]) -> Result<(), SyncErrors> {
        let mut failures = Vec::new();
        for change in changes {
            if let Err(e) = self.apply_one(namespace, change).await {
                warn!(%namespace, id = %change.resource.id, error = %e, "object sync failed");
                let resource = change.resource.clone();
                failures.push(ResourceFailure { resource, error: e.to_string() });
            }
        }
        SyncErrors(failures).into_result()
    }

    async fn export(&self, namespace: &str) -> Result<Vec<Resource>, ClusterError> {
        let discovery = Discovery::new(self.client.clone()).run().await?;
        let params = ListParams::default().labels(&format!("{}=true", MANAGED_LABEL));
        let mut exported = Vec::new();

        for group in discovery.groups() {
            for (resource, caps) in group.recommended_resources() {
                let namespaced = matches!(caps.scope, Scope::Namespaced);
                if !namespaced || !caps.supports_operation(verbs::LIST) {
                    continue;
                }
                let api: Api<DynamicObject> =
                    Api::namespaced_with(self.client.clone(), namespace, &resource);
                let list = match api.list(&params).await {
                    Ok(list) => list,
                    Err(e) => {
                        debug!(%namespace, kind = %resource.kind, error = %e, "skipping kind");
                        continue;
                    }
                };
                for object in list.items {
                    match live_resource(&resource, &object, namespace) {
                        Ok(Some(r)) => exported.push(r),
                        Ok(None) => {}
                        Err(e) => {
                            warn!(%namespace, kind = %resource.kind, error = %e, "skipping object")
                        }
                    }
                }
            }
        }
        Ok(exported)
    }
}

/// Split `apiVersion` into group and version (`v1` has an empty group).
fn gvk_of(identity: &ObjectIdentity) -> Result<GroupVersionKind, ClusterError> {
    let (group, version) = match identity.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", identity.api_version.as_str()),
    };
    if version.is_empty() {
        return Err(ClusterError::InvalidApiVersion(identity.api_version.clone()));
    }
    Ok(GroupVersionKind::gvk(group, version, &identity.kind))
}

fn decode_object(bytes: &[u8]) -> Result<DynamicObject, ClusterError> {
    let value: Value =
        serde_yaml::from_slice(bytes).map_err(|e| ClusterError::Decode(e.to_string()))?;
    let json = serde_json::to_value(&value).map_err(|e| ClusterError::Decode(e.to_string()))?;
    serde_json::from_value(json).map_err(|e| ClusterError::Decode(e.to_string()))
}

/// Convert a listed object into a [`Resource`]. List items omit their type
/// meta, so it is restored from the discovered resource.
///
/// Objects owned by another object, or lacking this agent's id annotation,
/// are `None`: they carry the managed label only because a controller copied
/// it from their owner.
fn live_resource(
    resource: &ApiResource,
    object: &DynamicObject,
    namespace: &str,
) -> Result<Option<Resource>, ClusterError> {
    let meta = &object.metadata;
    if meta.owner_references.as_ref().is_some_and(|owners| !owners.is_empty()) {
        return Ok(None);
    }
    let Some(annotated) = meta.annotations.as_ref().and_then(|a| a.get(RESOURCE_ID_ANNOTATION))
    else {
        return Ok(None);
    };

    let mut value = serde_yaml::to_value(object).map_err(|e| ClusterError::Decode(e.to_string()))?;
    if let Some(map) = value.as_mapping_mut() {
        map.insert(Value::from("apiVersion"), Value::from(resource.api_version.as_str()));
        map.insert(Value::from("kind"), Value::from(resource.kind.as_str()));
    }
    let live = Resource::from_value("cluster", value, namespace)
        .map_err(|e| ClusterError::Decode(e.to_string()))?;
    if live.id.as_str() != annotated.as_str() {
        debug!(id = %live.id, %annotated, "resource id annotation does not match, skipping");
        return Ok(None);
    }
    Ok(Some(live))
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod tests;
