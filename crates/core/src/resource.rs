// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manifest units and the sync batch built from them.
//!
//! A [`Resource`] is identified by its [`ResourceId`] (namespace, kind, name).
//! Two resources with the same id are the same managed object regardless of
//! their bytes.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Errors parsing manifest bytes.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("manifest is not a mapping")]
    NotAMapping,

    #[error("manifest is missing {0}")]
    MissingField(&'static str),
}

/// Stable identity of a managed object: `<namespace>:<kind>/<name>`, kind
/// lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(namespace: &str, kind: &str, name: &str) -> Self {
        Self(format!("{}:{}/{}", namespace, kind.to_ascii_lowercase(), name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimal identity needed to route an object to the cluster API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectIdentity {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ObjectIdentity {
    /// Parse the identity out of a single manifest document.
    pub fn parse(bytes: &[u8]) -> Result<Self, ResourceError> {
        let value: Value = serde_yaml::from_slice(bytes)?;
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Result<Self, ResourceError> {
        let map = value.as_mapping().ok_or(ResourceError::NotAMapping)?;
        let api_version =
            str_field(map, "apiVersion").ok_or(ResourceError::MissingField("apiVersion"))?;
        let kind = str_field(map, "kind").ok_or(ResourceError::MissingField("kind"))?;
        let metadata = map
            .get("metadata")
            .and_then(Value::as_mapping)
            .ok_or(ResourceError::MissingField("metadata"))?;
        let name = str_field(metadata, "name").ok_or(ResourceError::MissingField("metadata.name"))?;
        Ok(Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: str_field(metadata, "namespace").map(str::to_string),
        })
    }

    /// Id of this object when it lives in (or defaults to) `namespace`.
    pub fn resource_id(&self, default_namespace: &str) -> ResourceId {
        let ns = self.namespace.as_deref().unwrap_or(default_namespace);
        ResourceId::new(ns, &self.kind, &self.name)
    }
}

/// Metadata extracted from a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub identity: ObjectIdentity,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A parsed manifest unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// File the resource was loaded from, relative to the repository root.
    pub source: String,
    /// Serialized single-object manifest.
    pub bytes: Vec<u8>,
    pub meta: ResourceMeta,
    pub id: ResourceId,
}

impl Resource {
    /// Split a (possibly multi-document) manifest file into resources.
    ///
    /// Empty documents are skipped, `*List` kinds carrying an `items`
    /// sequence are expanded into their items, and objects without a
    /// namespace are placed in `default_namespace`.
    pub fn parse_documents(
        source: &str,
        bytes: &[u8],
        default_namespace: &str,
    ) -> Result<Vec<Resource>, ResourceError> {
        let mut resources = Vec::new();
        for document in serde_yaml::Deserializer::from_slice(bytes) {
            let value = Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            collect(source, value, default_namespace, &mut resources)?;
        }
        Ok(resources)
    }

    /// Build a resource from a single object value.
    pub fn from_value(
        source: &str,
        mut value: Value,
        default_namespace: &str,
    ) -> Result<Resource, ResourceError> {
        let mut identity = ObjectIdentity::from_value(&value)?;
        if identity.namespace.is_none() {
            set_metadata_field(&mut value, "namespace", default_namespace)?;
            identity.namespace = Some(default_namespace.to_string());
        }
        let labels = labels_of(&value);
        let bytes = serde_yaml::to_string(&value)?.into_bytes();
        let id = identity.resource_id(default_namespace);
        let meta = ResourceMeta { identity, labels };
        Ok(Resource { source: source.to_string(), bytes, meta, id })
    }

    /// Copy of this resource with `labels` merged into `metadata.labels`.
    pub fn with_labels(&self, labels: &[(&str, &str)]) -> Result<Resource, ResourceError> {
        self.with_metadata_entries("labels", labels)
    }

    /// Copy of this resource with `annotations` merged into
    /// `metadata.annotations`.
    pub fn with_annotations(
        &self,
        annotations: &[(&str, &str)],
    ) -> Result<Resource, ResourceError> {
        self.with_metadata_entries("annotations", annotations)
    }

    fn with_metadata_entries(
        &self,
        field: &str,
        entries: &[(&str, &str)],
    ) -> Result<Resource, ResourceError> {
        let mut value: Value = serde_yaml::from_slice(&self.bytes)?;
        let metadata = metadata_mut(&mut value)?;
        let entry = metadata
            .entry(Value::from(field))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !entry.is_mapping() {
            *entry = Value::Mapping(Mapping::new());
        }
        if let Value::Mapping(map) = entry {
            for (key, val) in entries {
                map.insert(Value::from(*key), Value::from(*val));
            }
        }
        let mut meta = self.meta.clone();
        meta.labels = labels_of(&value);
        Ok(Resource {
            source: self.source.clone(),
            bytes: serde_yaml::to_string(&value)?.into_bytes(),
            meta,
            id: self.id.clone(),
        })
    }
}

fn collect(
    source: &str,
    value: Value,
    default_namespace: &str,
    out: &mut Vec<Resource>,
) -> Result<(), ResourceError> {
    if let Some(items) = list_items(&value) {
        for item in items.clone() {
            collect(source, item, default_namespace, out)?;
        }
        return Ok(());
    }
    out.push(Resource::from_value(source, value, default_namespace)?);
    Ok(())
}

/// Items of a `*List` wrapper. A `*List` kind without an `items` sequence is
/// an ordinary object such as `IPAllowList`.
fn list_items(value: &Value) -> Option<&Vec<Value>> {
    let map = value.as_mapping()?;
    if !str_field(map, "kind")?.ends_with("List") {
        return None;
    }
    map.get("items").and_then(Value::as_sequence)
}

fn str_field<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn metadata_mut(value: &mut Value) -> Result<&mut Mapping, ResourceError> {
    value
        .as_mapping_mut()
        .ok_or(ResourceError::NotAMapping)?
        .get_mut("metadata")
        .and_then(Value::as_mapping_mut)
        .ok_or(ResourceError::MissingField("metadata"))
}

fn set_metadata_field(value: &mut Value, key: &str, val: &str) -> Result<(), ResourceError> {
    metadata_mut(value)?.insert(Value::from(key), Value::from(val));
    Ok(())
}

fn labels_of(value: &Value) -> BTreeMap<String, String> {
    value
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .and_then(Value::as_mapping)
        .map(|labels| {
            labels
                .iter()
                .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// One step of a sync batch. Exactly one of apply or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Apply(Resource),
    Delete(Resource),
}

impl SyncAction {
    pub fn resource(&self) -> &Resource {
        match self {
            SyncAction::Apply(r) | SyncAction::Delete(r) => r,
        }
    }
}

/// Single-use batch of actions produced by diffing and consumed by the
/// syncer. No resource id appears in both an apply and a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDef {
    actions: Vec<SyncAction>,
}

impl SyncDef {
    /// Build a batch from applies and deletes. A delete whose id is also
    /// being applied is dropped.
    pub fn new(applies: Vec<Resource>, deletes: Vec<Resource>) -> Self {
        let applied: HashSet<ResourceId> = applies.iter().map(|r| r.id.clone()).collect();
        let mut actions: Vec<SyncAction> = applies.into_iter().map(SyncAction::Apply).collect();
        actions.extend(
            deletes.into_iter().filter(|r| !applied.contains(&r.id)).map(SyncAction::Delete),
        );
        Self { actions }
    }

    pub fn actions(&self) -> &[SyncAction] {
        &self.actions
    }

    pub fn into_actions(self) -> Vec<SyncAction> {
        self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn applies(&self) -> impl Iterator<Item = &Resource> {
        self.actions.iter().filter_map(|a| match a {
            SyncAction::Apply(r) => Some(r),
            SyncAction::Delete(_) => None,
        })
    }

    pub fn deletes(&self) -> impl Iterator<Item = &Resource> {
        self.actions.iter().filter_map(|a| match a {
            SyncAction::Delete(r) => Some(r),
            SyncAction::Apply(_) => None,
        })
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
